//! Process configuration, read once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use ordering_core::config::{
    DEFAULT_MAX_CONFLICT_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_SNAPSHOT_EVERY,
    EventSourcingConfig, PublisherConfig,
};
use ordering_messaging::split_list;
use ordering_order::application::integration_sender::{
    DEFAULT_ORDER_EVENT_TOPIC, DEFAULT_SUBSCRIPTION_NAME,
};

use crate::error::AppError;

/// Everything the server needs from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Event store database.
    pub database_url: String,
    /// Read model database. Defaults to `database_url`.
    pub read_database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Kafka bootstrap brokers. Empty selects the logging broker.
    pub kafka_brokers: Vec<String>,
    /// Topic integration events are published to.
    pub order_event_topic: String,
    /// Checkpoint row advanced by the integration sender.
    pub subscription_name: String,
    /// Publisher settings.
    pub publisher: PublisherConfig,
    /// Write path settings.
    pub event_sourcing: EventSourcingConfig,
    /// OTLP collector endpoint. Unset disables trace export.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_string())
        })?;
        let read_database_url = var("READ_DATABASE_URL").unwrap_or_else(|| database_url.clone());
        let poll_interval_ms: u64 = parse_or(
            var("POLL_INTERVAL_MS"),
            "POLL_INTERVAL_MS",
            u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(1000),
        )?;
        if poll_interval_ms == 0 {
            return Err(AppError::Config(
                "POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            read_database_url,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(var("PORT"), "PORT", 3000)?,
            kafka_brokers: var("KAFKA_BROKERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            order_event_topic: var("ORDER_EVENT_TOPIC")
                .unwrap_or_else(|| DEFAULT_ORDER_EVENT_TOPIC.to_string()),
            subscription_name: var("SUBSCRIPTION_NAME")
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_NAME.to_string()),
            publisher: PublisherConfig {
                poll_interval: Duration::from_millis(poll_interval_ms),
            },
            event_sourcing: EventSourcingConfig {
                snapshot_every: parse_or(
                    var("SNAPSHOT_EVERY"),
                    "SNAPSHOT_EVERY",
                    DEFAULT_SNAPSHOT_EVERY,
                )?,
                max_conflict_retries: parse_or(
                    var("MAX_CONFLICT_RETRIES"),
                    "MAX_CONFLICT_RETRIES",
                    DEFAULT_MAX_CONFLICT_RETRIES,
                )?,
            },
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        // Act
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/orders")]))
                .unwrap();

        // Assert
        assert_eq!(config.read_database_url, "postgres://localhost/orders");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.kafka_brokers.is_empty());
        assert_eq!(config.order_event_topic, "ORDER_EVENT");
        assert_eq!(config.subscription_name, "OrderIntegrationEventSender");
        assert_eq!(config.publisher.poll_interval, Duration::from_secs(1));
        assert_eq!(config.event_sourcing, EventSourcingConfig::default());
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn test_overrides_are_applied() {
        // Act
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/events"),
            ("READ_DATABASE_URL", "postgres://localhost/reads"),
            ("PORT", "8080"),
            ("KAFKA_BROKERS", "kafka-1:9092,kafka-2:9092"),
            ("POLL_INTERVAL_MS", "250"),
            ("SNAPSHOT_EVERY", "5"),
            ("MAX_CONFLICT_RETRIES", "3"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
        ]))
        .unwrap();

        // Assert
        assert_eq!(config.read_database_url, "postgres://localhost/reads");
        assert_eq!(config.port, 8080);
        assert_eq!(config.kafka_brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(config.publisher.poll_interval, Duration::from_millis(250));
        assert_eq!(config.event_sourcing.snapshot_every, 5);
        assert_eq!(config.event_sourcing.max_conflict_retries, 3);
        assert_eq!(
            config.otlp_endpoint.as_deref(),
            Some("http://collector:4317")
        );
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        // Act
        let result = AppConfig::from_lookup(lookup(&[("PORT", "8080")]));

        // Assert
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        // Act
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("PORT", "not-a-port"),
        ]));

        // Assert
        match result {
            Err(AppError::Config(message)) => assert!(message.contains("PORT")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        // Act
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("POLL_INTERVAL_MS", "0"),
        ]));

        // Assert
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
