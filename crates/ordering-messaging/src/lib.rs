//! Message broker implementations for the ordering service.
//!
//! [`LoggingMessageBroker`] is always available. The `kafka` feature adds an
//! rdkafka producer and the inventory listener that consumes what it
//! publishes.

pub mod error;
pub mod listener_config;
pub mod logging;

#[cfg(feature = "kafka")]
pub mod kafka;
#[cfg(feature = "kafka")]
pub mod kafka_consumer;

pub use error::MessagingError;
pub use listener_config::ListenerConfig;
pub use logging::LoggingMessageBroker;

#[cfg(feature = "kafka")]
pub use kafka::KafkaMessageBroker;
#[cfg(feature = "kafka")]
pub use kafka_consumer::InventoryListener;

/// Splits a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}
