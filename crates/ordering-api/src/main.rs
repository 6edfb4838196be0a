//! Ordering API server entry point.

use std::error::Error;
use std::sync::Arc;

use ordering_api::config::AppConfig;
use ordering_api::error::AppError;
use ordering_api::read_model::{PgOrderReadRepository, run_read_model_migrations};
use ordering_api::state::AppState;
use ordering_api::{routes, telemetry};
use ordering_core::broker::MessageBroker;
use ordering_core::clock::{Clock, SystemClock};
use ordering_core::repository::EventStore;
use ordering_event_store::{PgEventRepository, PgSubscriptionRepository, run_migrations};
use ordering_messaging::LoggingMessageBroker;
use ordering_order::application::integration_sender::OrderIntegrationEventSender;
use ordering_subscription::{EventSubscriptionProcessor, PollingPublisher};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    info!("Starting ordering API server");

    let pool = connect(&config.database_url).await?;
    run_migrations(&pool).await?;
    let read_pool = if config.read_database_url == config.database_url {
        pool.clone()
    } else {
        connect(&config.read_database_url).await?
    };
    run_read_model_migrations(&read_pool).await?;

    let event_store: Arc<dyn EventStore> = Arc::new(PgEventRepository::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broker = message_broker(&config).await?;

    let sender = OrderIntegrationEventSender::new(
        Arc::clone(&event_store),
        broker,
        config.order_event_topic.clone(),
        config.subscription_name.clone(),
    );
    let processor = EventSubscriptionProcessor::new(
        Arc::new(PgSubscriptionRepository::new(pool.clone())),
        Arc::new(sender),
    );
    let publisher = PollingPublisher::new(processor, config.publisher).spawn();

    let app_state = AppState::new(
        event_store,
        Arc::new(PgOrderReadRepository::new(read_pool)),
        clock,
        config.event_sourcing,
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, stopping publisher");
    publisher.shutdown().await?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

async fn message_broker(config: &AppConfig) -> Result<Arc<dyn MessageBroker>, AppError> {
    if config.kafka_brokers.is_empty() {
        info!("KAFKA_BROKERS not set, integration events will only be logged");
        return Ok(Arc::new(LoggingMessageBroker::new()));
    }

    #[cfg(feature = "kafka")]
    let broker: Arc<dyn MessageBroker> = Arc::new(
        ordering_messaging::KafkaMessageBroker::connect(
            &config.kafka_brokers,
            &[config.order_event_topic.as_str()],
        )
        .await?,
    );

    #[cfg(not(feature = "kafka"))]
    let broker: Arc<dyn MessageBroker> = {
        warn!(
            brokers = ?config.kafka_brokers,
            "built without the kafka feature, integration events will only be logged"
        );
        Arc::new(LoggingMessageBroker::new())
    };

    Ok(broker)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
