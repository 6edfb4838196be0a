//! Inventory listener entry point.
//!
//! Reads `KAFKA_BROKERS`, `ORDER_EVENT_GROUP` and `ORDER_EVENT_TOPICS`, then
//! logs every order integration event until interrupted.

use std::error::Error;

use ordering_messaging::{InventoryListener, ListenerConfig};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = ListenerConfig::from_env()?;
    let listener = InventoryListener::new(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal, stopping consumer");
        }
        let _ = shutdown_tx.send(true);
    });

    listener.run(shutdown_rx).await;
    Ok(())
}
