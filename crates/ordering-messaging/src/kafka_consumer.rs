//! Consumer side of the integration stream.
//!
//! The inventory listener only logs what it receives. Offsets are committed
//! after a message has been logged, so a crash redelivers rather than skips.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::MessagingError;
use crate::listener_config::ListenerConfig;

/// Consumes order integration events and logs each one.
pub struct InventoryListener {
    consumer: StreamConsumer,
    group: String,
}

impl InventoryListener {
    /// Creates the consumer and subscribes it to the configured topics.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Kafka` if the consumer cannot be created or
    /// subscribed.
    pub fn new(config: &ListenerConfig) -> Result<Self, MessagingError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("group.id", &config.group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("partition.assignment.strategy", "roundrobin")
            .set("enable.partition.eof", "false")
            .create()?;
        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        info!(
            group = %config.group,
            topics = ?config.topics,
            "inventory listener subscribed"
        );
        Ok(Self {
            consumer,
            group: config.group.clone(),
        })
    }

    /// Consumes until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                received = self.consumer.recv() => match received {
                    Ok(message) => self.claim(&message),
                    Err(e) => warn!(group = %self.group, error = %e, "failed to receive message"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(group = %self.group, "inventory listener stopped");
    }

    fn claim(&self, message: &BorrowedMessage<'_>) {
        let key = message
            .key()
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        let payload = message
            .payload()
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        info!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            timestamp = ?message.timestamp().to_millis(),
            key = %key,
            payload = %payload,
            "message claimed"
        );
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(
                topic = message.topic(),
                offset = message.offset(),
                error = %e,
                "failed to commit offset, message may be redelivered"
            );
        }
    }
}
