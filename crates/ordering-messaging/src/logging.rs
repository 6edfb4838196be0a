//! A broker that only logs what it would publish.

use async_trait::async_trait;
use ordering_core::broker::MessageBroker;
use ordering_core::error::DomainError;
use tracing::info;

/// Logs every published message. Used when no Kafka brokers are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMessageBroker;

impl LoggingMessageBroker {
    /// Creates a new `LoggingMessageBroker`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageBroker for LoggingMessageBroker {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        info!(
            topic,
            key,
            payload = %String::from_utf8_lossy(payload),
            "publishing integration event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_always_succeeds() {
        // Arrange
        let broker = LoggingMessageBroker::new();

        // Act
        let result = broker
            .publish("ORDER_EVENT", "order.created", br#"{"name":"weekly"}"#)
            .await;

        // Assert
        assert!(result.is_ok());
    }
}
