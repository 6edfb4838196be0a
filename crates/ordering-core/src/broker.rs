//! Message broker capability.

use async_trait::async_trait;

use crate::error::DomainError;

/// Publishes keyed messages to a topic.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish one message and wait for the broker to acknowledge it.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError>;
}
