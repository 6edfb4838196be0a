//! Recording message broker.

use std::sync::Mutex;

use async_trait::async_trait;
use ordering_core::broker::MessageBroker;
use ordering_core::error::DomainError;

/// A message published to a [`RecordingMessageBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Message key.
    pub key: String,
    /// Message value.
    pub payload: Vec<u8>,
}

/// A broker that keeps published messages in memory, optionally rejecting
/// every publish.
#[derive(Debug, Default)]
pub struct RecordingMessageBroker {
    published: Mutex<Vec<PublishedMessage>>,
    unavailable: Mutex<bool>,
}

impl RecordingMessageBroker {
    /// Create a broker that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle whether publishes fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Messages accepted so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroker for RecordingMessageBroker {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        if *self.unavailable.lock().unwrap() {
            return Err(DomainError::Infrastructure("broker unavailable".into()));
        }
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_owned(),
            key: key.to_owned(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
