//! Messaging error types.

use thiserror::Error;

/// Errors raised while setting up broker clients.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Missing or malformed configuration.
    #[error("messaging configuration error: {0}")]
    Config(String),

    /// The Kafka client reported an error.
    #[cfg(feature = "kafka")]
    #[error("kafka client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A topic could not be created.
    #[error("failed to create topic {topic}: {reason}")]
    TopicCreation {
        /// The topic that was requested.
        topic: String,
        /// What the broker answered.
        reason: String,
    },
}
