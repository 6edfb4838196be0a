//! Kafka producer built on rdkafka.

use std::time::Duration;

use async_trait::async_trait;
use ordering_core::broker::MessageBroker;
use ordering_core::error::DomainError;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use tracing::{debug, error, info};

use crate::error::MessagingError;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes integration events to Kafka.
///
/// Produced with `acks=all` and idempotence enabled, so a retried send does
/// not duplicate a message inside the broker.
pub struct KafkaMessageBroker {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaMessageBroker {
    /// Connects to `brokers`, creating each of `topics` that does not exist
    /// yet with one partition.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Config` for an empty broker list,
    /// `MessagingError::Kafka` if a client cannot be created, and
    /// `MessagingError::TopicCreation` if the broker refuses a topic.
    pub async fn connect(brokers: &[String], topics: &[&str]) -> Result<Self, MessagingError> {
        if brokers.is_empty() {
            return Err(MessagingError::Config(
                "at least one Kafka broker is required".to_owned(),
            ));
        }
        let bootstrap = brokers.join(",");

        create_topics(&bootstrap, topics).await?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.send.max.retries", "5")
            .set("message.timeout.ms", "5000")
            .create()?;

        info!(brokers = %bootstrap, "kafka producer created");
        Ok(Self {
            producer,
            timeout: SEND_TIMEOUT,
        })
    }
}

async fn create_topics(bootstrap: &str, topics: &[&str]) -> Result<(), MessagingError> {
    if topics.is_empty() {
        return Ok(());
    }
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", bootstrap)
        .create()?;
    let requested: Vec<NewTopic<'_>> = topics
        .iter()
        .map(|topic| NewTopic::new(topic, 1, TopicReplication::Fixed(1)))
        .collect();

    for result in admin
        .create_topics(&requested, &AdminOptions::new())
        .await?
    {
        match result {
            Ok(topic) => info!(topic = %topic, "topic created"),
            Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %topic, "topic already exists");
            }
            Err((topic, code)) => {
                return Err(MessagingError::TopicCreation {
                    topic,
                    reason: code.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl MessageBroker for KafkaMessageBroker {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                debug!(topic, key, partition, offset, "message delivered");
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!(topic, key, error = %kafka_error, "failed to deliver message");
                Err(DomainError::Infrastructure(format!(
                    "publishing to {topic} failed: {kafka_error}"
                )))
            }
        }
    }
}
