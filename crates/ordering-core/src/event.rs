//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::repository::{NewEvent, StoredEvent};

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: Uuid,
    /// Position within the aggregate stream, starting at 1.
    pub version: i64,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be
    /// serialized.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Rebuilds a typed event from its stored form, routing on the stored
    /// discriminator.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventDecoding` for unknown event types or
    /// payloads that do not match their type.
    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError>
    where
        Self: Sized;

    /// Converts the event into the shape handed to the event log.
    ///
    /// # Errors
    ///
    /// Propagates payload serialization failures.
    fn to_new_event(&self) -> Result<NewEvent, DomainError> {
        let meta = self.metadata();
        Ok(NewEvent {
            aggregate_id: meta.aggregate_id,
            event_type: self.event_type().to_owned(),
            payload: self.to_payload()?,
            version: meta.version,
            created_at: meta.occurred_at,
        })
    }
}
