//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// An entity inside an existing aggregate was not found.
    #[error("entity {entity_id} not found in aggregate {aggregate_id}")]
    EntityNotFound {
        /// The aggregate that was searched.
        aggregate_id: Uuid,
        /// The missing entity.
        entity_id: Uuid,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A stored event could not be turned back into a domain event.
    #[error("cannot decode event {event_type}: {reason}")]
    EventDecoding {
        /// The stored discriminator.
        event_type: String,
        /// What went wrong.
        reason: String,
    },

    /// A projection or integration handler rejected an event.
    #[error("handler error: {0}")]
    Handler(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for optimistic concurrency conflicts, which callers
    /// resolve by reloading and retrying.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
