//! Event log, snapshot store, and concurrency gate abstractions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::subscription::CheckpointPosition;

/// An event produced by an aggregate, before the store has assigned its
/// sequence and transaction identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Version within the aggregate stream.
    pub version: i64,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Store-assigned, monotonic, unique identifier.
    pub sequence_id: i64,
    /// Identifier of the database transaction that wrote the event.
    pub transaction_id: i64,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Version within the aggregate stream.
    pub version: i64,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// The publisher ordering key of this event.
    #[must_use]
    pub fn position(&self) -> CheckpointPosition {
        CheckpointPosition::new(self.transaction_id, self.sequence_id)
    }
}

/// Materialized aggregate state at a given version.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: Uuid,
    /// The last event version folded into the snapshot.
    pub version: i64,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

/// A request to move an aggregate's version record forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCommit {
    /// The aggregate being written.
    pub aggregate_id: Uuid,
    /// The aggregate type, recorded on first write.
    pub aggregate_type: String,
    /// The version the writer loaded. Zero means the aggregate is new.
    pub expected_version: i64,
    /// The version after the pending events are applied.
    pub version: i64,
}

/// Repository trait for the append-only event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append events in one transaction. All events share the writing
    /// transaction's identifier and receive increasing sequence ids.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if a version already
    /// exists for the aggregate, `DomainError::Infrastructure` otherwise.
    async fn append_events(&self, events: &[NewEvent]) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load events for an aggregate with inclusive version bounds, ordered by
    /// version.
    async fn load_events(
        &self,
        aggregate_id: Uuid,
        from_version: Option<i64>,
        to_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError>;
}

/// Repository trait for aggregate snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist a snapshot.
    async fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), DomainError>;

    /// Load the highest-version snapshot at or below `max_version`, or the
    /// latest one when unbounded.
    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
        max_version: Option<i64>,
    ) -> Result<Option<AggregateSnapshot>, DomainError>;
}

/// The optimistic concurrency gate.
#[async_trait]
pub trait AggregateRepository: Send + Sync {
    /// Advance the aggregate's version record from `expected_version` to
    /// `version` and append `events`, atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` when another writer has
    /// already moved the record past `expected_version` (or, for a new
    /// aggregate, already created it).
    async fn commit_aggregate(
        &self,
        commit: &AggregateCommit,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError>;
}

/// Everything the write and read paths need from storage.
pub trait EventStore: EventRepository + SnapshotRepository + AggregateRepository {}

impl<T> EventStore for T where T: EventRepository + SnapshotRepository + AggregateRepository + ?Sized {}
