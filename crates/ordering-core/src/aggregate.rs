//! Aggregate root abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from snapshots and event
/// history.
///
/// Command methods record pending events and apply them immediately, so
/// `version()` always reflects the state including pending events.
pub trait AggregateRoot: Send + Sync + Serialize + DeserializeOwned {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The aggregate type name stored alongside the version record.
    const AGGREGATE_TYPE: &'static str;

    /// Creates the zero-value aggregate that replay starts from.
    fn empty(aggregate_id: Uuid) -> Self;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state. Must be deterministic and
    /// advance the version by exactly one.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// The version the aggregate had when it was loaded, before any pending
    /// events were applied. This is the expected version for the
    /// concurrency gate.
    #[allow(clippy::cast_possible_wrap)]
    fn loaded_version(&self) -> i64 {
        self.version() - self.uncommitted_events().len() as i64
    }
}
