//! Aggregate reconstruction from snapshots and event history.

use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::repository::{AggregateSnapshot, EventStore, StoredEvent};

/// Rebuilds an aggregate as of `max_version` (or its latest version).
///
/// Loads the newest snapshot at or below the bound, then replays every later
/// event up to the bound in version order. Returns `Ok(None)` when the
/// aggregate has neither a snapshot nor events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the snapshot cannot be
/// deserialized or the replayed versions are not contiguous, and
/// `DomainError::EventDecoding` for events the aggregate does not know.
pub async fn reconstruct<A: AggregateRoot>(
    store: &dyn EventStore,
    aggregate_id: Uuid,
    max_version: Option<i64>,
) -> Result<Option<A>, DomainError> {
    let snapshot = store.load_snapshot(aggregate_id, max_version).await?;

    let (mut aggregate, from_version) = match &snapshot {
        Some(snapshot) => (restore::<A>(snapshot)?, Some(snapshot.version + 1)),
        None => (A::empty(aggregate_id), None),
    };

    let events = store
        .load_events(aggregate_id, from_version, max_version)
        .await?;
    if snapshot.is_none() && events.is_empty() {
        return Ok(None);
    }

    replay(&mut aggregate, &events)?;
    Ok(Some(aggregate))
}

/// Applies stored events on top of `aggregate`, checking that each event
/// continues the version sequence.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` on a version gap or duplicate, and
/// `DomainError::EventDecoding` for undecodable events.
pub fn replay<A: AggregateRoot>(aggregate: &mut A, events: &[StoredEvent]) -> Result<(), DomainError> {
    for stored in events {
        let expected = aggregate.version() + 1;
        if stored.version != expected {
            return Err(DomainError::Infrastructure(format!(
                "event stream of aggregate {} is not contiguous: expected version {expected}, found {}",
                stored.aggregate_id, stored.version
            )));
        }
        let event = A::Event::from_stored(stored)?;
        aggregate.apply(&event);
    }
    Ok(())
}

/// Serializes the aggregate's current state into a snapshot.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if serialization fails.
pub fn snapshot_of<A: AggregateRoot>(aggregate: &A) -> Result<AggregateSnapshot, DomainError> {
    let state = serde_json::to_value(aggregate).map_err(|e| {
        DomainError::Infrastructure(format!("snapshot serialization failed: {e}"))
    })?;
    Ok(AggregateSnapshot {
        aggregate_id: aggregate.aggregate_id(),
        version: aggregate.version(),
        state,
    })
}

fn restore<A: AggregateRoot>(snapshot: &AggregateSnapshot) -> Result<A, DomainError> {
    let aggregate: A = serde_json::from_value(snapshot.state.clone()).map_err(|e| {
        DomainError::Infrastructure(format!("snapshot deserialization failed: {e}"))
    })?;
    if aggregate.version() != snapshot.version {
        return Err(DomainError::Infrastructure(format!(
            "snapshot of aggregate {} claims version {} but holds state at version {}",
            snapshot.aggregate_id,
            snapshot.version,
            aggregate.version()
        )));
    }
    Ok(aggregate)
}
