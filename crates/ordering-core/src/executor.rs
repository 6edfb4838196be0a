//! The command write path: reconstruct, mutate, commit through the
//! concurrency gate, retry on conflict, snapshot on cadence.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::command::Command;
use crate::config::EventSourcingConfig;
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::reconstruction::{reconstruct, snapshot_of};
use crate::repository::{AggregateCommit, EventStore, NewEvent, StoredEvent};

/// Result of a command that went through the write path.
#[derive(Debug)]
pub struct CommandOutcome<A> {
    /// The aggregate state after the command.
    pub aggregate: A,
    /// The events the command persisted, with store-assigned ids.
    pub stored_events: Vec<StoredEvent>,
    /// How many times the command was executed, including conflict retries.
    pub attempts: u32,
}

/// Persists a freshly created aggregate. The version record is inserted, so
/// a second writer for the same id fails with a conflict instead of being
/// retried.
///
/// # Errors
///
/// Returns `DomainError::ConcurrencyConflict` if the aggregate id is taken,
/// or any storage error.
pub async fn create<A, C>(
    store: &dyn EventStore,
    config: &EventSourcingConfig,
    command: &C,
    mut aggregate: A,
) -> Result<CommandOutcome<A>, DomainError>
where
    A: AggregateRoot,
    C: Command,
{
    let stored_events = commit(store, &mut aggregate).await?;
    debug!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        aggregate_id = %aggregate.aggregate_id(),
        version = aggregate.version(),
        "aggregate created"
    );
    store_due_snapshots(store, config, &aggregate, &stored_events).await;
    Ok(CommandOutcome {
        aggregate,
        stored_events,
        attempts: 1,
    })
}

/// Runs `mutate` against the latest state of an existing aggregate and
/// commits the resulting events.
///
/// On a concurrency conflict the aggregate is reloaded and `mutate` runs
/// again, up to `config.max_conflict_retries` times. Domain errors returned
/// by `mutate` are never retried.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the aggregate has no history,
/// whatever `mutate` returns, the final `ConcurrencyConflict` once retries
/// are exhausted, or any storage error.
pub async fn execute<A, C, F>(
    store: &dyn EventStore,
    config: &EventSourcingConfig,
    command: &C,
    aggregate_id: Uuid,
    mut mutate: F,
) -> Result<CommandOutcome<A>, DomainError>
where
    A: AggregateRoot,
    C: Command,
    F: FnMut(&mut A) -> Result<(), DomainError> + Send,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut aggregate = reconstruct::<A>(store, aggregate_id, None)
            .await?
            .ok_or(DomainError::AggregateNotFound(aggregate_id))?;

        mutate(&mut aggregate)?;
        if aggregate.uncommitted_events().is_empty() {
            return Ok(CommandOutcome {
                aggregate,
                stored_events: Vec::new(),
                attempts,
            });
        }

        match commit(store, &mut aggregate).await {
            Ok(stored_events) => {
                store_due_snapshots(store, config, &aggregate, &stored_events).await;
                return Ok(CommandOutcome {
                    aggregate,
                    stored_events,
                    attempts,
                });
            }
            Err(err) if err.is_conflict() && attempts <= config.max_conflict_retries => {
                warn!(
                    command_type = command.command_type(),
                    correlation_id = %command.correlation_id(),
                    aggregate_id = %aggregate_id,
                    attempt = attempts,
                    error = %err,
                    "aggregate outdated, reloading and retrying command"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

/// Flushes the aggregate's pending events through the concurrency gate and
/// clears the buffer on success.
///
/// # Errors
///
/// Returns `DomainError::ConcurrencyConflict` if the aggregate was advanced
/// by another writer since it was loaded.
pub async fn commit<A: AggregateRoot>(
    store: &dyn EventStore,
    aggregate: &mut A,
) -> Result<Vec<StoredEvent>, DomainError> {
    let events = aggregate
        .uncommitted_events()
        .iter()
        .map(DomainEvent::to_new_event)
        .collect::<Result<Vec<NewEvent>, _>>()?;

    let commit = AggregateCommit {
        aggregate_id: aggregate.aggregate_id(),
        aggregate_type: A::AGGREGATE_TYPE.to_owned(),
        expected_version: aggregate.loaded_version(),
        version: aggregate.version(),
    };

    let stored_events = store.commit_aggregate(&commit, &events).await?;
    aggregate.clear_uncommitted_events();
    Ok(stored_events)
}

/// Stores a snapshot for every persisted version that falls on the cadence.
/// Failures are logged; the events are already durable.
async fn store_due_snapshots<A: AggregateRoot>(
    store: &dyn EventStore,
    config: &EventSourcingConfig,
    aggregate: &A,
    stored_events: &[StoredEvent],
) {
    for event in stored_events
        .iter()
        .filter(|event| config.is_snapshot_version(event.version))
    {
        let snapshot = if event.version == aggregate.version() {
            snapshot_of(aggregate)
        } else {
            match reconstruct::<A>(store, event.aggregate_id, Some(event.version)).await {
                Ok(Some(past)) => snapshot_of(&past),
                Ok(None) => Err(DomainError::AggregateNotFound(event.aggregate_id)),
                Err(err) => Err(err),
            }
        };

        let result = match snapshot {
            Ok(snapshot) => store.save_snapshot(&snapshot).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => debug!(
                aggregate_id = %event.aggregate_id,
                version = event.version,
                "snapshot stored"
            ),
            Err(err) => warn!(
                aggregate_id = %event.aggregate_id,
                version = event.version,
                error = %err,
                "failed to store snapshot"
            ),
        }
    }
}
