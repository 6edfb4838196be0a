//! One publisher tick.

use std::fmt;
use std::sync::Arc;

use ordering_core::error::DomainError;
use ordering_core::handler::AsyncEventHandler;
use ordering_core::subscription::{CheckpointPosition, SubscriptionLease, SubscriptionRepository};
use thiserror::Error;
use tracing::{debug, warn};

/// Where a tick is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// Between ticks.
    Idle,
    /// Trying to lock the checkpoint row.
    LockAttempt,
    /// Another instance holds the lock; nothing was done.
    Skipped,
    /// The checkpoint row is locked.
    Locked,
    /// Reading events after the checkpoint.
    Reading,
    /// Handing events to the handler.
    Dispatching,
    /// Moving the checkpoint and committing.
    Advancing,
    /// The tick's transaction committed.
    Committed,
}

impl fmt::Display for PublisherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::LockAttempt => "lock_attempt",
            Self::Skipped => "skipped",
            Self::Locked => "locked",
            Self::Reading => "reading",
            Self::Dispatching => "dispatching",
            Self::Advancing => "advancing",
            Self::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// What a successful tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The checkpoint row was locked elsewhere.
    Skipped,
    /// No new visible events.
    CaughtUp,
    /// Events were handled and the checkpoint moved to the last of them.
    Dispatched {
        /// Number of events handled.
        count: usize,
        /// The new checkpoint.
        checkpoint: CheckpointPosition,
    },
}

/// A failed tick. The checkpoint is unchanged and the events will be
/// redelivered.
#[derive(Debug, Error)]
#[error("publisher tick failed while {state}: {source}")]
pub struct TickError {
    /// The state the tick failed in.
    pub state: PublisherState,
    /// The underlying failure.
    #[source]
    pub source: DomainError,
}

impl TickError {
    fn new(state: PublisherState, source: DomainError) -> Self {
        Self { state, source }
    }
}

/// Drives one subscription through the lock, read, dispatch, advance,
/// commit cycle.
pub struct EventSubscriptionProcessor {
    subscriptions: Arc<dyn SubscriptionRepository>,
    handler: Arc<dyn AsyncEventHandler>,
}

impl EventSubscriptionProcessor {
    /// Creates a processor for `handler`'s subscription.
    #[must_use]
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        handler: Arc<dyn AsyncEventHandler>,
    ) -> Self {
        Self {
            subscriptions,
            handler,
        }
    }

    /// The checkpoint row this processor advances.
    #[must_use]
    pub fn subscription_name(&self) -> &str {
        self.handler.subscription_name()
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// Returns a [`TickError`] naming the failed state. Every failure after
    /// the lock is taken rolls the transaction back.
    pub async fn process_tick(&self) -> Result<TickOutcome, TickError> {
        let name = self.handler.subscription_name();

        self.subscriptions
            .ensure_subscription(name)
            .await
            .map_err(|e| TickError::new(PublisherState::Idle, e))?;

        let lease = self
            .subscriptions
            .lock_subscription(name)
            .await
            .map_err(|e| TickError::new(PublisherState::LockAttempt, e))?;
        let Some(mut lease) = lease else {
            debug!(subscription = name, "checkpoint locked elsewhere, skipping tick");
            return Ok(TickOutcome::Skipped);
        };

        let checkpoint = lease.checkpoint().position;
        let events = match lease
            .read_events_after_checkpoint(self.handler.aggregate_type())
            .await
        {
            Ok(events) => events,
            Err(e) => return Err(abort(lease, PublisherState::Reading, e).await),
        };

        let Some(last) = events.last().map(|event| event.position()) else {
            lease
                .commit()
                .await
                .map_err(|e| TickError::new(PublisherState::Reading, e))?;
            return Ok(TickOutcome::CaughtUp);
        };

        for event in &events {
            if let Err(e) = self.handler.handle(event).await {
                warn!(
                    subscription = name,
                    sequence_id = event.sequence_id,
                    transaction_id = event.transaction_id,
                    error = %e,
                    "handler rejected event, rolling back tick"
                );
                return Err(abort(lease, PublisherState::Dispatching, e).await);
            }
        }

        if last <= checkpoint {
            let e = DomainError::Infrastructure(format!(
                "checkpoint of {name} would move from {checkpoint} back to {last}"
            ));
            return Err(abort(lease, PublisherState::Advancing, e).await);
        }
        match lease.advance(last).await {
            Ok(1) => {}
            Ok(rows) => {
                let e = DomainError::Infrastructure(format!(
                    "advancing checkpoint of {name} affected {rows} rows"
                ));
                return Err(abort(lease, PublisherState::Advancing, e).await);
            }
            Err(e) => return Err(abort(lease, PublisherState::Advancing, e).await),
        }
        lease
            .commit()
            .await
            .map_err(|e| TickError::new(PublisherState::Advancing, e))?;

        debug!(
            subscription = name,
            count = events.len(),
            checkpoint = %last,
            "tick committed"
        );
        Ok(TickOutcome::Dispatched {
            count: events.len(),
            checkpoint: last,
        })
    }
}

async fn abort(
    mut lease: Box<dyn SubscriptionLease>,
    state: PublisherState,
    source: DomainError,
) -> TickError {
    if let Err(rollback) = lease.rollback().await {
        warn!(error = %rollback, "rollback after failed tick failed");
    }
    TickError::new(state, source)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use ordering_core::repository::{AggregateCommit, AggregateRepository, NewEvent, StoredEvent};
    use ordering_test_support::{FailingEventStore, InMemoryEventStore, RecordingEventHandler};
    use uuid::Uuid;

    use super::*;

    const SUBSCRIPTION: &str = "OrderIntegrationEventSender";

    fn commit_for(aggregate_id: Uuid, aggregate_type: &str) -> (AggregateCommit, Vec<NewEvent>) {
        (
            AggregateCommit {
                aggregate_id,
                aggregate_type: aggregate_type.to_owned(),
                expected_version: 0,
                version: 1,
            },
            vec![NewEvent {
                aggregate_id,
                event_type: "order.created".to_owned(),
                payload: serde_json::json!({}),
                version: 1,
                created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            }],
        )
    }

    async fn commit_new(store: &InMemoryEventStore, aggregate_type: &str) -> StoredEvent {
        let (commit, events) = commit_for(Uuid::new_v4(), aggregate_type);
        store
            .commit_aggregate(&commit, &events)
            .await
            .unwrap()
            .remove(0)
    }

    fn processor(
        store: &InMemoryEventStore,
    ) -> (EventSubscriptionProcessor, Arc<RecordingEventHandler>) {
        let handler = Arc::new(RecordingEventHandler::new("order", SUBSCRIPTION));
        let processor = EventSubscriptionProcessor::new(Arc::new(store.clone()), handler.clone());
        (processor, handler)
    }

    #[tokio::test]
    async fn test_tick_dispatches_in_publish_order_and_advances_to_last() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, handler) = processor(&store);
        let first = commit_new(&store, "order").await;
        commit_new(&store, "customer").await;
        let second = commit_new(&store, "order").await;

        // Act
        let outcome = processor.process_tick().await.unwrap();

        // Assert
        assert_eq!(
            outcome,
            TickOutcome::Dispatched {
                count: 2,
                checkpoint: second.position(),
            }
        );
        assert_eq!(
            handler.handled_sequence_ids(),
            vec![first.sequence_id, second.sequence_id]
        );
        assert_eq!(store.checkpoint(SUBSCRIPTION), Some(second.position()));
    }

    #[tokio::test]
    async fn test_next_tick_is_caught_up_without_redelivery() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, handler) = processor(&store);
        commit_new(&store, "order").await;
        processor.process_tick().await.unwrap();

        // Act
        let outcome = processor.process_tick().await.unwrap();

        // Assert
        assert_eq!(outcome, TickOutcome::CaughtUp);
        assert_eq!(handler.handled().len(), 1);
    }

    #[tokio::test]
    async fn test_first_tick_creates_checkpoint_at_start() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, _handler) = processor(&store);

        // Act
        let outcome = processor.process_tick().await.unwrap();

        // Assert
        assert_eq!(outcome, TickOutcome::CaughtUp);
        assert_eq!(store.checkpoint(SUBSCRIPTION), Some(CheckpointPosition::START));
    }

    #[tokio::test]
    async fn test_tick_is_skipped_while_another_instance_holds_the_lock() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, handler) = processor(&store);
        commit_new(&store, "order").await;
        store.ensure_subscription(SUBSCRIPTION).await.unwrap();
        let held = store.lock_subscription(SUBSCRIPTION).await.unwrap();

        // Act
        let outcome = processor.process_tick().await.unwrap();

        // Assert
        assert!(held.is_some());
        assert_eq!(outcome, TickOutcome::Skipped);
        assert!(handler.handled().is_empty());
    }

    #[tokio::test]
    async fn test_events_above_watermark_wait_for_earlier_transaction() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, handler) = processor(&store);
        let slow = store.begin_transaction();
        let (slow_commit, slow_events) = commit_for(Uuid::new_v4(), "order");
        let slow_stored = slow.commit_aggregate(&slow_commit, &slow_events).unwrap();
        let fast = commit_new(&store, "order").await;

        // Act
        let while_open = processor.process_tick().await.unwrap();
        slow.commit();
        let after_commit = processor.process_tick().await.unwrap();

        // Assert
        assert!(fast.transaction_id > slow_stored[0].transaction_id);
        assert_eq!(while_open, TickOutcome::CaughtUp);
        assert_eq!(
            after_commit,
            TickOutcome::Dispatched {
                count: 2,
                checkpoint: fast.position(),
            }
        );
        assert_eq!(
            handler.handled_sequence_ids(),
            vec![slow_stored[0].sequence_id, fast.sequence_id]
        );
    }

    #[tokio::test]
    async fn test_handler_failure_rolls_back_and_redelivers() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, handler) = processor(&store);
        let first = commit_new(&store, "order").await;
        let second = commit_new(&store, "order").await;
        let third = commit_new(&store, "order").await;
        handler.fail_on(Some(second.sequence_id));

        // Act
        let failed = processor.process_tick().await;
        let checkpoint_after_failure = store.checkpoint(SUBSCRIPTION);
        handler.fail_on(None);
        let retried = processor.process_tick().await.unwrap();

        // Assert
        match failed {
            Err(TickError {
                state: PublisherState::Dispatching,
                source: DomainError::Handler(_),
            }) => {}
            other => panic!("expected a dispatching failure, got {other:?}"),
        }
        assert_eq!(checkpoint_after_failure, Some(CheckpointPosition::START));
        assert_eq!(
            retried,
            TickOutcome::Dispatched {
                count: 3,
                checkpoint: third.position(),
            }
        );
        assert_eq!(
            handler.handled_sequence_ids(),
            vec![
                first.sequence_id,
                second.sequence_id,
                first.sequence_id,
                second.sequence_id,
                third.sequence_id,
            ]
        );
    }

    #[tokio::test]
    async fn test_checkpoint_only_moves_forward() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (processor, _handler) = processor(&store);
        let mut seen = vec![CheckpointPosition::START];

        // Act
        for _ in 0..4 {
            commit_new(&store, "order").await;
            commit_new(&store, "order").await;
            processor.process_tick().await.unwrap();
            seen.push(store.checkpoint(SUBSCRIPTION).unwrap());
        }

        // Assert
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_with_state() {
        // Arrange
        let handler = Arc::new(RecordingEventHandler::new("order", SUBSCRIPTION));
        let processor = EventSubscriptionProcessor::new(Arc::new(FailingEventStore), handler);

        // Act
        let result = processor.process_tick().await;

        // Assert
        match result {
            Err(err) => {
                assert_eq!(err.state, PublisherState::Idle);
                assert!(err.to_string().contains("idle"));
            }
            Ok(outcome) => panic!("expected failure, got {outcome:?}"),
        }
    }
}
