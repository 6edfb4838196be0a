//! Publisher ticks against `PostgreSQL`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use ordering_core::repository::{AggregateCommit, AggregateRepository, NewEvent, StoredEvent};
use ordering_core::subscription::SubscriptionRepository;
use ordering_event_store::{PgEventRepository, PgSubscriptionRepository};
use ordering_subscription::{EventSubscriptionProcessor, PublisherState, TickOutcome};
use ordering_test_support::RecordingEventHandler;
use sqlx::PgPool;
use uuid::Uuid;

const SUBSCRIPTION: &str = "OrderIntegrationEventSender";

async fn create_order(repo: &PgEventRepository) -> StoredEvent {
    let id = Uuid::new_v4();
    repo.commit_aggregate(
        &AggregateCommit {
            aggregate_id: id,
            aggregate_type: "order".to_string(),
            expected_version: 0,
            version: 1,
        },
        &[NewEvent {
            aggregate_id: id,
            event_type: "order.created".to_string(),
            payload: serde_json::json!({ "name": "weekly", "order_items": [] }),
            version: 1,
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }],
    )
    .await
    .unwrap()
    .remove(0)
}

async fn stored_checkpoint(pool: &PgPool) -> (i64, i64) {
    sqlx::query_as(
        "SELECT last_transaction_id, last_event_id FROM subscriptions WHERE subscription_name = $1",
    )
    .bind(SUBSCRIPTION)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Ticks until the handler has seen `expected` events. Parallel tests can
/// hold the cluster-wide watermark back briefly.
async fn tick_until(
    processor: &EventSubscriptionProcessor,
    handler: &RecordingEventHandler,
    expected: usize,
) {
    for _ in 0..100 {
        processor.process_tick().await.unwrap();
        if handler.handled().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "handler saw {} events, expected {expected}",
        handler.handled().len()
    );
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_tick_publishes_and_persists_checkpoint(pool: PgPool) {
    // Arrange
    let events = PgEventRepository::new(pool.clone());
    let first = create_order(&events).await;
    let second = create_order(&events).await;
    let handler = Arc::new(RecordingEventHandler::new("order", SUBSCRIPTION));
    let processor = EventSubscriptionProcessor::new(
        Arc::new(PgSubscriptionRepository::new(pool.clone())),
        handler.clone(),
    );

    // Act
    tick_until(&processor, &handler, 2).await;
    let checkpoint = stored_checkpoint(&pool).await;

    // Assert
    assert_eq!(
        handler.handled_sequence_ids(),
        vec![first.sequence_id, second.sequence_id]
    );
    assert_eq!(checkpoint, (second.transaction_id, second.sequence_id));
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_tick_skips_while_checkpoint_is_locked(pool: PgPool) {
    // Arrange
    let subscriptions = PgSubscriptionRepository::new(pool.clone());
    subscriptions.ensure_subscription(SUBSCRIPTION).await.unwrap();
    let held = subscriptions
        .lock_subscription(SUBSCRIPTION)
        .await
        .unwrap()
        .unwrap();
    let handler = Arc::new(RecordingEventHandler::new("order", SUBSCRIPTION));
    let processor = EventSubscriptionProcessor::new(Arc::new(subscriptions), handler.clone());

    // Act
    let outcome = tokio::time::timeout(Duration::from_secs(5), processor.process_tick())
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(outcome, TickOutcome::Skipped);
    drop(held);
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_rejected_event_leaves_checkpoint_in_place(pool: PgPool) {
    // Arrange
    let events = PgEventRepository::new(pool.clone());
    let event = create_order(&events).await;
    let handler = Arc::new(RecordingEventHandler::new("order", SUBSCRIPTION));
    handler.fail_on(Some(event.sequence_id));
    let processor = EventSubscriptionProcessor::new(
        Arc::new(PgSubscriptionRepository::new(pool.clone())),
        handler.clone(),
    );

    // Act
    let mut failure = None;
    for _ in 0..100 {
        match processor.process_tick().await {
            Err(err) => {
                failure = Some(err);
                break;
            }
            Ok(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    let checkpoint = stored_checkpoint(&pool).await;

    // Assert
    let failure = failure.expect("tick never reached the event");
    assert_eq!(failure.state, PublisherState::Dispatching);
    assert_eq!(checkpoint, (0, 0));
}
