//! Integration tests for `PgSubscriptionRepository`.
//!
//! Transaction ids are cluster-wide, so transactions of tests running in
//! parallel can hold the visibility watermark back for a moment. Reads that
//! expect events therefore poll briefly.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use ordering_core::repository::{AggregateCommit, AggregateRepository, NewEvent, StoredEvent};
use ordering_core::subscription::{CheckpointPosition, SubscriptionRepository};
use ordering_event_store::{PgEventRepository, PgSubscriptionRepository};
use sqlx::PgPool;
use uuid::Uuid;

const SUBSCRIPTION: &str = "OrderIntegrationEventSender";

async fn create_aggregate(repo: &PgEventRepository, aggregate_type: &str) -> Vec<StoredEvent> {
    let id = Uuid::new_v4();
    repo.commit_aggregate(
        &AggregateCommit {
            aggregate_id: id,
            aggregate_type: aggregate_type.to_string(),
            expected_version: 0,
            version: 1,
        },
        &[NewEvent {
            aggregate_id: id,
            event_type: "order.created".to_string(),
            payload: serde_json::json!({}),
            version: 1,
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }],
    )
    .await
    .unwrap()
}

async fn read_visible(subs: &PgSubscriptionRepository, aggregate_type: &str) -> Vec<StoredEvent> {
    let mut lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();
    let events = lease
        .read_events_after_checkpoint(aggregate_type)
        .await
        .unwrap();
    lease.rollback().await.unwrap();
    events
}

async fn read_until(
    subs: &PgSubscriptionRepository,
    aggregate_type: &str,
    expected: usize,
) -> Vec<StoredEvent> {
    for _ in 0..100 {
        let events = read_visible(subs, aggregate_type).await;
        if events.len() >= expected {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {expected} visible events");
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

// --- ensure ---

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_ensure_subscription_is_idempotent(pool: PgPool) {
    let subs = PgSubscriptionRepository::new(pool.clone());

    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(stored_checkpoint(&pool).await, (0, 0));
}

// --- locking ---

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_lock_on_missing_subscription_returns_none(pool: PgPool) {
    let subs = PgSubscriptionRepository::new(pool);

    let lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap();

    assert!(lease.is_none());
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_busy_subscription_is_skipped_without_blocking(pool: PgPool) {
    let subs = PgSubscriptionRepository::new(pool);
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();
    let mut held = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();

    let contender = tokio::time::timeout(
        Duration::from_secs(5),
        subs.lock_subscription(SUBSCRIPTION),
    )
    .await
    .expect("lock attempt must not block")
    .unwrap();

    assert!(contender.is_none());
    held.rollback().await.unwrap();
    assert!(subs.lock_subscription(SUBSCRIPTION).await.unwrap().is_some());
}

// --- reading ---

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_read_filters_by_aggregate_type_in_publish_order(pool: PgPool) {
    let repo = PgEventRepository::new(pool.clone());
    let subs = PgSubscriptionRepository::new(pool);
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();
    let first = create_aggregate(&repo, "order").await;
    create_aggregate(&repo, "customer").await;
    let second = create_aggregate(&repo, "order").await;

    let events = read_until(&subs, "order", 2).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence_id, first[0].sequence_id);
    assert_eq!(events[1].sequence_id, second[0].sequence_id);
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_events_of_later_transactions_wait_for_open_earlier_transaction(pool: PgPool) {
    let repo = PgEventRepository::new(pool.clone());
    let subs = PgSubscriptionRepository::new(pool.clone());
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();
    let mut slow = pool.begin().await.unwrap();
    let slow_tx: i64 = sqlx::query_scalar("SELECT pg_current_xact_id()::text::bigint")
        .fetch_one(&mut *slow)
        .await
        .unwrap();

    let fast = create_aggregate(&repo, "order").await;
    let while_open = read_visible(&subs, "order").await;
    slow.rollback().await.unwrap();
    let after_close = read_until(&subs, "order", 1).await;

    assert!(fast[0].transaction_id > slow_tx);
    assert!(while_open.is_empty());
    assert_eq!(after_close[0].sequence_id, fast[0].sequence_id);
}

// --- advancing ---

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_committed_advance_moves_checkpoint_and_hides_processed_events(pool: PgPool) {
    let repo = PgEventRepository::new(pool.clone());
    let subs = PgSubscriptionRepository::new(pool.clone());
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();
    let stored = create_aggregate(&repo, "order").await;
    read_until(&subs, "order", 1).await;

    let mut lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();
    let rows = lease.advance(stored[0].position()).await.unwrap();
    lease.commit().await.unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        stored_checkpoint(&pool).await,
        (stored[0].transaction_id, stored[0].sequence_id)
    );
    let mut lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();
    assert_eq!(lease.checkpoint().position, stored[0].position());
    assert!(lease.read_events_after_checkpoint("order").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_rolled_back_advance_leaves_checkpoint(pool: PgPool) {
    let subs = PgSubscriptionRepository::new(pool.clone());
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();

    let mut lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();
    lease.advance(CheckpointPosition::new(42, 7)).await.unwrap();
    lease.rollback().await.unwrap();

    assert_eq!(stored_checkpoint(&pool).await, (0, 0));
}

#[sqlx::test(migrations = "../../migrations/event_store")]
async fn test_dropped_lease_releases_lock_without_advancing(pool: PgPool) {
    let subs = PgSubscriptionRepository::new(pool.clone());
    subs.ensure_subscription(SUBSCRIPTION).await.unwrap();

    {
        let mut lease = subs.lock_subscription(SUBSCRIPTION).await.unwrap().unwrap();
        lease.advance(CheckpointPosition::new(42, 7)).await.unwrap();
    }

    let mut relocked = None;
    for _ in 0..100 {
        relocked = subs.lock_subscription(SUBSCRIPTION).await.unwrap();
        if relocked.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(relocked.is_some());
    assert_eq!(stored_checkpoint(&pool).await, (0, 0));
}
