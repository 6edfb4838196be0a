//! `PostgreSQL` subscription checkpoint store.
//!
//! A checkpoint row is locked with `FOR UPDATE SKIP LOCKED`, so at most one
//! publisher instance processes a subscription at a time and the others
//! skip their tick instead of queueing behind the lock.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use ordering_core::error::DomainError;
use ordering_core::repository::StoredEvent;
use ordering_core::subscription::{
    CheckpointPosition, SubscriptionCheckpoint, SubscriptionLease, SubscriptionRepository,
};

use crate::error::infrastructure;
use crate::pg_event_repository::EventRow;

const LOCK_SUBSCRIPTION: &str = r"
SELECT subscription_name, last_transaction_id, last_event_id
FROM subscriptions
WHERE subscription_name = $1
FOR UPDATE SKIP LOCKED
";

const READ_AFTER_CHECKPOINT: &str = r"
SELECT e.sequence_id, e.transaction_id, e.aggregate_id, e.event_type,
       e.event_payload, e.version, e.created_at
FROM events e
JOIN aggregate_versions a ON a.aggregate_id = e.aggregate_id
WHERE a.aggregate_type = $1
  AND (e.transaction_id, e.sequence_id) > ($2, $3)
  AND e.transaction_id < pg_snapshot_xmin(pg_current_snapshot())::text::bigint
ORDER BY e.transaction_id ASC, e.sequence_id ASC
";

const ADVANCE: &str = r"
UPDATE subscriptions
SET last_transaction_id = $2, last_event_id = $3
WHERE subscription_name = $1
";

#[derive(Debug, sqlx::FromRow)]
struct CheckpointRow {
    subscription_name: String,
    last_transaction_id: i64,
    last_event_id: i64,
}

/// PostgreSQL-backed subscription checkpoint store.
#[derive(Debug, Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Creates a new `PgSubscriptionRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn ensure_subscription(&self, subscription_name: &str) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO subscriptions (subscription_name) VALUES ($1) \
             ON CONFLICT (subscription_name) DO NOTHING",
        )
        .bind(subscription_name)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn lock_subscription(
        &self,
        subscription_name: &str,
    ) -> Result<Option<Box<dyn SubscriptionLease>>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        let row = sqlx::query_as::<_, CheckpointRow>(LOCK_SUBSCRIPTION)
            .bind(subscription_name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(infrastructure)?;
            debug!(subscription_name, "subscription busy or missing");
            return Ok(None);
        };

        Ok(Some(Box::new(PgSubscriptionLease {
            tx: Some(tx),
            checkpoint: SubscriptionCheckpoint {
                subscription_name: row.subscription_name,
                position: CheckpointPosition::new(row.last_transaction_id, row.last_event_id),
            },
        })))
    }
}

/// A locked checkpoint row. Dropping it without committing lets sqlx roll
/// the transaction back.
pub struct PgSubscriptionLease {
    tx: Option<Transaction<'static, Postgres>>,
    checkpoint: SubscriptionCheckpoint,
}

impl PgSubscriptionLease {
    fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, DomainError> {
        self.tx.as_mut().ok_or_else(|| {
            DomainError::Infrastructure(format!(
                "lease on subscription {} already released",
                self.checkpoint.subscription_name
            ))
        })
    }
}

#[async_trait]
impl SubscriptionLease for PgSubscriptionLease {
    fn checkpoint(&self) -> &SubscriptionCheckpoint {
        &self.checkpoint
    }

    async fn read_events_after_checkpoint(
        &mut self,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let after = self.checkpoint.position;
        let tx = self.transaction()?;
        let rows = sqlx::query_as::<_, EventRow>(READ_AFTER_CHECKPOINT)
            .bind(aggregate_type)
            .bind(after.transaction_id)
            .bind(after.event_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(infrastructure)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn advance(&mut self, position: CheckpointPosition) -> Result<u64, DomainError> {
        let name = self.checkpoint.subscription_name.clone();
        let tx = self.transaction()?;
        let result = sqlx::query(ADVANCE)
            .bind(name)
            .bind(position.transaction_id)
            .bind(position.event_id)
            .execute(&mut **tx)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(infrastructure),
            None => Err(DomainError::Infrastructure(format!(
                "lease on subscription {} already released",
                self.checkpoint.subscription_name
            ))),
        }
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(infrastructure),
            None => Ok(()),
        }
    }
}
