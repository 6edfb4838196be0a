//! The optimistic concurrency gate.
//!
//! The version record update and the event inserts share one transaction.
//! Under READ COMMITTED a competing `UPDATE` blocks on the row lock, then
//! re-checks its guard against the committed version and affects no rows.

use async_trait::async_trait;
use tracing::debug;

use ordering_core::error::DomainError;
use ordering_core::repository::{AggregateCommit, AggregateRepository, NewEvent, StoredEvent};

use crate::error::infrastructure;
use crate::pg_event_repository::{PgEventRepository, insert_events};

const INSERT_VERSION: &str = r"
INSERT INTO aggregate_versions (aggregate_id, version, aggregate_type)
VALUES ($1, $2, $3)
ON CONFLICT (aggregate_id) DO NOTHING
";

const UPDATE_VERSION: &str = r"
UPDATE aggregate_versions SET version = $2
WHERE aggregate_id = $1 AND version = $3
";

const SELECT_VERSION: &str = "SELECT version FROM aggregate_versions WHERE aggregate_id = $1";

#[async_trait]
impl AggregateRepository for PgEventRepository {
    async fn commit_aggregate(
        &self,
        commit: &AggregateCommit,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let result = if commit.expected_version == 0 {
            sqlx::query(INSERT_VERSION)
                .bind(commit.aggregate_id)
                .bind(commit.version)
                .bind(&commit.aggregate_type)
                .execute(&mut *tx)
                .await
        } else {
            sqlx::query(UPDATE_VERSION)
                .bind(commit.aggregate_id)
                .bind(commit.version)
                .bind(commit.expected_version)
                .execute(&mut *tx)
                .await
        }
        .map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar(SELECT_VERSION)
                .bind(commit.aggregate_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(infrastructure)?;
            tx.rollback().await.map_err(infrastructure)?;
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: commit.aggregate_id,
                expected: commit.expected_version,
                actual: actual.unwrap_or(0),
            });
        }

        let stored = insert_events(&mut tx, events).await?;
        tx.commit().await.map_err(infrastructure)?;

        debug!(
            aggregate_id = %commit.aggregate_id,
            version = commit.version,
            events = stored.len(),
            "aggregate committed"
        );
        Ok(stored)
    }
}
