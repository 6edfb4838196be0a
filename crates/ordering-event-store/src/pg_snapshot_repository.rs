//! `PostgreSQL` implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use uuid::Uuid;

use ordering_core::error::DomainError;
use ordering_core::repository::{AggregateSnapshot, SnapshotRepository};

use crate::error::infrastructure;
use crate::pg_event_repository::PgEventRepository;

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    aggregate_id: Uuid,
    version: i64,
    state_payload: serde_json::Value,
}

#[async_trait]
impl SnapshotRepository for PgEventRepository {
    async fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO snapshots (aggregate_id, version, state_payload) VALUES ($1, $2, $3) \
             ON CONFLICT (aggregate_id, version) DO NOTHING",
        )
        .bind(snapshot.aggregate_id)
        .bind(snapshot.version)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
        max_version: Option<i64>,
    ) -> Result<Option<AggregateSnapshot>, DomainError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT aggregate_id, version, state_payload FROM snapshots \
             WHERE aggregate_id = $1 AND ($2::bigint IS NULL OR version <= $2) \
             ORDER BY version DESC LIMIT 1",
        )
        .bind(aggregate_id)
        .bind(max_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(row.map(|row| AggregateSnapshot {
            aggregate_id: row.aggregate_id,
            version: row.version,
            state: row.state_payload,
        }))
    }
}
