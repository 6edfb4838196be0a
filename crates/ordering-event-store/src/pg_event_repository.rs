//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use ordering_core::error::DomainError;
use ordering_core::repository::{EventRepository, NewEvent, StoredEvent};

use crate::error::{infrastructure, is_unique_violation};

pub(crate) const EVENT_COLUMNS: &str =
    "sequence_id, transaction_id, aggregate_id, event_type, event_payload, version, created_at";

const INSERT_EVENT: &str = r"
INSERT INTO events (transaction_id, aggregate_id, event_type, event_payload, version, created_at)
VALUES (pg_current_xact_id()::text::bigint, $1, $2, $3, $4, $5)
RETURNING sequence_id, transaction_id, aggregate_id, event_type, event_payload, version, created_at
";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    sequence_id: i64,
    transaction_id: i64,
    aggregate_id: Uuid,
    event_type: String,
    event_payload: serde_json::Value,
    version: i64,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            sequence_id: row.sequence_id,
            transaction_id: row.transaction_id,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.event_payload,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed event log, snapshot store and concurrency gate.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pub(crate) pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Inserts events on `conn`, stamping each with the current transaction id.
///
/// A duplicate `(aggregate_id, version)` is reported as a concurrency
/// conflict.
pub(crate) async fn insert_events(
    conn: &mut PgConnection,
    events: &[NewEvent],
) -> Result<Vec<StoredEvent>, DomainError> {
    let mut stored = Vec::with_capacity(events.len());
    for event in events {
        let row = sqlx::query_as::<_, EventRow>(INSERT_EVENT)
            .bind(event.aggregate_id)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.version)
            .bind(event.created_at)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::ConcurrencyConflict {
                        aggregate_id: event.aggregate_id,
                        expected: event.version - 1,
                        actual: event.version,
                    }
                } else {
                    infrastructure(e)
                }
            })?;
        stored.push(StoredEvent::from(row));
    }
    Ok(stored)
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn append_events(&self, events: &[NewEvent]) -> Result<Vec<StoredEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        let stored = insert_events(&mut tx, events).await?;
        tx.commit().await.map_err(infrastructure)?;
        debug!(count = stored.len(), "appended events");
        Ok(stored)
    }

    async fn load_events(
        &self,
        aggregate_id: Uuid,
        from_version: Option<i64>,
        to_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE aggregate_id = $1 \
               AND ($2::bigint IS NULL OR version >= $2) \
               AND ($3::bigint IS NULL OR version <= $3) \
             ORDER BY version ASC"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(aggregate_id)
            .bind(from_version)
            .bind(to_version)
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }
}
