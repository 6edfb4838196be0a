//! `PostgreSQL` order read table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ordering_core::error::DomainError;
use ordering_order::domain::aggregates::OrderItem;
use ordering_order::domain::read_model::{OrderReadRepository, OrderView};
use sqlx::PgPool;
use sqlx::migrate::MigrateError;
use sqlx::types::Json;
use uuid::Uuid;

// A row only moves forward; replaying an older projection is a no-op.
const UPSERT_ORDER: &str = r"
INSERT INTO orders (id, version, name, order_items, is_submitted, updated_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (id) DO UPDATE
SET version = EXCLUDED.version,
    name = EXCLUDED.name,
    order_items = EXCLUDED.order_items,
    is_submitted = EXCLUDED.is_submitted,
    updated_at = EXCLUDED.updated_at
WHERE orders.version < EXCLUDED.version
";

/// Applies pending migrations from `migrations/read_model`.
///
/// Versions applied by the event store migrator are ignored, so this can run
/// against a database shared with the event store.
///
/// # Errors
///
/// Returns the migrator's error if a migration fails.
pub async fn run_read_model_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let mut migrator = sqlx::migrate!("../../migrations/read_model");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}

const ORDER_COLUMNS: &str = "id, version, name, order_items, is_submitted, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    version: i64,
    name: String,
    order_items: Json<Vec<OrderItem>>,
    is_submitted: bool,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for OrderView {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            version: row.version,
            name: row.name,
            order_items: row.order_items.0,
            is_submitted: row.is_submitted,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed order read table.
#[derive(Debug, Clone)]
pub struct PgOrderReadRepository {
    pool: PgPool,
}

impl PgOrderReadRepository {
    /// Creates a new `PgOrderReadRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

#[async_trait]
impl OrderReadRepository for PgOrderReadRepository {
    async fn upsert(&self, view: &OrderView) -> Result<(), DomainError> {
        sqlx::query(UPSERT_ORDER)
            .bind(view.id)
            .bind(view.version)
            .bind(&view.name)
            .bind(Json(&view.order_items))
            .bind(view.is_submitted)
            .bind(view.updated_at)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderView>, DomainError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(rows.into_iter().map(OrderView::from).collect())
    }

    async fn find(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(row.map(OrderView::from))
    }
}
