//! The denormalized order read model.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ordering_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use super::aggregates::{Order, OrderItem};

/// One row of the order read table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// The order identifier.
    pub id: Uuid,
    /// The aggregate version this row reflects.
    pub version: i64,
    /// The order name.
    pub name: String,
    /// The items at `version`.
    pub order_items: Vec<OrderItem>,
    /// Whether the order has been submitted.
    pub is_submitted: bool,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    /// Builds the row for an order's current state.
    #[must_use]
    pub fn from_order(order: &Order, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: order.id,
            version: order.version,
            name: order.name.clone(),
            order_items: order.order_items.clone(),
            is_submitted: order.is_submitted,
            updated_at,
        }
    }
}

/// Storage for the order read table.
#[async_trait]
pub trait OrderReadRepository: Send + Sync {
    /// Insert or replace a row. A row is never replaced by an older version.
    async fn upsert(&self, view: &OrderView) -> Result<(), DomainError>;

    /// All rows, ordered by id.
    async fn list(&self) -> Result<Vec<OrderView>, DomainError>;

    /// One row, if present.
    async fn find(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError>;
}

/// A read table kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryOrderReadRepository {
    rows: Mutex<HashMap<Uuid, OrderView>>,
}

impl InMemoryOrderReadRepository {
    /// Creates an empty read table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, OrderView>>, DomainError> {
        self.rows
            .lock()
            .map_err(|_| DomainError::Infrastructure("order read model lock poisoned".into()))
    }
}

#[async_trait]
impl OrderReadRepository for InMemoryOrderReadRepository {
    async fn upsert(&self, view: &OrderView) -> Result<(), DomainError> {
        let mut rows = self.rows()?;
        let stale = rows
            .get(&view.id)
            .is_some_and(|existing| existing.version >= view.version);
        if !stale {
            rows.insert(view.id, view.clone());
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderView>, DomainError> {
        let mut views: Vec<OrderView> = self.rows()?.values().cloned().collect();
        views.sort_by_key(|view| view.id);
        Ok(views)
    }

    async fn find(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self.rows()?.get(&order_id).cloned())
    }
}
