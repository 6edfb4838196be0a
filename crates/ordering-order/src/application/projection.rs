//! Keeps the order read table current after every applied command.

use std::sync::Arc;

use async_trait::async_trait;
use ordering_core::aggregate::AggregateRoot;
use ordering_core::clock::Clock;
use ordering_core::error::DomainError;
use ordering_core::handler::{HandlesAggregate, SyncEventHandler};
use tracing::debug;

use crate::domain::aggregates::Order;
use crate::domain::read_model::{OrderReadRepository, OrderView};

/// Synchronous projector writing [`OrderView`] rows.
#[derive(Clone)]
pub struct OrderProjection {
    read_repo: Arc<dyn OrderReadRepository>,
    clock: Arc<dyn Clock>,
}

impl OrderProjection {
    /// Creates a projector over `read_repo`, stamping rows with `clock`.
    #[must_use]
    pub fn new(read_repo: Arc<dyn OrderReadRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { read_repo, clock }
    }
}

impl HandlesAggregate for OrderProjection {
    fn aggregate_type(&self) -> &str {
        Order::AGGREGATE_TYPE
    }
}

#[async_trait]
impl SyncEventHandler<Order> for OrderProjection {
    async fn handle(&self, order: &Order) -> Result<(), DomainError> {
        let view = OrderView::from_order(order, self.clock.now());
        self.read_repo.upsert(&view).await?;
        debug!(order_id = %order.id, version = order.version, "order projected");
        Ok(())
    }
}
