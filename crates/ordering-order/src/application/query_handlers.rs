//! Query handlers for the Order context.
//!
//! Single orders are reconstructed from the event store, so they always
//! reflect the latest committed version. Listing reads the projected table.

use ordering_core::error::DomainError;
use ordering_core::reconstruction::reconstruct;
use ordering_core::repository::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem};
use crate::domain::read_model::{OrderReadRepository, OrderView};

/// Read-only view of an order reconstructed from its events.
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    /// The order identifier.
    pub order_id: Uuid,
    /// The order name.
    pub name: String,
    /// Current items.
    pub order_items: Vec<OrderItem>,
    /// Whether the order has been submitted.
    pub is_submitted: bool,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves an order by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the order has no history,
/// and reconstruction errors otherwise.
pub async fn get_order_by_id(
    order_id: Uuid,
    store: &dyn EventStore,
) -> Result<OrderDetails, DomainError> {
    let order = reconstruct::<Order>(store, order_id, None)
        .await?
        .ok_or(DomainError::AggregateNotFound(order_id))?;
    Ok(OrderDetails {
        order_id,
        name: order.name,
        order_items: order.order_items,
        is_submitted: order.is_submitted,
        version: order.version,
    })
}

/// Lists every order in the read table.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the read table cannot be read.
pub async fn list_orders(
    read_repo: &dyn OrderReadRepository,
) -> Result<Vec<OrderView>, DomainError> {
    read_repo.list().await
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use ordering_core::aggregate::AggregateRoot;
    use ordering_core::config::EventSourcingConfig;
    use ordering_core::error::DomainError;
    use ordering_core::executor;
    use ordering_test_support::{FailingEventStore, FixedClock, InMemoryEventStore};
    use uuid::Uuid;

    use crate::application::query_handlers::{get_order_by_id, list_orders};
    use crate::domain::aggregates::{Order, OrderItem};
    use crate::domain::commands::CreateOrder;
    use crate::domain::read_model::{InMemoryOrderReadRepository, OrderReadRepository, OrderView};

    #[tokio::test]
    async fn test_get_order_by_id_returns_reconstructed_order() {
        // Arrange
        let store = InMemoryEventStore::new();
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let order_id = Uuid::new_v4();
        let apple = OrderItem {
            id: Uuid::new_v4(),
            name: "apple".to_owned(),
            amount: 2,
        };
        let mut order =
            Order::create(order_id, "weekly".to_owned(), vec![apple.clone()], &clock).unwrap();
        order.update_item_amount(apple.id, 4, &clock).unwrap();
        let command = CreateOrder {
            correlation_id: Uuid::new_v4(),
            order_id,
            name: "weekly".to_owned(),
            order_items: vec![apple.clone()],
        };
        executor::create(&store, &EventSourcingConfig::default(), &command, order)
            .await
            .unwrap();

        // Act
        let details = get_order_by_id(order_id, &store).await.unwrap();

        // Assert
        assert_eq!(details.order_id, order_id);
        assert_eq!(details.name, "weekly");
        assert_eq!(details.version, 2);
        assert_eq!(details.order_items[0].amount, 4);
        assert!(!details.is_submitted);
    }

    #[tokio::test]
    async fn test_get_order_by_id_returns_not_found_when_no_events() {
        // Arrange
        let store = InMemoryEventStore::new();
        let order_id = Uuid::new_v4();

        // Act
        let result = get_order_by_id(order_id, &store).await;

        // Assert
        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, order_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_order_by_id_propagates_store_errors() {
        // Act
        let result = get_order_by_id(Uuid::new_v4(), &FailingEventStore).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_list_orders_returns_projected_rows() {
        // Arrange
        let read_repo = InMemoryOrderReadRepository::new();
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let order = Order::create(Uuid::new_v4(), "weekly".to_owned(), vec![], &clock).unwrap();
        read_repo
            .upsert(&OrderView::from_order(&order, clock.0))
            .await
            .unwrap();

        // Act
        let views = list_orders(&read_repo).await.unwrap();

        // Assert
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, order.aggregate_id());
        assert_eq!(views[0].version, 1);
    }
}
