//! The order aggregate root.

use ordering_core::aggregate::AggregateRoot;
use ordering_core::clock::Clock;
use ordering_core::error::DomainError;
use ordering_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    OrderCreated, OrderEvent, OrderEventKind, OrderItemAmountUpdated, OrderSubmitted,
    OrderUpdated,
};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item identifier, unique within the order.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Ordered amount, never negative.
    pub amount: i64,
}

/// The aggregate root for an order.
///
/// Serializes to the snapshot and integration payload shape; pending events
/// are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Order name.
    pub name: String,
    /// Current items.
    pub order_items: Vec<OrderItem>,
    /// Whether the order has been submitted.
    pub is_submitted: bool,
    /// Current version (event count).
    pub version: i64,
    #[serde(skip)]
    uncommitted_events: Vec<OrderEvent>,
}

fn validate_amount(amount: i64) -> Result<(), DomainError> {
    if amount < 0 {
        return Err(DomainError::Validation(format!(
            "item amount must not be negative, got {amount}"
        )));
    }
    Ok(())
}

fn validate_items(items: &[OrderItem]) -> Result<(), DomainError> {
    for (index, item) in items.iter().enumerate() {
        validate_amount(item.amount)?;
        if items[..index].iter().any(|other| other.id == item.id) {
            return Err(DomainError::Validation(format!(
                "item {} appears more than once",
                item.id
            )));
        }
    }
    Ok(())
}

impl Order {
    /// Creates an order, producing an `OrderCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if an amount is negative or an item
    /// id is repeated.
    pub fn create(
        id: Uuid,
        name: String,
        order_items: Vec<OrderItem>,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        validate_items(&order_items)?;
        let mut order = Self::empty(id);
        order.record(
            OrderEventKind::Created(OrderCreated { name, order_items }),
            clock,
        );
        Ok(order)
    }

    /// Replaces the name and items, producing an `OrderUpdated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order is submitted, an amount
    /// is negative, or an item id is repeated.
    pub fn update(
        &mut self,
        name: String,
        order_items: Vec<OrderItem>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        validate_items(&order_items)?;
        self.record(
            OrderEventKind::Updated(OrderUpdated { name, order_items }),
            clock,
        );
        Ok(())
    }

    /// Changes one item's amount, producing an `OrderItemAmountUpdated`
    /// event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order is submitted or the
    /// amount is negative, and `DomainError::EntityNotFound` if the order has
    /// no such item.
    pub fn update_item_amount(
        &mut self,
        item_id: Uuid,
        amount: i64,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        validate_amount(amount)?;
        if !self.order_items.iter().any(|item| item.id == item_id) {
            return Err(DomainError::EntityNotFound {
                aggregate_id: self.id,
                entity_id: item_id,
            });
        }
        self.record(
            OrderEventKind::ItemAmountUpdated(OrderItemAmountUpdated {
                id: item_id,
                amount,
            }),
            clock,
        );
        Ok(())
    }

    /// Submits the order, producing an `OrderSubmitted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the order is already submitted.
    pub fn submit(&mut self, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.record(OrderEventKind::Submitted(OrderSubmitted {}), clock);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_submitted {
            return Err(DomainError::Validation(format!(
                "order {} is submitted",
                self.id
            )));
        }
        Ok(())
    }

    fn record(&mut self, kind: OrderEventKind, clock: &dyn Clock) {
        let event = OrderEvent {
            metadata: EventMetadata {
                aggregate_id: self.id,
                version: self.version + 1,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.apply(&event);
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for Order {
    type Event = OrderEvent;

    const AGGREGATE_TYPE: &'static str = "order";

    fn empty(aggregate_id: Uuid) -> Self {
        Self {
            id: aggregate_id,
            name: String::new(),
            order_items: Vec::new(),
            is_submitted: false,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            OrderEventKind::Created(payload) => {
                self.name.clone_from(&payload.name);
                self.order_items.clone_from(&payload.order_items);
            }
            OrderEventKind::Updated(payload) => {
                self.name.clone_from(&payload.name);
                self.order_items.clone_from(&payload.order_items);
            }
            OrderEventKind::ItemAmountUpdated(payload) => {
                if let Some(item) = self.order_items.iter_mut().find(|i| i.id == payload.id) {
                    item.amount = payload.amount;
                }
            }
            OrderEventKind::Submitted(_) => self.is_submitted = true,
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
