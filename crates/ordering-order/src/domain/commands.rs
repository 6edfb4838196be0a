//! Commands for the Order context.

use ordering_core::command::Command;
use uuid::Uuid;

use super::aggregates::OrderItem;

/// Command to create an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The identifier assigned to the new order.
    pub order_id: Uuid,
    /// The order name.
    pub name: String,
    /// The initial items.
    pub order_items: Vec<OrderItem>,
}

impl Command for CreateOrder {
    fn command_type(&self) -> &'static str {
        "order.create_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to replace an order's name and items.
#[derive(Debug, Clone)]
pub struct UpdateOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order identifier.
    pub order_id: Uuid,
    /// The new name.
    pub name: String,
    /// The new items.
    pub order_items: Vec<OrderItem>,
}

impl Command for UpdateOrder {
    fn command_type(&self) -> &'static str {
        "order.update_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change the amount of one item.
#[derive(Debug, Clone)]
pub struct UpdateOrderItemAmount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order identifier.
    pub order_id: Uuid,
    /// The item identifier.
    pub item_id: Uuid,
    /// The new amount.
    pub amount: i64,
}

impl Command for UpdateOrderItemAmount {
    fn command_type(&self) -> &'static str {
        "order.update_order_item_amount"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to submit an order.
#[derive(Debug, Clone)]
pub struct SubmitOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order identifier.
    pub order_id: Uuid,
}

impl Command for SubmitOrder {
    fn command_type(&self) -> &'static str {
        "order.submit_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
