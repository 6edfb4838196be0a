//! Domain events for the Order context.

use ordering_core::error::DomainError;
use ordering_core::event::{DomainEvent, EventMetadata};
use ordering_core::repository::StoredEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::OrderItem;

/// Event type identifier for [`OrderCreated`].
pub const ORDER_CREATED_EVENT_TYPE: &str = "order.created";
/// Event type identifier for [`OrderUpdated`].
pub const ORDER_UPDATED_EVENT_TYPE: &str = "order.updated";
/// Event type identifier for [`OrderItemAmountUpdated`].
pub const ORDER_ITEM_AMOUNT_UPDATED_EVENT_TYPE: &str = "order.item_amount_updated";
/// Event type identifier for [`OrderSubmitted`].
pub const ORDER_SUBMITTED_EVENT_TYPE: &str = "order.submitted";

/// Emitted when an order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// The order name.
    pub name: String,
    /// The initial items.
    pub order_items: Vec<OrderItem>,
}

/// Emitted when an order's name and items are replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdated {
    /// The new order name.
    pub name: String,
    /// The new items.
    pub order_items: Vec<OrderItem>,
}

/// Emitted when the amount of one item changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemAmountUpdated {
    /// The item identifier.
    pub id: Uuid,
    /// The new amount.
    pub amount: i64,
}

/// Emitted when an order is submitted. No further changes are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderSubmitted {}

/// Event payload variants for the Order context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEventKind {
    /// The order has been created.
    Created(OrderCreated),
    /// The order's name and items have been replaced.
    Updated(OrderUpdated),
    /// An item amount has changed.
    ItemAmountUpdated(OrderItemAmountUpdated),
    /// The order has been submitted.
    Submitted(OrderSubmitted),
}

/// Domain event envelope for the Order context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: OrderEventKind,
}

fn to_value<T: Serialize>(payload: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(payload)
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
}

fn from_value<T: DeserializeOwned>(stored: &StoredEvent) -> Result<T, DomainError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| DomainError::EventDecoding {
        event_type: stored.event_type.clone(),
        reason: e.to_string(),
    })
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            OrderEventKind::Created(_) => ORDER_CREATED_EVENT_TYPE,
            OrderEventKind::Updated(_) => ORDER_UPDATED_EVENT_TYPE,
            OrderEventKind::ItemAmountUpdated(_) => ORDER_ITEM_AMOUNT_UPDATED_EVENT_TYPE,
            OrderEventKind::Submitted(_) => ORDER_SUBMITTED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        match &self.kind {
            OrderEventKind::Created(payload) => to_value(payload),
            OrderEventKind::Updated(payload) => to_value(payload),
            OrderEventKind::ItemAmountUpdated(payload) => to_value(payload),
            OrderEventKind::Submitted(payload) => to_value(payload),
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind = match stored.event_type.as_str() {
            ORDER_CREATED_EVENT_TYPE => OrderEventKind::Created(from_value(stored)?),
            ORDER_UPDATED_EVENT_TYPE => OrderEventKind::Updated(from_value(stored)?),
            ORDER_ITEM_AMOUNT_UPDATED_EVENT_TYPE => {
                OrderEventKind::ItemAmountUpdated(from_value(stored)?)
            }
            ORDER_SUBMITTED_EVENT_TYPE => OrderEventKind::Submitted(from_value(stored)?),
            other => {
                return Err(DomainError::EventDecoding {
                    event_type: other.to_owned(),
                    reason: "unknown order event type".to_owned(),
                });
            }
        };
        Ok(Self {
            metadata: EventMetadata {
                aggregate_id: stored.aggregate_id,
                version: stored.version,
                occurred_at: stored.created_at,
            },
            kind,
        })
    }
}
