//! Publishes every committed order event to the message broker.

use std::sync::Arc;

use async_trait::async_trait;
use ordering_core::aggregate::AggregateRoot;
use ordering_core::broker::MessageBroker;
use ordering_core::error::DomainError;
use ordering_core::handler::{AsyncEventHandler, HandlesAggregate};
use ordering_core::reconstruction::reconstruct;
use ordering_core::repository::{EventStore, StoredEvent};
use tracing::info;

use crate::domain::aggregates::Order;

/// Default subscription name of the order integration sender.
pub const DEFAULT_SUBSCRIPTION_NAME: &str = "OrderIntegrationEventSender";

/// Default topic order events are published to.
pub const DEFAULT_ORDER_EVENT_TOPIC: &str = "ORDER_EVENT";

/// Async handler that reconstructs the order as of each event and publishes
/// it, keyed by the event type.
pub struct OrderIntegrationEventSender {
    store: Arc<dyn EventStore>,
    broker: Arc<dyn MessageBroker>,
    topic: String,
    subscription_name: String,
}

impl OrderIntegrationEventSender {
    /// Creates a sender publishing to `topic` and advancing
    /// `subscription_name`.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        broker: Arc<dyn MessageBroker>,
        topic: impl Into<String>,
        subscription_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            broker,
            topic: topic.into(),
            subscription_name: subscription_name.into(),
        }
    }
}

impl HandlesAggregate for OrderIntegrationEventSender {
    fn aggregate_type(&self) -> &str {
        Order::AGGREGATE_TYPE
    }
}

#[async_trait]
impl AsyncEventHandler for OrderIntegrationEventSender {
    fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        let order = reconstruct::<Order>(self.store.as_ref(), event.aggregate_id, Some(event.version))
            .await?
            .ok_or(DomainError::AggregateNotFound(event.aggregate_id))?;

        let payload = serde_json::to_vec(&order)
            .map_err(|e| DomainError::Infrastructure(format!("order serialization failed: {e}")))?;

        self.broker
            .publish(&self.topic, &event.event_type, &payload)
            .await?;

        info!(
            order_id = %event.aggregate_id,
            version = event.version,
            event_type = %event.event_type,
            topic = %self.topic,
            "order event published"
        );
        Ok(())
    }
}
