//! Handler capabilities for projections and integration senders.
//!
//! The command path depends only on [`SyncEventHandler`]; the polling
//! publisher depends only on [`AsyncEventHandler`].

use async_trait::async_trait;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::repository::StoredEvent;

/// Common accessor shared by every handler shape.
pub trait HandlesAggregate {
    /// The aggregate type whose events this handler consumes.
    fn aggregate_type(&self) -> &str;
}

/// A handler invoked synchronously once per successfully applied command,
/// with the aggregate state after the command.
#[async_trait]
pub trait SyncEventHandler<A: AggregateRoot>: HandlesAggregate + Send + Sync {
    /// Handle the freshly committed aggregate.
    async fn handle(&self, aggregate: &A) -> Result<(), DomainError>;
}

/// A handler driven by the polling publisher, once per committed event.
///
/// Delivery is at-least-once: a failed tick redelivers every event of that
/// tick, so implementations must tolerate duplicates.
#[async_trait]
pub trait AsyncEventHandler: HandlesAggregate + Send + Sync {
    /// The name of the checkpoint row this handler advances.
    fn subscription_name(&self) -> &str;

    /// Handle one committed event.
    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError>;
}
