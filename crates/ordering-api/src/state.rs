//! Shared application state.

use std::sync::Arc;

use ordering_core::clock::Clock;
use ordering_core::config::EventSourcingConfig;
use ordering_core::handler::SyncEventHandler;
use ordering_core::repository::EventStore;
use ordering_order::application::command_handlers::OrderCommandContext;
use ordering_order::application::projection::OrderProjection;
use ordering_order::domain::aggregates::Order;
use ordering_order::domain::read_model::OrderReadRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event store backing the write path and single-order queries.
    pub event_store: Arc<dyn EventStore>,
    /// Read table backing order listings.
    pub read_repository: Arc<dyn OrderReadRepository>,
    /// Projector run after every applied command.
    pub projection: Arc<dyn SyncEventHandler<Order>>,
    /// Clock for deterministic timestamps.
    pub clock: Arc<dyn Clock>,
    /// Snapshot cadence and conflict retry bound.
    pub event_sourcing: EventSourcingConfig,
}

impl AppState {
    /// Create new application state. The order projection writes to
    /// `read_repository`.
    #[must_use]
    pub fn new(
        event_store: Arc<dyn EventStore>,
        read_repository: Arc<dyn OrderReadRepository>,
        clock: Arc<dyn Clock>,
        event_sourcing: EventSourcingConfig,
    ) -> Self {
        let projection = Arc::new(OrderProjection::new(
            Arc::clone(&read_repository),
            Arc::clone(&clock),
        ));
        Self {
            event_store,
            read_repository,
            projection,
            clock,
            event_sourcing,
        }
    }

    /// Borrows the collaborators order command handlers need.
    #[must_use]
    pub fn command_context(&self) -> OrderCommandContext<'_> {
        OrderCommandContext {
            store: self.event_store.as_ref(),
            projection: self.projection.as_ref(),
            clock: self.clock.as_ref(),
            config: &self.event_sourcing,
        }
    }
}
