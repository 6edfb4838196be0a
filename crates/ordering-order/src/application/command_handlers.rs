//! Command handlers for the Order context.
//!
//! Each handler runs the command through the core write path (reconstruct,
//! mutate, commit under the concurrency gate, retry on conflict, snapshot)
//! and then hands the committed order to the synchronous projector.

use ordering_core::clock::Clock;
use ordering_core::command::Command;
use ordering_core::config::EventSourcingConfig;
use ordering_core::error::DomainError;
use ordering_core::executor::{self, CommandOutcome};
use ordering_core::handler::SyncEventHandler;
use ordering_core::repository::{EventStore, StoredEvent};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::commands::{CreateOrder, SubmitOrder, UpdateOrder, UpdateOrderItemAmount};

/// Collaborators every order command handler needs.
#[derive(Clone, Copy)]
pub struct OrderCommandContext<'a> {
    /// The event store.
    pub store: &'a dyn EventStore,
    /// The read model projector.
    pub projection: &'a dyn SyncEventHandler<Order>,
    /// Source of event timestamps.
    pub clock: &'a dyn Clock,
    /// Snapshot cadence and retry bound.
    pub config: &'a EventSourcingConfig,
}

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct OrderCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The order version after the command.
    pub version: i64,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

async fn finish<C: Command>(
    ctx: OrderCommandContext<'_>,
    command: &C,
    outcome: CommandOutcome<Order>,
) -> Result<OrderCommandResult, DomainError> {
    let order = outcome.aggregate;
    if !outcome.stored_events.is_empty() {
        ctx.projection.handle(&order).await.map_err(|e| {
            DomainError::Handler(format!(
                "order {} committed at version {} but projection failed: {e}",
                order.id, order.version
            ))
        })?;
    }

    info!(
        command_type = command.command_type(),
        order_id = %order.id,
        version = order.version,
        events = outcome.stored_events.len(),
        attempts = outcome.attempts,
        "order command applied"
    );
    Ok(OrderCommandResult {
        aggregate_id: order.id,
        version: order.version,
        stored_events: outcome.stored_events,
    })
}

/// Handles the `CreateOrder` command: creates the order and persists its
/// first event.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid items,
/// `DomainError::ConcurrencyConflict` if the id is already taken, and
/// storage or projection errors.
#[instrument(skip(command, ctx), fields(correlation_id = %command.correlation_id, order_id = %command.order_id))]
pub async fn handle_create_order(
    command: &CreateOrder,
    ctx: OrderCommandContext<'_>,
) -> Result<OrderCommandResult, DomainError> {
    let order = Order::create(
        command.order_id,
        command.name.clone(),
        command.order_items.clone(),
        ctx.clock,
    )?;
    let outcome = executor::create(ctx.store, ctx.config, command, order).await?;
    finish(ctx, command, outcome).await
}

/// Handles the `UpdateOrder` command: replaces the name and items.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for unknown orders,
/// `DomainError::Validation` for submitted orders or invalid items, and
/// storage or projection errors.
#[instrument(skip(command, ctx), fields(correlation_id = %command.correlation_id, order_id = %command.order_id))]
pub async fn handle_update_order(
    command: &UpdateOrder,
    ctx: OrderCommandContext<'_>,
) -> Result<OrderCommandResult, DomainError> {
    let outcome = executor::execute(
        ctx.store,
        ctx.config,
        command,
        command.order_id,
        |order: &mut Order| order.update(command.name.clone(), command.order_items.clone(), ctx.clock),
    )
    .await?;
    finish(ctx, command, outcome).await
}

/// Handles the `UpdateOrderItemAmount` command: changes one item's amount.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for unknown orders,
/// `DomainError::EntityNotFound` for unknown items,
/// `DomainError::Validation` for negative amounts or submitted orders, and
/// storage or projection errors.
#[instrument(skip(command, ctx), fields(correlation_id = %command.correlation_id, order_id = %command.order_id, item_id = %command.item_id))]
pub async fn handle_update_order_item_amount(
    command: &UpdateOrderItemAmount,
    ctx: OrderCommandContext<'_>,
) -> Result<OrderCommandResult, DomainError> {
    let outcome = executor::execute(
        ctx.store,
        ctx.config,
        command,
        command.order_id,
        |order: &mut Order| order.update_item_amount(command.item_id, command.amount, ctx.clock),
    )
    .await?;
    finish(ctx, command, outcome).await
}

/// Handles the `SubmitOrder` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for unknown orders,
/// `DomainError::Validation` if the order is already submitted, and storage
/// or projection errors.
#[instrument(skip(command, ctx), fields(correlation_id = %command.correlation_id, order_id = %command.order_id))]
pub async fn handle_submit_order(
    command: &SubmitOrder,
    ctx: OrderCommandContext<'_>,
) -> Result<OrderCommandResult, DomainError> {
    let outcome = executor::execute(
        ctx.store,
        ctx.config,
        command,
        command.order_id,
        |order: &mut Order| order.submit(ctx.clock),
    )
    .await?;
    finish(ctx, command, outcome).await
}
