//! Routes for the Order bounded context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use ordering_order::application::command_handlers::{self, OrderCommandResult};
use ordering_order::application::query_handlers::{self, OrderDetails};
use ordering_order::domain::aggregates::OrderItem;
use ordering_order::domain::commands;
use ordering_order::domain::read_model::OrderView;

use crate::error::ApiError;
use crate::state::AppState;

/// One item in a create or update request. A missing id is assigned by the
/// server.
#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    /// Item identifier, unique within the order.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Ordered amount.
    pub amount: i64,
}

/// Request body for POST / and PUT /{id}.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    /// Order name.
    pub name: String,
    /// Order items.
    #[serde(default)]
    pub order_items: Vec<OrderItemRequest>,
}

/// Request body for PUT /{id}/items/{item_id}.
#[derive(Debug, Deserialize)]
pub struct UpdateItemAmountRequest {
    /// The new amount.
    pub amount: i64,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The order the command applied to.
    pub aggregate_id: Uuid,
    /// The order version after the command.
    pub version: i64,
    /// Sequence ids of the events produced and persisted.
    pub event_ids: Vec<i64>,
}

impl From<OrderCommandResult> for CommandResponse {
    fn from(result: OrderCommandResult) -> Self {
        Self {
            aggregate_id: result.aggregate_id,
            version: result.version,
            event_ids: result.stored_events.iter().map(|e| e.sequence_id).collect(),
        }
    }
}

/// Response body for GET /.
#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    /// Every projected order.
    pub orders: Vec<OrderView>,
}

fn into_items(items: Vec<OrderItemRequest>) -> Vec<OrderItem> {
    items
        .into_iter()
        .map(|item| OrderItem {
            id: item.id.unwrap_or_else(Uuid::now_v7),
            name: item.name,
            amount: item.amount,
        })
        .collect()
}

/// POST /
#[instrument(skip(state, request))]
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::CreateOrder {
        correlation_id: Uuid::new_v4(),
        order_id: Uuid::now_v7(),
        name: request.name,
        order_items: into_items(request.order_items),
    };

    info!(correlation_id = %command.correlation_id, order_id = %command.order_id, "handling create_order command");

    let result = command_handlers::handle_create_order(&command, state.command_context()).await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// PUT /{id}
#[instrument(skip(state, request), fields(order_id = %order_id))]
async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::UpdateOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
        name: request.name,
        order_items: into_items(request.order_items),
    };

    info!(correlation_id = %command.correlation_id, "handling update_order command");

    let result = command_handlers::handle_update_order(&command, state.command_context()).await?;

    Ok(Json(result.into()))
}

/// PUT /{id}/items/{item_id}
#[instrument(skip(state, request), fields(order_id = %order_id, item_id = %item_id))]
async fn update_order_item_amount(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateItemAmountRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::UpdateOrderItemAmount {
        correlation_id: Uuid::new_v4(),
        order_id,
        item_id,
        amount: request.amount,
    };

    info!(correlation_id = %command.correlation_id, amount = command.amount, "handling update_order_item_amount command");

    let result =
        command_handlers::handle_update_order_item_amount(&command, state.command_context())
            .await?;

    Ok(Json(result.into()))
}

/// POST /{id}/submit
#[instrument(skip(state), fields(order_id = %order_id))]
async fn submit_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SubmitOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_order command");

    let result = command_handlers::handle_submit_order(&command, state.command_context()).await?;

    Ok(Json(result.into()))
}

/// GET /
#[instrument(skip(state))]
async fn list_orders(State(state): State<AppState>) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = query_handlers::list_orders(state.read_repository.as_ref()).await?;
    Ok(Json(OrderListResponse { orders }))
}

/// GET /{id}
#[instrument(skip(state), fields(order_id = %order_id))]
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order = query_handlers::get_order_by_id(order_id, state.event_store.as_ref()).await?;
    Ok(Json(order))
}

/// Returns the router for the order context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/{id}", put(update_order).get(get_order))
        .route("/{id}/items/{item_id}", put(update_order_item_amount))
        .route("/{id}/submit", post(submit_order))
}
