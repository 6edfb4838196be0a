//! HTTP routes.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod orders;

/// Builds the full router. `main` adds the tracing and CORS layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/orders", orders::router())
        .with_state(state)
}
