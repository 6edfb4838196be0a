//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ordering_core::clock::Clock;
use ordering_core::config::EventSourcingConfig;
use ordering_event_store::{PgEventRepository, run_migrations};
use ordering_test_support::FixedClock;
use sqlx::PgPool;
use tower::ServiceExt;

use ordering_api::read_model::{PgOrderReadRepository, run_read_model_migrations};
use ordering_api::routes;
use ordering_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Apply both migration sets to one test database, as `main` does when the
/// read model shares the event store database.
pub async fn migrate(pool: &PgPool) {
    run_migrations(pool).await.unwrap();
    run_read_model_migrations(pool).await.unwrap();
}

/// Build the app state over real `PostgreSQL` stores and a fixed clock.
pub fn build_test_state(pool: PgPool) -> AppState {
    AppState::new(
        Arc::new(PgEventRepository::new(pool.clone())),
        Arc::new(PgOrderReadRepository::new(pool)),
        fixed_clock(),
        EventSourcingConfig::default(),
    )
}

/// Build the full app router with the same route structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    routes::router(build_test_state(pool))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, body).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "PUT", uri, body).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
