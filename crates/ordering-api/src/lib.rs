//! Ordering API: HTTP surface, configuration and process wiring for the
//! ordering service.

pub mod config;
pub mod error;
pub mod read_model;
pub mod routes;
pub mod state;
pub mod telemetry;
