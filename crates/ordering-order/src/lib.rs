//! Order bounded context.
//!
//! An order is a named list of items with amounts. It is event sourced
//! through `ordering-core`, kept in a denormalized read table by
//! [`application::projection::OrderProjection`], and published to the
//! broker by [`application::integration_sender::OrderIntegrationEventSender`].

pub mod application;
pub mod domain;
