//! Order use cases.

pub mod command_handlers;
pub mod integration_sender;
pub mod projection;
pub mod query_handlers;
