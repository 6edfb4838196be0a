//! Shared test fakes and utilities for the ordering service.

mod broker;
mod clock;
mod handler;
mod memory_store;
mod repository;

pub use broker::{PublishedMessage, RecordingMessageBroker};
pub use clock::FixedClock;
pub use handler::RecordingEventHandler;
pub use memory_store::{InMemoryEventStore, OpenTransaction};
pub use repository::FailingEventStore;
