//! Transactional polling publisher.
//!
//! Each tick locks a subscription's checkpoint row, reads the events that
//! are committed and below the visibility watermark, hands them to an
//! [`AsyncEventHandler`](ordering_core::handler::AsyncEventHandler), and
//! advances the checkpoint, all inside the lock's transaction.

pub mod processor;
pub mod runner;

pub use processor::{EventSubscriptionProcessor, PublisherState, TickError, TickOutcome};
pub use runner::{PollingPublisher, PublisherHandle};
