//! Recording async event handler.

use std::sync::Mutex;

use async_trait::async_trait;
use ordering_core::error::DomainError;
use ordering_core::handler::{AsyncEventHandler, HandlesAggregate};
use ordering_core::repository::StoredEvent;

/// An async handler that records every event it is given and can be told to
/// reject a specific event, or to panic on it.
#[derive(Debug)]
pub struct RecordingEventHandler {
    aggregate_type: String,
    subscription_name: String,
    handled: Mutex<Vec<StoredEvent>>,
    fail_on: Mutex<Option<i64>>,
    panic_on: Mutex<Option<i64>>,
}

impl RecordingEventHandler {
    /// Create a handler for `aggregate_type` advancing `subscription_name`.
    #[must_use]
    pub fn new(aggregate_type: &str, subscription_name: &str) -> Self {
        Self {
            aggregate_type: aggregate_type.to_owned(),
            subscription_name: subscription_name.to_owned(),
            handled: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            panic_on: Mutex::new(None),
        }
    }

    /// Reject the event with this sequence id until cleared with `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, sequence_id: Option<i64>) {
        *self.fail_on.lock().unwrap() = sequence_id;
    }

    /// Panic on the event with this sequence id until cleared with `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn panic_on(&self, sequence_id: Option<i64>) {
        *self.panic_on.lock().unwrap() = sequence_id;
    }

    /// Every event handled so far, including redeliveries, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled(&self) -> Vec<StoredEvent> {
        self.handled.lock().unwrap().clone()
    }

    /// Sequence ids of handled events, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled_sequence_ids(&self) -> Vec<i64> {
        self.handled().iter().map(|e| e.sequence_id).collect()
    }
}

impl HandlesAggregate for RecordingEventHandler {
    fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }
}

#[async_trait]
impl AsyncEventHandler for RecordingEventHandler {
    fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        let panic_on = *self.panic_on.lock().unwrap();
        assert!(
            panic_on != Some(event.sequence_id),
            "handler panicked on event {}",
            event.sequence_id
        );
        self.handled.lock().unwrap().push(event.clone());
        if *self.fail_on.lock().unwrap() == Some(event.sequence_id) {
            return Err(DomainError::Handler(format!(
                "rejected event {}",
                event.sequence_id
            )));
        }
        Ok(())
    }
}
