//! Subscription checkpoint store abstractions.
//!
//! A subscription is a named, durable cursor over the event log. The cursor
//! row doubles as a mutex: whoever holds its row lock owns the subscription
//! for the duration of one transaction.

use std::fmt;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::repository::StoredEvent;

/// A position in the publish order: `(transaction_id, event_id)`, compared
/// lexicographically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckpointPosition {
    /// Transaction identifier of the last processed event.
    pub transaction_id: i64,
    /// Sequence identifier of the last processed event.
    pub event_id: i64,
}

impl CheckpointPosition {
    /// The position before any event.
    pub const START: Self = Self {
        transaction_id: 0,
        event_id: 0,
    };

    /// Creates a new position.
    #[must_use]
    pub const fn new(transaction_id: i64, event_id: i64) -> Self {
        Self {
            transaction_id,
            event_id,
        }
    }
}

impl fmt::Display for CheckpointPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.event_id)
    }
}

/// Per-subscriber cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCheckpoint {
    /// Unique subscription name.
    pub subscription_name: String,
    /// Last processed position.
    pub position: CheckpointPosition,
}

/// Repository trait for subscription checkpoints.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a zero-valued checkpoint if none exists. Idempotent.
    async fn ensure_subscription(&self, subscription_name: &str) -> Result<(), DomainError>;

    /// Open a transaction and lock the checkpoint row without waiting.
    ///
    /// Returns `Ok(None)` when another process holds the lock (or the row is
    /// missing); the transaction is then already released.
    async fn lock_subscription(
        &self,
        subscription_name: &str,
    ) -> Result<Option<Box<dyn SubscriptionLease>>, DomainError>;
}

/// A locked checkpoint row together with the open transaction holding it.
///
/// Dropping a lease without calling [`SubscriptionLease::commit`] rolls the
/// transaction back.
#[async_trait]
pub trait SubscriptionLease: Send {
    /// The checkpoint as read under the lock.
    fn checkpoint(&self) -> &SubscriptionCheckpoint;

    /// Read events of `aggregate_type` strictly after the checkpoint whose
    /// transactions are below the visibility watermark, ordered by
    /// `(transaction_id, sequence_id)`.
    async fn read_events_after_checkpoint(
        &mut self,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Move the checkpoint inside the lease's transaction. Returns the number
    /// of rows affected.
    async fn advance(&mut self, position: CheckpointPosition) -> Result<u64, DomainError>;

    /// Commit the transaction, releasing the row lock.
    async fn commit(&mut self) -> Result<(), DomainError>;

    /// Roll the transaction back, releasing the row lock.
    async fn rollback(&mut self) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_order_by_transaction_then_event() {
        let earlier_tx_later_event = CheckpointPosition::new(5, 90);
        let later_tx_earlier_event = CheckpointPosition::new(6, 10);
        let same_tx_next_event = CheckpointPosition::new(5, 91);

        assert!(earlier_tx_later_event < later_tx_earlier_event);
        assert!(earlier_tx_later_event < same_tx_next_event);
        assert!(same_tx_next_event < later_tx_earlier_event);
        assert!(CheckpointPosition::START < earlier_tx_later_event);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(CheckpointPosition::new(7, 3).to_string(), "(7, 3)");
    }
}
