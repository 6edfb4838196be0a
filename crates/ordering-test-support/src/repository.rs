//! A store that fails every call, for error-path tests.

use async_trait::async_trait;
use ordering_core::error::DomainError;
use ordering_core::repository::{
    AggregateCommit, AggregateRepository, AggregateSnapshot, EventRepository, NewEvent,
    SnapshotRepository, StoredEvent,
};
use ordering_core::subscription::{SubscriptionLease, SubscriptionRepository};
use uuid::Uuid;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

/// An event store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventRepository for FailingEventStore {
    async fn append_events(&self, _events: &[NewEvent]) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }

    async fn load_events(
        &self,
        _aggregate_id: Uuid,
        _from_version: Option<i64>,
        _to_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }
}

#[async_trait]
impl SnapshotRepository for FailingEventStore {
    async fn save_snapshot(&self, _snapshot: &AggregateSnapshot) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn load_snapshot(
        &self,
        _aggregate_id: Uuid,
        _max_version: Option<i64>,
    ) -> Result<Option<AggregateSnapshot>, DomainError> {
        Err(connection_refused())
    }
}

#[async_trait]
impl AggregateRepository for FailingEventStore {
    async fn commit_aggregate(
        &self,
        _commit: &AggregateCommit,
        _events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(connection_refused())
    }
}

#[async_trait]
impl SubscriptionRepository for FailingEventStore {
    async fn ensure_subscription(&self, _subscription_name: &str) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn lock_subscription(
        &self,
        _subscription_name: &str,
    ) -> Result<Option<Box<dyn SubscriptionLease>>, DomainError> {
        Err(connection_refused())
    }
}
