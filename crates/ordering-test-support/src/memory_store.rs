//! In-memory event store with simulated database transactions.
//!
//! Every write is stamped with a transaction id drawn from a counter. Writes
//! made through an [`OpenTransaction`] stay invisible, and hold the
//! visibility watermark back, until that transaction commits. This lets
//! tests reproduce a low transaction id committing after a higher one.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ordering_core::error::DomainError;
use ordering_core::repository::{
    AggregateCommit, AggregateRepository, AggregateSnapshot, EventRepository, NewEvent,
    SnapshotRepository, StoredEvent,
};
use ordering_core::subscription::{
    CheckpointPosition, SubscriptionCheckpoint, SubscriptionLease, SubscriptionRepository,
};
use uuid::Uuid;

#[derive(Debug)]
struct VersionRecord {
    version: i64,
    aggregate_type: String,
}

#[derive(Debug, Default)]
struct State {
    last_sequence_id: i64,
    last_transaction_id: i64,
    in_flight: BTreeSet<i64>,
    events: Vec<StoredEvent>,
    versions: HashMap<Uuid, VersionRecord>,
    /// Version records replaced by each open transaction, oldest first.
    replaced_versions: HashMap<i64, Vec<(Uuid, Option<VersionRecord>)>>,
    snapshots: Vec<AggregateSnapshot>,
    subscriptions: HashMap<String, CheckpointPosition>,
    locked: HashSet<String>,
}

impl State {
    fn begin(&mut self) -> i64 {
        self.last_transaction_id += 1;
        self.last_transaction_id
    }

    /// Lowest transaction id that may still be running.
    fn watermark(&self) -> i64 {
        self.in_flight
            .first()
            .copied()
            .unwrap_or(self.last_transaction_id + 1)
    }

    fn is_committed(&self, transaction_id: i64) -> bool {
        !self.in_flight.contains(&transaction_id)
    }

    fn insert_events(
        &mut self,
        transaction_id: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        for event in events {
            if let Some(existing) = self
                .events
                .iter()
                .find(|e| e.aggregate_id == event.aggregate_id && e.version == event.version)
            {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: event.aggregate_id,
                    expected: event.version - 1,
                    actual: existing.version,
                });
            }
        }

        let stored: Vec<StoredEvent> = events
            .iter()
            .map(|event| {
                self.last_sequence_id += 1;
                StoredEvent {
                    sequence_id: self.last_sequence_id,
                    transaction_id,
                    aggregate_id: event.aggregate_id,
                    event_type: event.event_type.clone(),
                    payload: event.payload.clone(),
                    version: event.version,
                    created_at: event.created_at,
                }
            })
            .collect();
        self.events.extend(stored.iter().cloned());
        Ok(stored)
    }

    fn commit_aggregate(
        &mut self,
        transaction_id: i64,
        commit: &AggregateCommit,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let actual = self
            .versions
            .get(&commit.aggregate_id)
            .map_or(0, |record| record.version);
        let gate_open = if commit.expected_version == 0 {
            !self.versions.contains_key(&commit.aggregate_id)
        } else {
            actual == commit.expected_version
        };
        if !gate_open {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: commit.aggregate_id,
                expected: commit.expected_version,
                actual,
            });
        }

        let stored = self.insert_events(transaction_id, events)?;
        let previous = self.versions.insert(
            commit.aggregate_id,
            VersionRecord {
                version: commit.version,
                aggregate_type: commit.aggregate_type.clone(),
            },
        );
        if self.in_flight.contains(&transaction_id) {
            self.replaced_versions
                .entry(transaction_id)
                .or_default()
                .push((commit.aggregate_id, previous));
        }
        Ok(stored)
    }

    fn commit(&mut self, transaction_id: i64) {
        self.in_flight.remove(&transaction_id);
        self.replaced_versions.remove(&transaction_id);
    }

    fn rollback(&mut self, transaction_id: i64) {
        self.in_flight.remove(&transaction_id);
        self.events.retain(|e| e.transaction_id != transaction_id);
        let replaced = self
            .replaced_versions
            .remove(&transaction_id)
            .unwrap_or_default();
        for (aggregate_id, previous) in replaced.into_iter().rev() {
            match previous {
                Some(record) => self.versions.insert(aggregate_id, record),
                None => self.versions.remove(&aggregate_id),
            };
        }
    }
}

/// An in-memory implementation of every storage trait the write path and the
/// polling publisher use. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Start a transaction that stays open until committed or dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn begin_transaction(&self) -> OpenTransaction {
        let mut state = self.state();
        let transaction_id = state.begin();
        state.in_flight.insert(transaction_id);
        OpenTransaction {
            store: self.clone(),
            transaction_id,
            finished: false,
        }
    }

    /// All committed events in sequence order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn committed_events(&self) -> Vec<StoredEvent> {
        let state = self.state();
        state
            .events
            .iter()
            .filter(|e| state.is_committed(e.transaction_id))
            .cloned()
            .collect()
    }

    /// Stored snapshots of one aggregate in version order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshots(&self, aggregate_id: Uuid) -> Vec<AggregateSnapshot> {
        let mut snapshots: Vec<AggregateSnapshot> = self
            .state()
            .snapshots
            .iter()
            .filter(|s| s.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.version);
        snapshots
    }

    /// The version record of an aggregate, if it has one.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn aggregate_version(&self, aggregate_id: Uuid) -> Option<i64> {
        self.state()
            .versions
            .get(&aggregate_id)
            .map(|record| record.version)
    }

    /// The committed checkpoint of a subscription.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn checkpoint(&self, subscription_name: &str) -> Option<CheckpointPosition> {
        self.state().subscriptions.get(subscription_name).copied()
    }

    /// The current visibility watermark.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn watermark(&self) -> i64 {
        self.state().watermark()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventStore {
    async fn append_events(&self, events: &[NewEvent]) -> Result<Vec<StoredEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self.state();
        let transaction_id = state.begin();
        state.insert_events(transaction_id, events)
    }

    async fn load_events(
        &self,
        aggregate_id: Uuid,
        from_version: Option<i64>,
        to_version: Option<i64>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let state = self.state();
        let mut events: Vec<StoredEvent> = state
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && state.is_committed(e.transaction_id))
            .filter(|e| from_version.is_none_or(|from| e.version >= from))
            .filter(|e| to_version.is_none_or(|to| e.version <= to))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryEventStore {
    async fn save_snapshot(&self, snapshot: &AggregateSnapshot) -> Result<(), DomainError> {
        let mut state = self.state();
        let exists = state
            .snapshots
            .iter()
            .any(|s| s.aggregate_id == snapshot.aggregate_id && s.version == snapshot.version);
        if !exists {
            state.snapshots.push(snapshot.clone());
        }
        Ok(())
    }

    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
        max_version: Option<i64>,
    ) -> Result<Option<AggregateSnapshot>, DomainError> {
        Ok(self
            .state()
            .snapshots
            .iter()
            .filter(|s| s.aggregate_id == aggregate_id)
            .filter(|s| max_version.is_none_or(|max| s.version <= max))
            .max_by_key(|s| s.version)
            .cloned())
    }
}

#[async_trait]
impl AggregateRepository for InMemoryEventStore {
    async fn commit_aggregate(
        &self,
        commit: &AggregateCommit,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let mut state = self.state();
        let transaction_id = state.begin();
        state.commit_aggregate(transaction_id, commit, events)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryEventStore {
    async fn ensure_subscription(&self, subscription_name: &str) -> Result<(), DomainError> {
        self.state()
            .subscriptions
            .entry(subscription_name.to_owned())
            .or_insert(CheckpointPosition::START);
        Ok(())
    }

    async fn lock_subscription(
        &self,
        subscription_name: &str,
    ) -> Result<Option<Box<dyn SubscriptionLease>>, DomainError> {
        let mut state = self.state();
        let Some(position) = state.subscriptions.get(subscription_name).copied() else {
            return Ok(None);
        };
        if !state.locked.insert(subscription_name.to_owned()) {
            return Ok(None);
        }
        Ok(Some(Box::new(InMemorySubscriptionLease {
            store: self.clone(),
            checkpoint: SubscriptionCheckpoint {
                subscription_name: subscription_name.to_owned(),
                position,
            },
            advanced_to: None,
            released: false,
        })))
    }
}

/// A transaction held open by a test. Its writes are invisible to readers
/// until [`OpenTransaction::commit`]; dropping it rolls them back.
#[derive(Debug)]
pub struct OpenTransaction {
    store: InMemoryEventStore,
    transaction_id: i64,
    finished: bool,
}

impl OpenTransaction {
    /// The transaction id stamped on this transaction's events.
    #[must_use]
    pub fn transaction_id(&self) -> i64 {
        self.transaction_id
    }

    /// Run the concurrency gate and append events inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` when the gate rejects the
    /// write.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn commit_aggregate(
        &self,
        commit: &AggregateCommit,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.store
            .state()
            .commit_aggregate(self.transaction_id, commit, events)
    }

    /// Make this transaction's writes visible.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn commit(mut self) {
        self.store.state().commit(self.transaction_id);
        self.finished = true;
    }
}

impl Drop for OpenTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Ok(mut state) = self.store.state.lock() {
                state.rollback(self.transaction_id);
            }
        }
    }
}

#[derive(Debug)]
struct InMemorySubscriptionLease {
    store: InMemoryEventStore,
    checkpoint: SubscriptionCheckpoint,
    advanced_to: Option<CheckpointPosition>,
    released: bool,
}

impl InMemorySubscriptionLease {
    fn release(&mut self) {
        if !self.released {
            self.store
                .state()
                .locked
                .remove(&self.checkpoint.subscription_name);
            self.released = true;
        }
    }
}

#[async_trait]
impl SubscriptionLease for InMemorySubscriptionLease {
    fn checkpoint(&self) -> &SubscriptionCheckpoint {
        &self.checkpoint
    }

    async fn read_events_after_checkpoint(
        &mut self,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let state = self.store.state();
        let watermark = state.watermark();
        let after = self.checkpoint.position;
        let mut events: Vec<StoredEvent> = state
            .events
            .iter()
            .filter(|e| {
                state
                    .versions
                    .get(&e.aggregate_id)
                    .is_some_and(|record| record.aggregate_type == aggregate_type)
            })
            .filter(|e| e.transaction_id < watermark && e.position() > after)
            .cloned()
            .collect();
        events.sort_by_key(StoredEvent::position);
        Ok(events)
    }

    async fn advance(&mut self, position: CheckpointPosition) -> Result<u64, DomainError> {
        self.advanced_to = Some(position);
        Ok(1)
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        if let Some(position) = self.advanced_to.take() {
            self.store
                .state()
                .subscriptions
                .insert(self.checkpoint.subscription_name.clone(), position);
        }
        self.release();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        self.advanced_to = None;
        self.release();
        Ok(())
    }
}

impl Drop for InMemorySubscriptionLease {
    fn drop(&mut self) {
        if !self.released {
            if let Ok(mut state) = self.store.state.lock() {
                state.locked.remove(&self.checkpoint.subscription_name);
            }
        }
    }
}
