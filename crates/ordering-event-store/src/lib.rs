//! `PostgreSQL` adapters for the ordering event store.
//!
//! [`PgEventRepository`] implements the event log, the snapshot store and
//! the optimistic concurrency gate over one pool, so it satisfies
//! `ordering_core::repository::EventStore`. [`PgSubscriptionRepository`]
//! implements the subscription checkpoint store used by the polling
//! publisher.

mod error;
pub mod migrations;
pub mod pg_aggregate_repository;
pub mod pg_event_repository;
pub mod pg_snapshot_repository;
pub mod pg_subscription_repository;

pub use migrations::run_migrations;
pub use pg_event_repository::PgEventRepository;
pub use pg_subscription_repository::PgSubscriptionRepository;
