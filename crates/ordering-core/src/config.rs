//! Component configuration with documented defaults.

use std::time::Duration;

/// Default number of event versions between snapshots.
pub const DEFAULT_SNAPSHOT_EVERY: i64 = 10;

/// Default bound on reload-and-retry attempts after a concurrency conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 16;

/// Default polling publisher tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Write path settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSourcingConfig {
    /// A snapshot is stored whenever an event version is a multiple of this
    /// value. Zero disables snapshotting.
    pub snapshot_every: i64,
    /// How many times a command is retried after losing a concurrency race.
    pub max_conflict_retries: u32,
}

impl EventSourcingConfig {
    /// Whether a snapshot should be stored for the state at `version`.
    #[must_use]
    pub fn is_snapshot_version(&self, version: i64) -> bool {
        self.snapshot_every > 0 && version > 0 && version % self.snapshot_every == 0
    }
}

impl Default for EventSourcingConfig {
    fn default() -> Self {
        Self {
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

/// Polling publisher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Time between ticks.
    pub poll_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
