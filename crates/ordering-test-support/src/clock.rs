//! Test clock.

use chrono::{DateTime, Utc};
use ordering_core::clock::Clock;

/// A clock pinned to one instant, so event timestamps are predictable.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
