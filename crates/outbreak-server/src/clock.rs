use std::time::Duration;

use tokio::time::Instant;

use outbreak_core::time::{Timestamp, now_millis};

/// Maps the tokio clock onto epoch-millisecond game timestamps.
///
/// All reads go through `tokio::time::Instant`, so a paused test runtime
/// drives game time as well.
#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    origin: Instant,
    origin_ms: Timestamp,
}

impl GameClock {
    /// Anchor the clock to the current wall-clock time.
    pub fn start() -> Self {
        Self::starting_at(now_millis())
    }

    /// Anchor the clock so that "now" reads as `origin_ms`.
    pub fn starting_at(origin_ms: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.origin_ms + self.origin.elapsed().as_millis() as Timestamp
    }

    /// The tokio instant at which `at` is reached. Past timestamps map to the origin.
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.origin + Duration::from_millis(at.saturating_sub(self.origin_ms))
    }
}
