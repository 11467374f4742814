//! Adaptive pause schedule between delivery sweeps.

use std::time::Duration;

/// Exponential backoff with a configurable floor and ceiling.
///
/// The floor is the reset point for trigger pulses; an empty queue pins the
/// next wait directly to the ceiling. Invariant: `floor <= current <=
/// ceiling` after every update, whenever the configuration is sane
/// (`floor <= ceiling`).
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    minpause: u64,
    maxpause: u64,
    pausetime: u64,
}

impl Backoff {
    pub const fn new(minpause: u64, maxpause: u64) -> Self {
        Self {
            minpause,
            maxpause,
            pausetime: minpause,
        }
    }

    /// Current floor in seconds.
    pub const fn floor(&self) -> u64 {
        self.minpause
    }

    /// Interval the next idle wait will use, in seconds.
    pub const fn current(&self) -> u64 {
        self.pausetime
    }

    /// Take the next sleep interval and advance the schedule.
    ///
    /// An empty queue pins the interval to the ceiling; otherwise the current
    /// interval is returned and then doubled, clamped to the ceiling.
    pub fn next_timeout(&mut self, queue_empty: bool) -> Duration {
        if queue_empty {
            self.pausetime = self.maxpause;
        }
        let timeout = self.pausetime;
        self.pausetime = self.pausetime.saturating_mul(2).min(self.maxpause);
        Duration::from_secs(timeout)
    }

    /// A trigger pulse shortens the next wait to the floor.
    pub fn reset(&mut self) {
        self.pausetime = self.minpause;
    }

    /// Apply reloaded pause bounds; a changed floor restarts the schedule.
    pub fn reconfigure(&mut self, minpause: u64, maxpause: u64) {
        if minpause != self.minpause {
            self.pausetime = minpause;
        }
        self.minpause = minpause;
        self.maxpause = maxpause;
        self.pausetime = self.pausetime.max(minpause).min(maxpause);
    }
}
