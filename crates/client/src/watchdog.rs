//! Flusher liveness monitor
//!
//! The background flusher pings its watchdog once per iteration; an
//! external monitor can then ask whether the flusher has gone silent
//! longer than its flush interval should allow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const NEVER_PINGED: u64 = u64::MAX;

/// Records liveness pings from the background flusher.
#[derive(Debug)]
pub struct Watchdog {
    started: Instant,
    /// Milliseconds since `started` at the last ping
    last_ping_ms: AtomicU64,
    iterations: AtomicU64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ping_ms: AtomicU64::new(NEVER_PINGED),
            iterations: AtomicU64::new(0),
        }
    }

    /// Record one flusher iteration.
    pub fn ping(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_ping_ms.store(elapsed, Ordering::Relaxed);
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Total iterations observed.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Time since the last ping, or `None` before the first one.
    pub fn time_since_last_ping(&self) -> Option<Duration> {
        let last = self.last_ping_ms.load(Ordering::Relaxed);
        if last == NEVER_PINGED {
            return None;
        }
        Some(
            self.started
                .elapsed()
                .saturating_sub(Duration::from_millis(last)),
        )
    }

    /// True once the flusher has pinged within `max_silence`.
    pub fn is_responsive(&self, max_silence: Duration) -> bool {
        match self.time_since_last_ping() {
            Some(silence) => silence <= max_silence,
            None => false,
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
