//! Host-side stand-ins for the device's clock and status LED.

use domains::{Clock, StatusIndicator};
use std::time::Instant;

/// Monotonic readings from process start, wall-clock readings from chrono.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn unix_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// There is no LED on a host; the state change is logged instead.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn set(&self, on: bool) {
        tracing::info!(on, "status indicator changed");
    }
}
