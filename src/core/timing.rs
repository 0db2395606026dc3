//! High-resolution timing utilities for task engines.

use std::time::Instant;

use once_cell::sync::Lazy;

static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic timestamp in milliseconds since the process epoch.
///
/// Reaction times are differences between two stamps, so the epoch itself is
/// arbitrary. Tests construct stamps directly to fabricate timings.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
pub struct InstantStamp(pub f64);

impl InstantStamp {
    /// Milliseconds elapsed since `earlier`. Clamped at zero so clock jitter
    /// never yields a negative reaction time.
    pub fn since(self, earlier: InstantStamp) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

/// Current monotonic timestamp.
pub fn now() -> InstantStamp {
    InstantStamp(PROCESS_EPOCH.elapsed().as_secs_f64() * 1000.0)
}

/// Suspend the current task for `ms` milliseconds.
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}
