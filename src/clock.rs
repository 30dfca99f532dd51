use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Calendar time source used for day/month boundary detection.
///
/// Kept separate from the monotonic clock that drives sampling intervals and
/// the elapsed timer: wall-clock time can jump on resync, and monotonic time
/// carries no calendar meaning. The meter takes both as distinct inputs.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn epoch_seconds(&self) -> i64;
}

/// The host system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually advanced clock for tests and replay runs.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(epoch: i64) -> Self {
        Self(AtomicI64::new(epoch))
    }

    pub fn set(&self, epoch: i64) {
        self.0.store(epoch, Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn epoch_seconds(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}
