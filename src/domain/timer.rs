use std::time::{Duration, Instant};

/// Manual elapsed-time timer.
///
/// Banked time survives restarts (persisted as whole seconds); the running
/// flag and start instant are in-memory only, so the machine always boots
/// stopped. Every operation is total: there are no error states.
#[derive(Debug, Clone)]
pub struct ElapsedTimer {
    running: bool,
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl ElapsedTimer {
    pub fn from_accumulated_secs(secs: u64) -> Self {
        Self {
            running: false,
            started_at: None,
            accumulated: Duration::from_secs(secs),
        }
    }

    /// Begin counting from `now`. Returns false when already running (the
    /// original start instant keeps counting).
    pub fn start(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        self.started_at = Some(now);
        self.running = true;
        true
    }

    /// Stop counting and bank the elapsed span. Returns false when already
    /// stopped.
    pub fn stop(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        if let Some(started) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(started);
        }
        self.running = false;
        true
    }

    /// Back to zero and stopped, whatever the prior state.
    pub fn reset(&mut self) {
        self.running = false;
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whole seconds on the clock face as of `now`.
    pub fn elapsed_seconds(&self, now: Instant) -> u64 {
        let mut total = self.accumulated;
        if self.running {
            if let Some(started) = self.started_at {
                total += now.saturating_duration_since(started);
            }
        }
        total.as_secs()
    }

    /// The banked span only; the live segment of a running timer is not
    /// durable and is excluded.
    pub fn accumulated_seconds(&self) -> u64 {
        self.accumulated.as_secs()
    }
}
