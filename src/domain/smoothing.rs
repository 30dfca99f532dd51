/// Default number of samples in the trailing average.
pub const DEFAULT_WINDOW: usize = 5;

/// Trailing average over the last K raw power samples.
///
/// Fixed-capacity ring: samples land in consecutive slots, the slot index
/// wraps modulo K, and until the first wrap the average runs over only the
/// slots written so far. After that it is a true K-sample trailing mean.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    slots: Vec<f64>,
    idx: usize,
    filled: bool,
}

impl SmoothingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)],
            idx: 0,
            filled: false,
        }
    }

    /// Record one raw power sample and return the updated average.
    ///
    /// NaN input counts as 0 so a single glitch cannot poison the window.
    pub fn observe(&mut self, power_w: f64) -> f64 {
        let p = if power_w.is_nan() { 0.0 } else { power_w };
        self.slots[self.idx] = p;
        self.idx = (self.idx + 1) % self.slots.len();
        if self.idx == 0 {
            self.filled = true;
        }
        self.average()
    }

    /// Mean over the samples seen so far (all slots once filled).
    pub fn average(&self) -> f64 {
        let n = if self.filled { self.slots.len() } else { self.idx };
        if n == 0 {
            return 0.0;
        }
        self.slots[..n].iter().sum::<f64>() / n as f64
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }
}

impl Default for SmoothingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
