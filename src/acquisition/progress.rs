//! Sampling window timing

/// Computes the elapsed share of a fixed window.
///
/// The reported fraction never decreases, even if the caller's clock does.
#[derive(Debug, Clone)]
pub struct WindowClock {
    started_at_ms: u64,
    window_duration_ms: u64,
    fraction: f64,
}

impl WindowClock {
    pub fn start(started_at_ms: u64, window_duration_ms: u64) -> Self {
        Self {
            started_at_ms,
            window_duration_ms,
            fraction: 0.0,
        }
    }

    /// Advance to `now_ms` and return the elapsed fraction in [0, 1]
    pub fn advance(&mut self, now_ms: u64) -> f64 {
        let computed = if self.window_duration_ms == 0 {
            1.0
        } else {
            let elapsed = now_ms.saturating_sub(self.started_at_ms);
            if elapsed >= self.window_duration_ms {
                1.0
            } else {
                elapsed as f64 / self.window_duration_ms as f64
            }
        };
        if computed > self.fraction {
            self.fraction = computed;
        }
        self.fraction
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn is_elapsed(&self) -> bool {
        self.fraction >= 1.0
    }

    /// Time left in the window as of the last advance
    pub fn remaining_ms(&self) -> u64 {
        ((1.0 - self.fraction) * self.window_duration_ms as f64).round() as u64
    }
}
