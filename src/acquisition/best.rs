//! Streaming "keep best" reduction over position samples

use crate::core::PositionSample;

/// Tracks the most accurate sample seen so far using O(1) state
#[derive(Debug, Clone, Default)]
pub struct BestFixTracker {
    best: Option<PositionSample>,
    offered: usize,
}

impl BestFixTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sample. Returns true when it became the new best.
    pub fn offer(&mut self, sample: PositionSample) -> bool {
        self.offered += 1;
        let replace = match &self.best {
            Some(current) => sample.is_better_than(current),
            None => true,
        };
        if replace {
            self.best = Some(sample);
        }
        replace
    }

    pub fn best(&self) -> Option<&PositionSample> {
        self.best.as_ref()
    }

    /// Best horizontal error seen so far
    pub fn best_accuracy_m(&self) -> Option<f64> {
        self.best.map(|sample| sample.horizontal_error_m())
    }

    pub fn offered(&self) -> usize {
        self.offered
    }

    pub fn is_empty(&self) -> bool {
        self.offered == 0
    }

    pub fn reset(&mut self) {
        self.best = None;
        self.offered = 0;
    }
}
