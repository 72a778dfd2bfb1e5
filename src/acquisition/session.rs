//! Mutable state of one acquisition run

use crate::acquisition::{BestFixTracker, WindowClock};
use crate::core::PositionSample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an acquisition session, unique per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    pub(crate) fn new(id: u32) -> Self {
        SessionId(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of the engine's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session has run yet
    Idle,
    /// Waiting for the permission gate
    AwaitingPermission,
    /// Subscription open, window running
    Collecting,
    /// Releasing resources before the terminal state
    Finalizing,
    /// Window closed with at least one fix
    Completed,
    /// Terminal failure
    Failed,
    /// Aborted by the caller or owner teardown
    Cancelled,
}

impl SessionStatus {
    /// A session in this state holds (or is about to hold) resources
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::AwaitingPermission | SessionStatus::Collecting | SessionStatus::Finalizing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// State of one acquisition run
#[derive(Debug, Clone)]
pub struct AcquisitionSession {
    id: SessionId,
    status: SessionStatus,
    clock: Option<WindowClock>,
    samples: Vec<PositionSample>,
    best: BestFixTracker,
    retain_samples: bool,
    stream_errors: u32,
}

impl AcquisitionSession {
    pub(crate) fn new(id: SessionId, retain_samples: bool) -> Self {
        Self {
            id,
            status: SessionStatus::AwaitingPermission,
            clock: None,
            samples: Vec::new(),
            best: BestFixTracker::new(),
            retain_samples,
            stream_errors: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Enter the collecting phase with an empty sample set
    pub(crate) fn begin_collecting(&mut self, now_ms: u64, window_duration_ms: u64) {
        self.samples.clear();
        self.best.reset();
        self.clock = Some(WindowClock::start(now_ms, window_duration_ms));
        self.status = SessionStatus::Collecting;
    }

    /// Record a sample. Returns true when it became the new best.
    pub(crate) fn record(&mut self, sample: PositionSample) -> bool {
        if self.retain_samples {
            self.samples.push(sample);
        }
        self.best.offer(sample)
    }

    pub(crate) fn record_stream_error(&mut self) {
        self.stream_errors += 1;
    }

    /// Advance the window clock, returning the elapsed fraction
    pub(crate) fn advance(&mut self, now_ms: u64) -> Option<f64> {
        self.clock.as_mut().map(|clock| clock.advance(now_ms))
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.clock.as_ref().map(WindowClock::started_at_ms)
    }

    pub fn elapsed_fraction(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, WindowClock::fraction)
    }

    /// Samples retained for diagnostics, in arrival order
    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.best.offered()
    }

    pub fn best_sample(&self) -> Option<&PositionSample> {
        self.best.best()
    }

    pub fn best_accuracy_m(&self) -> Option<f64> {
        self.best.best_accuracy_m()
    }

    pub fn stream_error_count(&self) -> u32 {
        self.stream_errors
    }
}
