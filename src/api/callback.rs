//! Callback-based API for event-driven hosts
//!
//! The host owns the loop: it forwards the permission answer, calls
//! [`CallbackAcquisitionApi::process`] regularly, and receives progress and
//! results through registered callbacks. Stream events pushed by the provider
//! are buffered and applied on the next `process` call, so all engine mutation
//! happens on the host's thread.

use crate::acquisition::engine::StartOutcome;
use crate::acquisition::{AcquisitionEngine, SessionId, SessionStatus};
use crate::api::types::{AcquisitionConfig, AcquisitionEvent, AcquisitionOutcome, ProgressUpdate};
use crate::platform::{PermissionDecision, PermissionError, PositionStreamProvider, StreamEvent, StreamSink};
use crate::utils::clock::Clock;
use crate::utils::config::ConfigError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Callback function type for progress updates
pub type ProgressCallback = Box<dyn Fn(&ProgressUpdate) + Send>;

/// Callback function type for terminal results
pub type ResultCallback = Box<dyn Fn(SessionId, &AcquisitionOutcome) + Send>;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    fn new(id: u32) -> Self {
        CallbackHandle(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Callback-based acquisition API
pub struct CallbackAcquisitionApi {
    /// Acquisition engine
    engine: AcquisitionEngine,
    /// Stream events waiting for the next `process` call
    inbox: Arc<Mutex<VecDeque<StreamEvent>>>,
    /// Time source for ticks and the window
    clock: Box<dyn Clock>,
    /// Next time a progress tick is due
    next_tick_ms: Option<u64>,
    /// Callback handle counter
    callback_counter: u32,
    /// Progress callbacks
    progress_callbacks: HashMap<CallbackHandle, ProgressCallback>,
    /// Result callbacks
    result_callbacks: HashMap<CallbackHandle, ResultCallback>,
}

impl CallbackAcquisitionApi {
    /// Create a new callback-based API over `provider`
    pub fn new(provider: Box<dyn PositionStreamProvider>, clock: Box<dyn Clock>) -> Self {
        let inbox = Arc::new(Mutex::new(VecDeque::new()));
        let target = Arc::clone(&inbox);
        let sink: StreamSink = Arc::new(move |event| {
            target
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(event);
        });

        Self {
            engine: AcquisitionEngine::new(provider, sink),
            inbox,
            clock,
            next_tick_ms: None,
            callback_counter: 0,
            progress_callbacks: HashMap::new(),
            result_callbacks: HashMap::new(),
        }
    }

    /// Register a progress callback
    pub fn register_progress_callback(&mut self, callback: ProgressCallback) -> CallbackHandle {
        self.callback_counter += 1;
        let handle = CallbackHandle::new(self.callback_counter);
        self.progress_callbacks.insert(handle, callback);
        handle
    }

    /// Register a result callback
    pub fn register_result_callback(&mut self, callback: ResultCallback) -> CallbackHandle {
        self.callback_counter += 1;
        let handle = CallbackHandle::new(self.callback_counter);
        self.result_callbacks.insert(handle, callback);
        handle
    }

    /// Unregister a callback. Returns false for an unknown handle.
    pub fn unregister_callback(&mut self, handle: CallbackHandle) -> bool {
        self.progress_callbacks.remove(&handle).is_some()
            || self.result_callbacks.remove(&handle).is_some()
    }

    /// Begin an acquisition; the host must then ask its permission gate
    pub fn start(&mut self, config: AcquisitionConfig) -> Result<StartOutcome, ConfigError> {
        let outcome = self.engine.start(config)?;
        if outcome.is_new() {
            self.inbox_clear();
            self.next_tick_ms = None;
        }
        self.dispatch();
        Ok(outcome)
    }

    /// Forward the permission gate's answer
    pub fn on_permission_result(&mut self, result: Result<PermissionDecision, PermissionError>) {
        match result {
            Ok(decision) => {
                let now = self.clock.now_ms();
                self.engine.on_permission_result(decision.is_granted(), now);
                if self.engine.timer_running() {
                    self.next_tick_ms = Some(now + self.engine.config().progress_tick_ms);
                }
            }
            Err(error) => self.engine.on_permission_error(error),
        }
        self.dispatch();
    }

    /// Apply buffered stream events and due ticks, then run callbacks.
    ///
    /// Returns the number of stream events applied.
    pub fn process(&mut self) -> usize {
        let events: Vec<StreamEvent> = self
            .inbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        let applied = events.len();
        for event in events {
            self.engine.on_stream_event(event);
        }

        if self.engine.timer_running() {
            let now = self.clock.now_ms();
            if let Some(due) = self.next_tick_ms {
                if now >= due {
                    self.engine.on_tick(now);
                    self.next_tick_ms = Some(now + self.engine.config().progress_tick_ms);
                }
            }
        }
        if !self.engine.timer_running() {
            self.next_tick_ms = None;
        }

        self.dispatch();
        applied
    }

    /// Abort the running acquisition. No callback fires for it afterwards.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.engine.cancel();
        if cancelled {
            self.inbox_clear();
            self.next_tick_ms = None;
        }
        cancelled
    }

    pub fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    pub fn engine(&self) -> &AcquisitionEngine {
        &self.engine
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> (usize, usize) {
        (self.progress_callbacks.len(), self.result_callbacks.len())
    }

    /// Cancel any session and drop every callback
    pub fn shutdown(&mut self) {
        self.cancel();
        self.progress_callbacks.clear();
        self.result_callbacks.clear();
        self.callback_counter = 0;
    }

    fn inbox_clear(&self) {
        self.inbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn dispatch(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                AcquisitionEvent::Progress(update) => {
                    for callback in self.progress_callbacks.values() {
                        callback(&update);
                    }
                }
                AcquisitionEvent::Finished(session, outcome) => {
                    for callback in self.result_callbacks.values() {
                        callback(session, &outcome);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::AcquisitionFailure;
    use crate::core::PositionSample;
    use crate::platform::{MockPositionProvider, StreamError};
    use crate::utils::clock::ManualClock;

    struct Recorder {
        progress: Arc<Mutex<Vec<ProgressUpdate>>>,
        results: Arc<Mutex<Vec<(SessionId, AcquisitionOutcome)>>>,
    }

    fn setup() -> (CallbackAcquisitionApi, MockPositionProvider, ManualClock, Recorder) {
        let provider = MockPositionProvider::new();
        let clock = ManualClock::new(0);
        let mut api = CallbackAcquisitionApi::new(Box::new(provider.clone()), Box::new(clock.clone()));

        let progress = Arc::new(Mutex::new(Vec::new()));
        let results = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&progress);
        let r = Arc::clone(&results);
        api.register_progress_callback(Box::new(move |update| p.lock().unwrap().push(update.clone())));
        api.register_result_callback(Box::new(move |id, outcome| {
            r.lock().unwrap().push((id, outcome.clone()))
        }));

        (api, provider, clock, Recorder { progress, results })
    }

    fn sample(error_m: f64, t: u64) -> PositionSample {
        PositionSample::new(-33.86, 151.21, error_m, t).unwrap()
    }

    #[test]
    fn test_callback_registration() {
        let (mut api, _, _, _) = setup();
        assert_eq!(api.callback_count(), (1, 1));

        let handle = api.register_progress_callback(Box::new(|_| {}));
        assert_eq!(api.callback_count(), (2, 1));
        assert!(api.unregister_callback(handle));
        assert!(!api.unregister_callback(handle));
    }

    #[test]
    fn test_full_window_with_callbacks() {
        let (mut api, provider, clock, recorder) = setup();
        api.start(AcquisitionConfig::default()).unwrap();
        api.on_permission_result(Ok(PermissionDecision::Granted));
        assert_eq!(api.status(), SessionStatus::Collecting);

        provider.emit_sample(sample(40.0, 0));
        clock.advance(500);
        provider.emit_sample(sample(15.0, 500));
        provider.emit_error(StreamError::SignalLost);
        assert_eq!(api.process(), 3);

        while api.status() == SessionStatus::Collecting {
            clock.advance(50);
            api.process();
        }

        let results = recorder.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        let fix = results[0].1.as_ref().unwrap();
        assert_eq!(fix.horizontal_error_m(), 15.0);
        assert_eq!(clock.now_ms(), 20_000);

        let progress = recorder.progress.lock().unwrap();
        assert!(progress.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        assert_eq!(progress.last().unwrap().fraction, 1.0);
        assert_eq!(provider.live_subscriptions(), 0);
    }

    #[test]
    fn test_denied_permission_reports_failure() {
        let (mut api, provider, _, recorder) = setup();
        api.start(AcquisitionConfig::default()).unwrap();
        api.on_permission_result(Ok(PermissionDecision::Denied));

        let results = recorder.results.lock().unwrap();
        assert_eq!(results[0].1, Err(AcquisitionFailure::PermissionDenied));
        assert_eq!(provider.open_count(), 0);
    }

    #[test]
    fn test_permission_error_reports_check_failed() {
        let (mut api, _, _, recorder) = setup();
        api.start(AcquisitionConfig::default()).unwrap();
        api.on_permission_result(Err(PermissionError::CheckFailed {
            details: "service crashed".to_string(),
        }));

        let results = recorder.results.lock().unwrap();
        assert!(matches!(
            &results[0].1,
            Err(AcquisitionFailure::PermissionCheckFailed { details }) if details.contains("service crashed")
        ));
    }

    #[test]
    fn test_cancel_silences_callbacks() {
        let (mut api, provider, clock, recorder) = setup();
        api.start(AcquisitionConfig::default()).unwrap();
        api.on_permission_result(Ok(PermissionDecision::Granted));
        let seen = recorder.progress.lock().unwrap().len();

        provider.emit_sample(sample(10.0, 0));
        assert!(api.cancel());
        assert_eq!(provider.live_subscriptions(), 0);

        clock.advance(30_000);
        assert_eq!(api.process(), 0);
        assert_eq!(recorder.progress.lock().unwrap().len(), seen);
        assert!(recorder.results.lock().unwrap().is_empty());
        assert!(!api.cancel());
    }

    #[test]
    fn test_shutdown_clears_callbacks() {
        let (mut api, provider, _, _) = setup();
        api.start(AcquisitionConfig::default()).unwrap();
        api.on_permission_result(Ok(PermissionDecision::Granted));

        api.shutdown();
        assert_eq!(api.callback_count(), (0, 0));
        assert_eq!(api.status(), SessionStatus::Cancelled);
        assert_eq!(provider.live_subscriptions(), 0);
    }
}
