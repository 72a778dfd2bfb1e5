//! Acquisition state machine
//!
//! The engine is a plain synchronous state machine. Every input (permission
//! answers, stream events, timer ticks, cancel) goes through `&mut self`, so a
//! single owner serializes all mutation. Output is queued as
//! [`AcquisitionEvent`]s and drained by whichever front end drives the engine.

use crate::acquisition::{AcquisitionSession, SessionId, SessionStatus};
use crate::api::formatting::StatusLine;
use crate::api::types::{
    AcquiredFix, AcquisitionConfig, AcquisitionEvent, AcquisitionFailure, AcquisitionOutcome,
    ProgressUpdate,
};
use crate::core::PositionSample;
use crate::platform::{
    PermissionError, PositionStreamProvider, PositionSubscription, StreamError, StreamEvent,
    StreamSink,
};
use crate::utils::config::ConfigError;
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::Arc;

/// What `start` did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was created and is waiting for permission
    Started(SessionId),
    /// A session was already running; nothing changed
    AlreadyActive(SessionId),
}

impl StartOutcome {
    pub fn session(&self) -> SessionId {
        match self {
            StartOutcome::Started(id) | StartOutcome::AlreadyActive(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

/// Time-boxed, accuracy-gated position acquisition engine
pub struct AcquisitionEngine {
    /// Position stream provider
    provider: Box<dyn PositionStreamProvider>,
    /// Where the open subscription delivers its events
    sink: StreamSink,
    /// Configuration of the current (or last) session
    config: AcquisitionConfig,
    /// Current (or last) session
    session: Option<AcquisitionSession>,
    /// Live subscription while collecting
    subscription: Option<Box<dyn PositionSubscription>>,
    /// Whether the progress timer should be running
    timer_running: bool,
    /// Session id counter
    session_counter: u32,
    /// Outcome of the last concluded session
    last_outcome: Option<(SessionId, AcquisitionOutcome)>,
    /// Events not yet drained
    events: VecDeque<AcquisitionEvent>,
}

impl AcquisitionEngine {
    /// Create an engine over `provider`; subscriptions push their events into `sink`
    pub fn new(provider: Box<dyn PositionStreamProvider>, sink: StreamSink) -> Self {
        Self {
            provider,
            sink,
            config: AcquisitionConfig::default(),
            session: None,
            subscription: None,
            timer_running: false,
            session_counter: 0,
            last_outcome: None,
            events: VecDeque::new(),
        }
    }

    /// Request a new acquisition.
    ///
    /// While a session is active this is a no-op returning the active id.
    pub fn start(&mut self, config: AcquisitionConfig) -> Result<StartOutcome, ConfigError> {
        if let Some(session) = self.active_session() {
            debug!("start ignored, session {} is {:?}", session.id(), session.status());
            return Ok(StartOutcome::AlreadyActive(session.id()));
        }
        config.validate()?;

        self.session_counter += 1;
        let id = SessionId::new(self.session_counter);
        self.session = Some(AcquisitionSession::new(id, config.retain_samples));
        self.config = config;
        self.last_outcome = None;

        info!(
            "session {} awaiting permission (window {}ms)",
            id, self.config.window_duration_ms
        );
        self.emit_progress(StatusLine::AwaitingPermission.to_string());
        Ok(StartOutcome::Started(id))
    }

    /// Answer from the permission gate
    pub fn on_permission_result(&mut self, granted: bool, now_ms: u64) {
        if self.status() != SessionStatus::AwaitingPermission {
            trace!("permission result ignored in {:?}", self.status());
            return;
        }
        if !granted {
            self.conclude(Err(AcquisitionFailure::PermissionDenied));
            return;
        }

        let sink = Arc::clone(&self.sink);
        match self.provider.open(&self.config.stream_options, sink) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.timer_running = true;
                let window = self.config.window_duration_ms;
                if let Some(session) = self.session.as_mut() {
                    session.begin_collecting(now_ms, window);
                    info!("session {} collecting from t={}ms", session.id(), now_ms);
                }
                self.emit_progress(StatusLine::Searching.to_string());
            }
            Err(error) => {
                warn!("position provider could not be opened: {}", error);
                self.conclude(Err(AcquisitionFailure::StreamUnavailable {
                    details: error.to_string(),
                }));
            }
        }
    }

    /// The permission gate itself failed
    pub fn on_permission_error(&mut self, error: PermissionError) {
        if self.status() != SessionStatus::AwaitingPermission {
            return;
        }
        warn!("permission check failed: {}", error);
        self.conclude(Err(AcquisitionFailure::PermissionCheckFailed {
            details: error.to_string(),
        }));
    }

    /// Dispatch an event delivered by the subscription
    pub fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Sample(sample) => self.on_sample_received(sample),
            StreamEvent::Error(error) => self.on_stream_error(error),
        }
    }

    /// A fix arrived
    pub fn on_sample_received(&mut self, sample: PositionSample) {
        let session = match self.session.as_mut() {
            Some(session) if session.status() == SessionStatus::Collecting => session,
            _ => {
                trace!("sample dropped outside collecting window");
                return;
            }
        };

        let improved = session.record(sample);
        debug!(
            "session {} sample {:.1}m (best {:?}, {} total)",
            session.id(),
            sample.horizontal_error_m(),
            session.best_accuracy_m(),
            session.sample_count()
        );
        if improved {
            trace!("new best fix at t={}ms", sample.captured_at_ms());
        }
        let line = self.tracking_line();
        self.emit_progress(line);
    }

    /// Stream errors are absorbed while the window is open
    pub fn on_stream_error(&mut self, error: StreamError) {
        let session = match self.session.as_mut() {
            Some(session) if session.status() == SessionStatus::Collecting => session,
            _ => return,
        };
        session.record_stream_error();
        warn!(
            "session {} stream error ({:?}): {}",
            session.id(),
            error.recovery_strategy(),
            error
        );
    }

    /// Progress timer tick
    pub fn on_tick(&mut self, now_ms: u64) {
        if self.status() != SessionStatus::Collecting {
            return;
        }
        let fraction = self
            .session
            .as_mut()
            .and_then(|session| session.advance(now_ms))
            .unwrap_or(0.0);

        let line = self.tracking_line();
        self.emit_progress(line);

        if fraction >= 1.0 {
            self.finalize();
        }
    }

    /// Close the window now and produce the terminal outcome.
    ///
    /// Only meaningful while collecting; calling it again is a no-op.
    pub fn finalize(&mut self) {
        if self.status() != SessionStatus::Collecting {
            return;
        }

        let outcome = match self.session.as_ref() {
            Some(session) => match session.best_sample() {
                Some(best) => Ok(AcquiredFix {
                    sample: *best,
                    samples_collected: session.sample_count(),
                    band: self.config.classify(best.horizontal_error_m()),
                }),
                None => Err(AcquisitionFailure::NoFixObtained {
                    window_ms: self.config.window_duration_ms,
                    stream_errors: session.stream_error_count(),
                }),
            },
            None => return,
        };
        self.conclude(outcome);
    }

    /// Abort the active session without a result.
    ///
    /// Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let id = match self.active_session() {
            Some(session) => session.id(),
            None => return false,
        };

        self.release();
        if let Some(session) = self.session.as_mut() {
            session.set_status(SessionStatus::Cancelled);
        }
        self.events.retain(|event| event.session() != id);
        info!("session {} cancelled", id);
        true
    }

    /// Owner teardown: cancel whatever is running
    pub fn teardown(&mut self) {
        if self.cancel() {
            debug!("engine torn down with an active session");
        }
    }

    /// Take every queued event
    pub fn drain_events(&mut self) -> Vec<AcquisitionEvent> {
        self.events.drain(..).collect()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, AcquisitionSession::status)
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Current or last session
    pub fn session(&self) -> Option<&AcquisitionSession> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Whether the driver should keep delivering ticks
    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Outcome of the last concluded session (cancelled sessions have none)
    pub fn last_outcome(&self) -> Option<&(SessionId, AcquisitionOutcome)> {
        self.last_outcome.as_ref()
    }

    fn active_session(&self) -> Option<&AcquisitionSession> {
        self.session.as_ref().filter(|session| session.status().is_active())
    }

    fn tracking_line(&self) -> String {
        match self.session.as_ref() {
            Some(session) => match session.best_accuracy_m() {
                Some(best_accuracy_m) => StatusLine::Tracking {
                    best_accuracy_m,
                    sample_count: session.sample_count(),
                }
                .to_string(),
                None => StatusLine::Searching.to_string(),
            },
            None => StatusLine::Searching.to_string(),
        }
    }

    fn emit_progress(&mut self, message: String) {
        if let Some(session) = self.active_session() {
            let update = ProgressUpdate {
                session: session.id(),
                fraction: session.elapsed_fraction(),
                message,
                best_accuracy_m: session.best_accuracy_m(),
                sample_count: session.sample_count(),
            };
            self.events.push_back(AcquisitionEvent::Progress(update));
        }
    }

    /// Stop the timer and close the subscription
    fn release(&mut self) {
        self.timer_running = false;
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            debug!("position subscription closed");
        }
    }

    fn conclude(&mut self, outcome: AcquisitionOutcome) {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return,
        };
        let id = session.id();
        session.set_status(SessionStatus::Finalizing);
        self.release();

        let status = if outcome.is_ok() {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
        if let Some(session) = self.session.as_mut() {
            session.set_status(status);
        }

        match &outcome {
            Ok(fix) => info!(
                "session {} completed: {:.6},{:.6} ±{:.1}m from {} fixes",
                id,
                fix.sample.latitude(),
                fix.sample.longitude(),
                fix.horizontal_error_m(),
                fix.samples_collected
            ),
            Err(failure) => info!("session {} failed: {}", id, failure),
        }

        self.last_outcome = Some((id, outcome.clone()));
        self.events.push_back(AcquisitionEvent::Finished(id, outcome));
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::AccuracyBand;
    use crate::platform::MockPositionProvider;
    use std::sync::Mutex;

    /// Engine wired to a mock provider whose events land in a shared inbox
    struct Harness {
        engine: AcquisitionEngine,
        provider: MockPositionProvider,
        inbox: Arc<Mutex<Vec<StreamEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let provider = MockPositionProvider::new();
            let inbox = Arc::new(Mutex::new(Vec::new()));
            let target = Arc::clone(&inbox);
            let sink: StreamSink = Arc::new(move |event| target.lock().unwrap().push(event));
            let engine = AcquisitionEngine::new(Box::new(provider.clone()), sink);
            Self {
                engine,
                provider,
                inbox,
            }
        }

        fn collecting(config: AcquisitionConfig) -> Self {
            let mut harness = Self::new();
            harness.engine.start(config).unwrap();
            harness.engine.on_permission_result(true, 0);
            harness
        }

        /// Emit through the provider and pump the inbox into the engine
        fn deliver(&mut self, error_m: f64, captured_at_ms: u64) {
            let sample = PositionSample::new(45.46, 9.19, error_m, captured_at_ms).unwrap();
            self.provider.emit_sample(sample);
            self.pump();
        }

        fn pump(&mut self) {
            let events: Vec<StreamEvent> = self.inbox.lock().unwrap().drain(..).collect();
            for event in events {
                self.engine.on_stream_event(event);
            }
        }

        fn outcome(&self) -> AcquisitionOutcome {
            self.engine.last_outcome().unwrap().1.clone()
        }
    }

    #[test]
    fn test_initial_state() {
        let harness = Harness::new();
        assert_eq!(harness.engine.status(), SessionStatus::Idle);
        assert!(!harness.engine.is_active());
        assert!(!harness.engine.timer_running());
        assert!(harness.engine.session().is_none());
    }

    #[test]
    fn test_start_awaits_permission() {
        let mut harness = Harness::new();
        let outcome = harness.engine.start(AcquisitionConfig::default()).unwrap();

        assert!(outcome.is_new());
        assert_eq!(harness.engine.status(), SessionStatus::AwaitingPermission);
        assert_eq!(harness.provider.open_count(), 0);

        let events = harness.engine.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], AcquisitionEvent::Progress(p) if p.fraction == 0.0));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut harness = Harness::new();
        let result = harness.engine.start(AcquisitionConfig::default().with_window(0));
        assert!(result.is_err());
        assert_eq!(harness.engine.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_start_while_active_is_noop() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(25.0, 100);
        harness.engine.on_tick(1_000);
        let fraction_before = harness.engine.session().unwrap().elapsed_fraction();

        let outcome = harness
            .engine
            .start(AcquisitionConfig::default().with_window(1_000))
            .unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyActive(SessionId::new(1)));
        assert_eq!(harness.engine.status(), SessionStatus::Collecting);
        assert_eq!(harness.engine.config().window_duration_ms, 20_000);
        assert_eq!(harness.engine.session().unwrap().sample_count(), 1);
        assert_eq!(harness.engine.session().unwrap().elapsed_fraction(), fraction_before);
        assert_eq!(harness.provider.open_count(), 1);
        assert_eq!(harness.provider.live_subscriptions(), 1);
    }

    #[test]
    fn test_permission_denied() {
        let mut harness = Harness::new();
        harness.engine.start(AcquisitionConfig::default()).unwrap();
        harness.engine.on_permission_result(false, 0);

        assert_eq!(harness.engine.status(), SessionStatus::Failed);
        assert_eq!(harness.outcome(), Err(AcquisitionFailure::PermissionDenied));
        assert_eq!(harness.provider.open_count(), 0);
        assert!(!harness.engine.timer_running());

        let events = harness.engine.drain_events();
        assert!(events.last().unwrap().is_terminal());
    }

    #[test]
    fn test_permission_check_error() {
        let mut harness = Harness::new();
        harness.engine.start(AcquisitionConfig::default()).unwrap();
        harness.engine.on_permission_error(PermissionError::PromptUnavailable);

        assert!(matches!(
            harness.outcome(),
            Err(AcquisitionFailure::PermissionCheckFailed { .. })
        ));
        assert_eq!(harness.provider.open_count(), 0);
    }

    #[test]
    fn test_stream_unavailable() {
        let mut harness = Harness::new();
        harness.provider.fail_open_with(StreamError::ServicesDisabled);
        harness.engine.start(AcquisitionConfig::default()).unwrap();
        harness.engine.on_permission_result(true, 0);

        assert_eq!(harness.engine.status(), SessionStatus::Failed);
        assert_eq!(
            harness.outcome(),
            Err(AcquisitionFailure::StreamUnavailable {
                details: "location services are disabled".to_string()
            })
        );
        assert!(!harness.engine.timer_running());
        assert!(!harness.engine.has_subscription());
    }

    #[test]
    fn test_grant_opens_subscription_with_options() {
        let mut config = AcquisitionConfig::default();
        config.stream_options.min_interval_ms = 250;
        let harness = Harness::collecting(config);

        assert_eq!(harness.engine.status(), SessionStatus::Collecting);
        assert!(harness.engine.timer_running());
        assert!(harness.engine.has_subscription());
        assert_eq!(harness.engine.session().unwrap().started_at_ms(), Some(0));
        assert_eq!(harness.provider.last_options().unwrap().min_interval_ms, 250);
    }

    #[test]
    fn test_two_samples_best_wins() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(40.0, 0);
        harness.deliver(15.0, 500);
        harness.engine.on_tick(20_000);

        assert_eq!(harness.engine.status(), SessionStatus::Completed);
        let fix = harness.outcome().unwrap();
        assert_eq!(fix.horizontal_error_m(), 15.0);
        assert_eq!(fix.sample.captured_at_ms(), 500);
        assert_eq!(fix.samples_collected, 2);
        assert_eq!(fix.band, AccuracyBand::Good);
        assert_eq!(harness.provider.live_subscriptions(), 0);
    }

    #[test]
    fn test_poor_fix_is_still_returned() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(80.0, 300);
        harness.engine.on_tick(20_000);

        let fix = harness.outcome().unwrap();
        assert_eq!(fix.horizontal_error_m(), 80.0);
        assert_eq!(fix.band, AccuracyBand::Poor);
    }

    #[test]
    fn test_no_samples_is_no_fix() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        let mut now = 0;
        while harness.engine.status() == SessionStatus::Collecting {
            now += 50;
            harness.engine.on_tick(now);
        }

        assert_eq!(now, 20_000);
        assert_eq!(
            harness.outcome(),
            Err(AcquisitionFailure::NoFixObtained {
                window_ms: 20_000,
                stream_errors: 0
            })
        );
    }

    #[test]
    fn test_stream_errors_do_not_abort_window() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.provider.emit_error(StreamError::SignalLost);
        harness.provider.emit_error(StreamError::ServicesDisabled);
        harness.pump();

        assert_eq!(harness.engine.status(), SessionStatus::Collecting);
        assert_eq!(harness.engine.session().unwrap().stream_error_count(), 2);

        harness.engine.on_tick(10_000);
        harness.deliver(12.0, 10_500);
        harness.engine.on_tick(20_000);
        assert_eq!(harness.outcome().unwrap().horizontal_error_m(), 12.0);
    }

    #[test]
    fn test_no_fix_reports_absorbed_errors() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.provider.emit_error(StreamError::Timeout { timeout_ms: 5_000 });
        harness.pump();
        harness.engine.on_tick(20_000);

        assert_eq!(
            harness.outcome(),
            Err(AcquisitionFailure::NoFixObtained {
                window_ms: 20_000,
                stream_errors: 1
            })
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_terminal_is_last() {
        let mut harness = Harness::collecting(AcquisitionConfig::default().with_window(1_000));
        for now in [100, 300, 200, 600, 999, 1_000, 1_100] {
            harness.engine.on_tick(now);
            if now == 300 {
                harness.deliver(9.0, now);
            }
        }

        let events = harness.engine.drain_events();
        let mut last = 0.0;
        for event in &events[..events.len() - 1] {
            match event {
                AcquisitionEvent::Progress(update) => {
                    assert!(update.fraction >= last);
                    last = update.fraction;
                }
                AcquisitionEvent::Finished(..) => panic!("terminal event before the end"),
            }
        }
        assert_eq!(last, 1.0);
        assert!(events.last().unwrap().is_terminal());
    }

    #[test]
    fn test_samples_after_finalize_are_ignored() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(30.0, 0);
        harness.engine.finalize();
        harness.engine.drain_events();

        harness.engine.on_sample_received(PositionSample::new(45.0, 9.0, 1.0, 10).unwrap());
        harness.engine.on_tick(25_000);
        harness.engine.finalize();

        assert!(!harness.engine.has_pending_events());
        assert_eq!(harness.outcome().unwrap().horizontal_error_m(), 30.0);
    }

    #[test]
    fn test_cancel_releases_everything() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(20.0, 100);

        assert!(harness.engine.cancel());
        assert_eq!(harness.engine.status(), SessionStatus::Cancelled);
        assert!(!harness.engine.timer_running());
        assert!(!harness.engine.has_subscription());
        assert_eq!(harness.provider.live_subscriptions(), 0);
        assert!(harness.engine.last_outcome().is_none());
        assert!(!harness.engine.has_pending_events());

        // Late input produces nothing
        harness.engine.on_tick(20_000);
        harness.engine.on_sample_received(PositionSample::new(45.0, 9.0, 1.0, 10).unwrap());
        assert!(!harness.engine.has_pending_events());

        assert!(!harness.engine.cancel());
    }

    #[test]
    fn test_cancel_while_awaiting_permission() {
        let mut harness = Harness::new();
        harness.engine.start(AcquisitionConfig::default()).unwrap();
        assert!(harness.engine.cancel());

        harness.engine.on_permission_result(true, 0);
        assert_eq!(harness.engine.status(), SessionStatus::Cancelled);
        assert_eq!(harness.provider.open_count(), 0);
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(5.0, 0);
        harness.engine.on_tick(20_000);

        assert!(!harness.engine.cancel());
        assert_eq!(harness.engine.status(), SessionStatus::Completed);
        assert!(harness.engine.last_outcome().is_some());
    }

    #[test]
    fn test_new_session_has_no_carryover() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.deliver(3.0, 0);
        harness.engine.on_tick(20_000);

        let second = harness.engine.start(AcquisitionConfig::default()).unwrap();
        assert_eq!(second, StartOutcome::Started(SessionId::new(2)));
        assert!(harness.engine.last_outcome().is_none());

        harness.engine.on_permission_result(true, 30_000);
        harness.deliver(40.0, 31_000);
        harness.engine.on_tick(50_000);

        let fix = harness.outcome().unwrap();
        assert_eq!(fix.horizontal_error_m(), 40.0);
        assert_eq!(fix.samples_collected, 1);
        assert_eq!(harness.provider.open_count(), 2);
        assert_eq!(harness.provider.close_count(), 2);
    }

    #[test]
    fn test_drop_releases_subscription() {
        let harness = Harness::collecting(AcquisitionConfig::default());
        let provider = harness.provider.clone();
        assert_eq!(provider.live_subscriptions(), 1);

        drop(harness);
        assert_eq!(provider.live_subscriptions(), 0);
    }

    #[test]
    fn test_history_retention_can_be_disabled() {
        let mut config = AcquisitionConfig::default();
        config.retain_samples = false;
        let mut harness = Harness::collecting(config);
        harness.deliver(30.0, 0);
        harness.deliver(10.0, 100);

        let session = harness.engine.session().unwrap();
        assert!(session.samples().is_empty());
        assert_eq!(session.sample_count(), 2);
        assert_eq!(session.best_accuracy_m(), Some(10.0));
    }

    #[test]
    fn test_status_messages_follow_best_fix() {
        let mut harness = Harness::collecting(AcquisitionConfig::default());
        harness.engine.drain_events();
        harness.deliver(12.34, 0);

        let events = harness.engine.drain_events();
        match &events[0] {
            AcquisitionEvent::Progress(update) => {
                assert_eq!(update.best_accuracy_m, Some(12.34));
                assert_eq!(update.message, "Best accuracy ±12.3 m (1 fix)");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
