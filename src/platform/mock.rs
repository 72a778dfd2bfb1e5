//! Mock collaborators for testing and development

use crate::core::PositionSample;
use crate::platform::{
    PermissionDecision, PermissionError, PermissionGate, PermissionKind, PositionStreamProvider,
    PositionSubscription, StreamError, StreamEvent, StreamOptions, StreamResult, StreamSink,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock permission gate answering with a fixed decision
pub struct MockPermissionGate {
    answer: Result<PermissionDecision, PermissionError>,
    requests: AtomicUsize,
}

impl MockPermissionGate {
    /// Gate that always grants
    pub fn granting() -> Self {
        Self::answering(Ok(PermissionDecision::Granted))
    }

    /// Gate that always denies
    pub fn denying() -> Self {
        Self::answering(Ok(PermissionDecision::Denied))
    }

    /// Gate whose check always fails
    pub fn failing(details: &str) -> Self {
        Self::answering(Err(PermissionError::CheckFailed {
            details: details.to_string(),
        }))
    }

    pub fn answering(answer: Result<PermissionDecision, PermissionError>) -> Self {
        Self {
            answer,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of times the gate was asked
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionGate for MockPermissionGate {
    fn check_and_request(
        &self,
        kind: PermissionKind,
    ) -> impl Future<Output = Result<PermissionDecision, PermissionError>> + Send {
        self.requests.fetch_add(1, Ordering::SeqCst);
        log::trace!("mock permission request for {:?}", kind);
        let answer = self.answer.clone();
        async move { answer }
    }
}

#[derive(Default)]
struct MockStreamState {
    next_id: u64,
    live: HashMap<u64, StreamSink>,
    open_count: usize,
    close_count: usize,
    last_options: Option<StreamOptions>,
    fail_open: Option<StreamError>,
}

/// Mock position provider.
///
/// Clones share state, so a test can keep one handle to push fixes while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct MockPositionProvider {
    state: Arc<Mutex<MockStreamState>>,
}

impl MockPositionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `open` fail with `error`
    pub fn fail_open_with(&self, error: StreamError) {
        self.lock().fail_open = Some(error);
    }

    /// Deliver a fix to every live subscription. Returns the number of receivers.
    pub fn emit_sample(&self, sample: PositionSample) -> usize {
        self.emit(StreamEvent::Sample(sample))
    }

    /// Deliver an error to every live subscription
    pub fn emit_error(&self, error: StreamError) -> usize {
        self.emit(StreamEvent::Error(error))
    }

    /// Number of subscriptions currently open
    pub fn live_subscriptions(&self) -> usize {
        self.lock().live.len()
    }

    /// Total successful opens
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Total closes that released a live subscription
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Options passed to the latest successful open
    pub fn last_options(&self) -> Option<StreamOptions> {
        self.lock().last_options
    }

    fn emit(&self, event: StreamEvent) -> usize {
        // Sinks run outside the lock so they may call back into the provider
        let sinks: Vec<StreamSink> = self.lock().live.values().cloned().collect();
        for sink in &sinks {
            sink(event.clone());
        }
        sinks.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockStreamState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PositionStreamProvider for MockPositionProvider {
    fn open(
        &mut self,
        options: &StreamOptions,
        sink: StreamSink,
    ) -> StreamResult<Box<dyn PositionSubscription>> {
        let mut state = self.lock();
        if let Some(error) = state.fail_open.clone() {
            return Err(error);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id, sink);
        state.open_count += 1;
        state.last_options = Some(*options);

        Ok(Box::new(MockSubscription {
            id,
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

/// Subscription handed out by [`MockPositionProvider`]
pub struct MockSubscription {
    id: u64,
    state: Arc<Mutex<MockStreamState>>,
    open: bool,
}

impl PositionSubscription for MockSubscription {
    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.live.remove(&self.id).is_some() {
            state.close_count += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
