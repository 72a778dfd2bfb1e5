//! Non-blocking API for async hosts
//!
//! [`AcquisitionService`] runs the engine inside a single tokio task. Caller
//! commands, the permission answer, position stream events and timer ticks
//! all reach the engine through that task's `select!` loop, which makes the
//! task the only writer of session state.
//!
//! # Usage
//!
//! ```ignore
//! let service = AcquisitionService::spawn(gate, provider, ServiceConfig::default());
//!
//! if let AcquisitionStart::Started(mut ticket) = service.start(AcquisitionConfig::default()).await? {
//!     while let Some(update) = ticket.progress.recv().await {
//!         println!("{:.0}% {}", update.fraction * 100.0, update.message);
//!     }
//!     match ticket.outcome().await {
//!         SessionEnd::Finished(Ok(fix)) => println!("{:?}", fix.coordinates()),
//!         SessionEnd::Finished(Err(failure)) => println!("{}", failure),
//!         SessionEnd::Cancelled => {}
//!     }
//! }
//! ```

use crate::acquisition::engine::StartOutcome;
use crate::acquisition::{AcquisitionEngine, SessionId, SessionStatus};
use crate::api::types::{AcquisitionConfig, AcquisitionEvent, AcquisitionOutcome, ProgressUpdate};
use crate::platform::{
    PermissionDecision, PermissionError, PermissionGate, PermissionKind, PositionStreamProvider,
    StreamEvent, StreamSink,
};
use crate::utils::config::ConfigError;
use log::{debug, info};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Errors raised by the service handle itself
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("invalid acquisition configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("acquisition service has stopped")]
    Stopped,
}

/// Service-wide settings
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Permission requested before each session
    pub permission_kind: PermissionKind,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            permission_kind: PermissionKind::FineLocation,
        }
    }
}

/// How a session ended from the caller's point of view
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Finished(AcquisitionOutcome),
    /// Cancelled by the caller, by dropping the ticket, or by service shutdown
    Cancelled,
}

/// Live view of one session
pub struct AcquisitionTicket {
    pub session: SessionId,
    /// Progress feed; closes when the session ends
    pub progress: mpsc::UnboundedReceiver<ProgressUpdate>,
    result: oneshot::Receiver<AcquisitionOutcome>,
}

impl AcquisitionTicket {
    /// Wait for the terminal result. Dropping the ticket instead cancels the session.
    pub async fn outcome(self) -> SessionEnd {
        match self.result.await {
            Ok(outcome) => SessionEnd::Finished(outcome),
            Err(_) => SessionEnd::Cancelled,
        }
    }
}

/// Reply to [`AcquisitionService::start`]
pub enum AcquisitionStart {
    Started(AcquisitionTicket),
    /// A session was already running and was left untouched
    AlreadyActive(SessionId),
}

enum Command {
    Start {
        config: AcquisitionConfig,
        reply: oneshot::Sender<Result<AcquisitionStart, ConfigError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Handle to the acquisition task
pub struct AcquisitionService {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AcquisitionService {
    /// Spawn the acquisition task on the current tokio runtime
    pub fn spawn<G, P>(gate: G, provider: P, config: ServiceConfig) -> Self
    where
        G: PermissionGate + 'static,
        P: PositionStreamProvider + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let sink: StreamSink = Arc::new(move |event| {
            // Receiver gone means the task stopped; nothing left to deliver to
            let _ = stream_tx.send(event);
        });
        let engine = AcquisitionEngine::new(Box::new(provider), sink);

        let actor = Actor {
            engine,
            gate: Arc::new(gate),
            config,
            origin: Instant::now(),
            outlet: None,
            pending_permission: None,
            ticker: None,
        };
        let task = tokio::spawn(actor.run(command_rx, stream_rx, shutdown.clone()));

        Self {
            commands: command_tx,
            shutdown,
            task: Some(task),
        }
    }

    /// Request a new acquisition
    pub async fn start(&self, config: AcquisitionConfig) -> Result<AcquisitionStart, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { config, reply })?;
        let started = rx.await.map_err(|_| ServiceError::Stopped)?;
        Ok(started?)
    }

    /// Cancel the running session. Returns false when nothing was running.
    pub async fn cancel(&self) -> Result<bool, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Cancel { reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn status(&self) -> Result<SessionStatus, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Stop the task, cancelling any running session, and wait for it to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands.send(command).map_err(|_| ServiceError::Stopped)
    }
}

impl Drop for AcquisitionService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

type PermissionFuture =
    Pin<Box<dyn Future<Output = Result<PermissionDecision, PermissionError>> + Send>>;

/// Per-session delivery channels
struct Outlet {
    session: SessionId,
    progress: mpsc::UnboundedSender<ProgressUpdate>,
    result: oneshot::Sender<AcquisitionOutcome>,
}

struct Actor<G> {
    engine: AcquisitionEngine,
    gate: Arc<G>,
    config: ServiceConfig,
    origin: Instant,
    outlet: Option<Outlet>,
    pending_permission: Option<PermissionFuture>,
    ticker: Option<Interval>,
}

impl<G: PermissionGate + 'static> Actor<G> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut stream: mpsc::UnboundedReceiver<StreamEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut stream),
                    None => break,
                },
                result = poll_permission(&mut self.pending_permission) => {
                    self.pending_permission = None;
                    self.on_permission(result);
                }
                Some(event) = stream.recv() => self.engine.on_stream_event(event),
                _ = poll_ticker(&mut self.ticker) => {
                    let now = self.now_ms();
                    self.engine.on_tick(now);
                }
                _ = poll_outlet_closed(&mut self.outlet) => {
                    debug!("ticket dropped, cancelling session");
                    self.cancel();
                }
            }
            self.sync_timer();
            self.deliver();
        }

        self.engine.teardown();
        self.outlet = None;
        info!("acquisition service stopped");
    }

    fn handle_command(
        &mut self,
        command: Command,
        stream: &mut mpsc::UnboundedReceiver<StreamEvent>,
    ) {
        match command {
            Command::Start { config, reply } => {
                let started = match self.engine.start(config) {
                    Ok(StartOutcome::Started(session)) => {
                        // Leftovers from a previous subscription must not reach this session
                        while stream.try_recv().is_ok() {}
                        Ok(AcquisitionStart::Started(self.open_outlet(session)))
                    }
                    Ok(StartOutcome::AlreadyActive(session)) => {
                        Ok(AcquisitionStart::AlreadyActive(session))
                    }
                    Err(error) => Err(error),
                };
                let _ = reply.send(started);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.cancel());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.engine.status());
            }
        }
    }

    fn open_outlet(&mut self, session: SessionId) -> AcquisitionTicket {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        self.outlet = Some(Outlet {
            session,
            progress: progress_tx,
            result: result_tx,
        });

        let gate = Arc::clone(&self.gate);
        let kind = self.config.permission_kind;
        self.pending_permission = Some(Box::pin(async move { gate.check_and_request(kind).await }));

        AcquisitionTicket {
            session,
            progress: progress_rx,
            result: result_rx,
        }
    }

    fn on_permission(&mut self, result: Result<PermissionDecision, PermissionError>) {
        match result {
            Ok(decision) => {
                let now = self.now_ms();
                self.engine.on_permission_result(decision.is_granted(), now);
            }
            Err(error) => self.engine.on_permission_error(error),
        }
    }

    fn cancel(&mut self) -> bool {
        self.pending_permission = None;
        let cancelled = self.engine.cancel();
        // Dropping the outlet resolves the ticket as cancelled
        self.outlet = None;
        cancelled
    }

    /// Keep the ticker alive exactly while the engine wants ticks
    fn sync_timer(&mut self) {
        match (self.engine.timer_running(), self.ticker.is_some()) {
            (true, false) => {
                let period = Duration::from_millis(self.engine.config().progress_tick_ms);
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
            }
            (false, true) => self.ticker = None,
            _ => {}
        }
    }

    fn deliver(&mut self) {
        for event in self.engine.drain_events() {
            let current = self
                .outlet
                .as_ref()
                .is_some_and(|outlet| outlet.session == event.session());
            if !current {
                continue;
            }
            match event {
                AcquisitionEvent::Progress(update) => {
                    if let Some(outlet) = self.outlet.as_ref() {
                        let _ = outlet.progress.send(update);
                    }
                }
                AcquisitionEvent::Finished(_, outcome) => {
                    if let Some(outlet) = self.outlet.take() {
                        let _ = outlet.result.send(outcome);
                    }
                }
            }
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

async fn poll_permission(
    pending: &mut Option<PermissionFuture>,
) -> Result<PermissionDecision, PermissionError> {
    match pending.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn poll_ticker(ticker: &mut Option<Interval>) {
    match ticker.as_mut() {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn poll_outlet_closed(outlet: &mut Option<Outlet>) {
    match outlet.as_mut() {
        Some(outlet) => outlet.result.closed().await,
        None => std::future::pending().await,
    }
}
