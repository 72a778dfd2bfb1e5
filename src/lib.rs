//! Time-boxed GPS fix acquisition
//!
//! Asks for location permission, subscribes to a position stream for a fixed
//! window, keeps the most accurate fix seen and reports it (or a typed
//! failure) when the window closes. Progress is published on a regular tick
//! while collecting, and a running session can be cancelled at any time with
//! the stream subscription and timer released.
//!
//! The device side is abstracted behind [`PermissionGate`] and
//! [`PositionStreamProvider`]; [`AcquisitionEngine`] holds the state machine,
//! while [`CallbackAcquisitionApi`] and [`AcquisitionService`] drive it.

pub mod core;
pub mod acquisition;
pub mod platform;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use core::{Coordinates, PositionSample, SampleError};
pub use acquisition::engine::StartOutcome;
pub use acquisition::{AcquisitionEngine, AcquisitionSession, SessionId, SessionStatus};
pub use platform::{
    PermissionDecision, PermissionError, PermissionGate, PermissionKind, Platform,
    PlatformPermissionGate, PositionStreamProvider, PositionSubscription, StreamError,
    StreamEvent, StreamOptions, StreamSink,
};
pub use api::{
    AccuracyBand, AcquiredFix, AcquisitionConfig, AcquisitionEvent, AcquisitionFailure,
    AcquisitionOutcome, AcquisitionService, AcquisitionStart, AcquisitionTicket,
    CallbackAcquisitionApi, OutcomeFormatter, ProgressUpdate, ServiceConfig, ServiceError,
    SessionEnd,
};
pub use utils::{ConfigError, ConfigurationManager};
