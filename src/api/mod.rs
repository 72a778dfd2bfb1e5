//! Host-facing acquisition APIs
//!
//! Two ways to drive the engine: a callback API for hosts that own their
//! event loop, and a tokio service that runs each session as a task and hands
//! back a ticket with a progress feed and a result.

pub mod callback;
pub mod formatting;
pub mod nonblocking;
pub mod types;

pub use types::{
    AccuracyBand, AcquiredFix, AcquisitionConfig, AcquisitionEvent, AcquisitionFailure,
    AcquisitionOutcome, ProgressUpdate,
};
pub use callback::{CallbackAcquisitionApi, CallbackHandle, ProgressCallback, ResultCallback};
pub use nonblocking::{
    AcquisitionService, AcquisitionStart, AcquisitionTicket, ServiceConfig, ServiceError,
    SessionEnd,
};
pub use formatting::{FormattedOutcome, OutcomeFormatter, StatusLine};
