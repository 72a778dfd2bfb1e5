//! Platform collaborator interfaces
//!
//! The engine never talks to device APIs directly. It consumes a permission
//! gate and a position stream provider through the traits in this module;
//! mock implementations are provided for tests and the demo binary.

pub mod permission;
pub mod stream;
pub mod mock;
pub mod error;

pub use permission::{
    PermissionDecision, PermissionGate, PermissionKind, Platform, PlatformPermissionGate,
    ANDROID_RUNTIME_PERMISSION_API,
};
pub use stream::{
    PositionStreamProvider, PositionSubscription, StreamEvent, StreamOptions, StreamSink,
};
pub use mock::{MockPermissionGate, MockPositionProvider, MockSubscription};
pub use error::{PermissionError, RecoveryStrategy, StreamError, StreamResult};
