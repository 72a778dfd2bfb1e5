//! Platform collaborator error types

use thiserror::Error;

/// Errors raised by a position stream provider or its subscription
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// Location services are switched off on the device
    #[error("location services are disabled")]
    ServicesDisabled,
    /// No positioning hardware or provider is present
    #[error("no position provider available: {details}")]
    ProviderUnavailable { details: String },
    /// A fix was not produced within the provider's own deadline
    #[error("position provider timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Temporary signal loss
    #[error("position signal temporarily unavailable")]
    SignalLost,
    /// Provider delivered a fix that could not be turned into a sample
    #[error("invalid fix: {details}")]
    InvalidFix { details: String },
    /// Platform-specific failure
    #[error("provider error {code}: {description}")]
    Platform { code: i32, description: String },
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// How a stream error is expected to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// The provider keeps running and is expected to resume on its own
    Resume,
    /// The provider cannot deliver until something outside the session changes
    Permanent,
}

impl StreamError {
    /// Get the expected recovery for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            StreamError::Timeout { .. } => RecoveryStrategy::Resume,
            StreamError::SignalLost => RecoveryStrategy::Resume,
            StreamError::InvalidFix { .. } => RecoveryStrategy::Resume,
            StreamError::Platform { .. } => RecoveryStrategy::Resume,
            StreamError::ServicesDisabled => RecoveryStrategy::Permanent,
            StreamError::ProviderUnavailable { .. } => RecoveryStrategy::Permanent,
        }
    }

    /// Check if the provider is expected to recover without intervention
    pub fn is_transient(&self) -> bool {
        self.recovery_strategy() == RecoveryStrategy::Resume
    }
}

/// Errors raised while checking or requesting a permission
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PermissionError {
    /// The platform permission API failed
    #[error("permission check failed: {details}")]
    CheckFailed { details: String },
    /// The prompt could not be shown (no foreground context)
    #[error("permission prompt unavailable")]
    PromptUnavailable,
}
