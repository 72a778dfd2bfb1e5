//! Common API types and data structures

use crate::acquisition::SessionId;
use crate::core::{
    Coordinates, PositionSample, DEFAULT_ACCURACY_THRESHOLD_M, DEFAULT_PROGRESS_TICK_MS,
    DEFAULT_WINDOW_DURATION_MS, EXCELLENT_ACCURACY_M, GOOD_ACCURACY_M,
};
use crate::platform::StreamOptions;
use crate::utils::config::ConfigError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure of an acquisition session
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum AcquisitionFailure {
    /// The user refused location access
    #[error("location permission denied")]
    PermissionDenied,
    /// The permission subsystem itself failed
    #[error("location permission check failed: {details}")]
    PermissionCheckFailed { details: String },
    /// The position provider could not be opened at all
    #[error("location services unavailable: {details}")]
    StreamUnavailable { details: String },
    /// The window elapsed without a single fix
    #[error("no position fix obtained within {window_ms}ms")]
    NoFixObtained { window_ms: u64, stream_errors: u32 },
}

/// Result of a session that ran to completion
pub type AcquisitionOutcome = Result<AcquiredFix, AcquisitionFailure>;

/// Best fix delivered at the end of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquiredFix {
    /// Winning sample
    pub sample: PositionSample,
    /// Number of fixes observed during the window
    pub samples_collected: usize,
    /// Display classification of the winning accuracy
    pub band: AccuracyBand,
}

impl AcquiredFix {
    pub fn coordinates(&self) -> Coordinates {
        self.sample.coordinates()
    }

    pub fn horizontal_error_m(&self) -> f64 {
        self.sample.horizontal_error_m()
    }
}

/// Acquisition parameters, immutable for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Length of the sampling window (milliseconds)
    pub window_duration_ms: u64,
    /// Interval between progress ticks (milliseconds)
    pub progress_tick_ms: u64,
    /// Accuracy threshold for display classification (meters)
    pub accuracy_threshold_m: f64,
    /// Options forwarded to the position provider
    pub stream_options: StreamOptions,
    /// Keep every sample of the window for diagnostics
    pub retain_samples: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: DEFAULT_WINDOW_DURATION_MS,
            progress_tick_ms: DEFAULT_PROGRESS_TICK_MS,
            accuracy_threshold_m: DEFAULT_ACCURACY_THRESHOLD_M,
            stream_options: StreamOptions::default(),
            retain_samples: true,
        }
    }
}

impl AcquisitionConfig {
    pub fn with_window(mut self, window_duration_ms: u64) -> Self {
        self.window_duration_ms = window_duration_ms;
        self
    }

    pub fn with_tick(mut self, progress_tick_ms: u64) -> Self {
        self.progress_tick_ms = progress_tick_ms;
        self
    }

    pub fn with_accuracy_threshold(mut self, accuracy_threshold_m: f64) -> Self {
        self.accuracy_threshold_m = accuracy_threshold_m;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "window_duration_ms".to_string(),
                value: self.window_duration_ms.to_string(),
            });
        }
        if self.progress_tick_ms == 0 || self.progress_tick_ms > self.window_duration_ms {
            return Err(ConfigError::InvalidParameter {
                parameter: "progress_tick_ms".to_string(),
                value: self.progress_tick_ms.to_string(),
            });
        }
        if !self.accuracy_threshold_m.is_finite() || self.accuracy_threshold_m <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "accuracy_threshold_m".to_string(),
                value: self.accuracy_threshold_m.to_string(),
            });
        }
        Ok(())
    }

    /// Classify an accuracy against this configuration's threshold
    pub fn classify(&self, horizontal_error_m: f64) -> AccuracyBand {
        AccuracyBand::classify(horizontal_error_m, self.accuracy_threshold_m)
    }
}

/// Severity band of a horizontal accuracy, for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccuracyBand {
    /// Within 10 m
    Excellent,
    /// Within 30 m
    Good,
    /// Within the configured threshold
    Acceptable,
    /// Worse than the threshold
    Poor,
}

impl AccuracyBand {
    pub fn classify(horizontal_error_m: f64, threshold_m: f64) -> Self {
        if horizontal_error_m <= EXCELLENT_ACCURACY_M {
            AccuracyBand::Excellent
        } else if horizontal_error_m <= GOOD_ACCURACY_M {
            AccuracyBand::Good
        } else if horizontal_error_m <= threshold_m {
            AccuracyBand::Acceptable
        } else {
            AccuracyBand::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccuracyBand::Excellent => "excellent",
            AccuracyBand::Good => "good",
            AccuracyBand::Acceptable => "acceptable",
            AccuracyBand::Poor => "poor",
        }
    }

    /// Colour name a progress indicator can use for this band
    pub fn color_hint(&self) -> &'static str {
        match self {
            AccuracyBand::Excellent => "green",
            AccuracyBand::Good => "yellowgreen",
            AccuracyBand::Acceptable => "orange",
            AccuracyBand::Poor => "red",
        }
    }

    pub fn is_within_threshold(&self) -> bool {
        !matches!(self, AccuracyBand::Poor)
    }
}

/// Live progress of a collecting session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub session: SessionId,
    /// Elapsed share of the window in [0, 1]
    pub fraction: f64,
    /// Human readable status line
    pub message: String,
    /// Best horizontal error so far
    pub best_accuracy_m: Option<f64>,
    pub sample_count: usize,
}

/// Event emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    Progress(ProgressUpdate),
    Finished(SessionId, AcquisitionOutcome),
}

impl AcquisitionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            AcquisitionEvent::Progress(update) => update.session,
            AcquisitionEvent::Finished(session, _) => *session,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionEvent::Finished(..))
    }
}
