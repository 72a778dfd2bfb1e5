//! Status lines and outcome formatting
//!
//! Presentation helpers for hosts that display acquisition progress. Nothing
//! here influences engine behaviour.

use crate::api::types::{AccuracyBand, AcquisitionFailure, AcquisitionOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status line shown next to the progress indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLine {
    /// Waiting on the permission prompt
    AwaitingPermission,
    /// Collecting but no fix yet
    Searching,
    /// Collecting with at least one fix
    Tracking {
        best_accuracy_m: f64,
        sample_count: usize,
    },
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::AwaitingPermission => write!(f, "Waiting for location permission"),
            StatusLine::Searching => write!(f, "Searching for position…"),
            StatusLine::Tracking {
                best_accuracy_m,
                sample_count,
            } => {
                let noun = if *sample_count == 1 { "fix" } else { "fixes" };
                write!(
                    f,
                    "Best accuracy ±{:.1} m ({} {})",
                    best_accuracy_m, sample_count, noun
                )
            }
        }
    }
}

/// Actionable message for a failure, suitable for an end user
pub fn failure_message(failure: &AcquisitionFailure) -> String {
    match failure {
        AcquisitionFailure::PermissionDenied => {
            "Location permission was denied. Allow location access in the app settings and try again."
                .to_string()
        }
        AcquisitionFailure::PermissionCheckFailed { details } => format!(
            "The location permission could not be checked ({}). Try again.",
            details
        ),
        AcquisitionFailure::StreamUnavailable { details } => format!(
            "Location services are unreachable ({}). Turn on location services and try again.",
            details
        ),
        AcquisitionFailure::NoFixObtained { window_ms, .. } => format!(
            "No position signal was received in {} seconds. Move to open sky and try again.",
            window_ms / 1000
        ),
    }
}

/// Serializable view of a finished acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FormattedOutcome {
    Completed {
        latitude_deg: f64,
        longitude_deg: f64,
        horizontal_error_m: f64,
        altitude_m: Option<f64>,
        captured_at_ms: u64,
        samples_collected: usize,
        band: AccuracyBand,
    },
    Failed {
        reason: String,
        message: String,
    },
}

/// Builds [`FormattedOutcome`]s with a fixed coordinate precision
#[derive(Debug, Clone)]
pub struct OutcomeFormatter {
    /// Decimal places kept for coordinates
    precision: u8,
}

impl Default for OutcomeFormatter {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl OutcomeFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision.min(12);
        self
    }

    pub fn format(&self, outcome: &AcquisitionOutcome) -> FormattedOutcome {
        match outcome {
            Ok(fix) => FormattedOutcome::Completed {
                latitude_deg: self.round(fix.sample.latitude()),
                longitude_deg: self.round(fix.sample.longitude()),
                horizontal_error_m: fix.horizontal_error_m(),
                altitude_m: fix.sample.altitude_m(),
                captured_at_ms: fix.sample.captured_at_ms(),
                samples_collected: fix.samples_collected,
                band: fix.band,
            },
            Err(failure) => FormattedOutcome::Failed {
                reason: failure_reason(failure).to_string(),
                message: failure_message(failure),
            },
        }
    }

    /// One-line text rendering
    pub fn format_text(&self, outcome: &AcquisitionOutcome) -> String {
        match self.format(outcome) {
            FormattedOutcome::Completed {
                latitude_deg,
                longitude_deg,
                horizontal_error_m,
                samples_collected,
                band,
                ..
            } => format!(
                "{:.prec$}, {:.prec$} ±{:.1} m [{}] from {} fixes",
                latitude_deg,
                longitude_deg,
                horizontal_error_m,
                band.label(),
                samples_collected,
                prec = self.precision as usize
            ),
            FormattedOutcome::Failed { reason, message } => format!("{}: {}", reason, message),
        }
    }

    pub fn format_json(&self, outcome: &AcquisitionOutcome) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.format(outcome))
    }

    pub fn format_json_pretty(
        &self,
        outcome: &AcquisitionOutcome,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.format(outcome))
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        (value * factor).round() / factor
    }
}

/// Stable machine-readable failure code
pub fn failure_reason(failure: &AcquisitionFailure) -> &'static str {
    match failure {
        AcquisitionFailure::PermissionDenied => "permission_denied",
        AcquisitionFailure::PermissionCheckFailed { .. } => "permission_check_failed",
        AcquisitionFailure::StreamUnavailable { .. } => "stream_unavailable",
        AcquisitionFailure::NoFixObtained { .. } => "no_fix_obtained",
    }
}
