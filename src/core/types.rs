//! Core data types for position acquisition

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Reasons a raw fix cannot become a [`PositionSample`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("latitude {0} outside -90..90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside -180..180")]
    LongitudeOutOfRange(f64),
    #[error("horizontal error {0} must be finite and non-negative")]
    InvalidHorizontalError(f64),
}

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create validated coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SampleError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SampleError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SampleError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }
}

/// One observed fix from the position stream.
///
/// Samples are immutable once built. Comparison for "best" uses
/// [`PositionSample::accuracy_ordering`] only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    coordinates: Coordinates,
    horizontal_error_m: f64,
    captured_at_ms: u64,
    altitude_m: Option<f64>,
}

impl PositionSample {
    /// Create a validated sample
    pub fn new(
        latitude: f64,
        longitude: f64,
        horizontal_error_m: f64,
        captured_at_ms: u64,
    ) -> Result<Self, SampleError> {
        let coordinates = Coordinates::new(latitude, longitude)?;
        if !horizontal_error_m.is_finite() || horizontal_error_m < 0.0 {
            return Err(SampleError::InvalidHorizontalError(horizontal_error_m));
        }

        Ok(Self {
            coordinates,
            horizontal_error_m,
            captured_at_ms,
            altitude_m: None,
        })
    }

    /// Attach a reported altitude (display only)
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates.longitude
    }

    pub fn horizontal_error_m(&self) -> f64 {
        self.horizontal_error_m
    }

    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at_ms
    }

    pub fn altitude_m(&self) -> Option<f64> {
        self.altitude_m
    }

    /// Ordering where `Less` means "more accurate".
    ///
    /// Lower horizontal error wins; equal errors prefer the later capture.
    pub fn accuracy_ordering(&self, other: &Self) -> Ordering {
        self.horizontal_error_m
            .total_cmp(&other.horizontal_error_m)
            .then_with(|| other.captured_at_ms.cmp(&self.captured_at_ms))
    }

    /// True when `self` should replace `other` as the best fix
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.accuracy_ordering(other) != Ordering::Greater
    }
}
