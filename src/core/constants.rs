//! Acquisition defaults and classification limits

/// Length of the sampling window (milliseconds)
pub const DEFAULT_WINDOW_DURATION_MS: u64 = 20_000;

/// Interval between progress ticks (milliseconds)
pub const DEFAULT_PROGRESS_TICK_MS: u64 = 50;

/// Accuracy threshold used for display classification (meters)
pub const DEFAULT_ACCURACY_THRESHOLD_M: f64 = 50.0;

/// Upper bound of the "excellent" accuracy band (meters)
pub const EXCELLENT_ACCURACY_M: f64 = 10.0;

/// Upper bound of the "good" accuracy band (meters)
pub const GOOD_ACCURACY_M: f64 = 30.0;
