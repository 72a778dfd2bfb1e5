//! Configuration and time utilities

pub mod clock;
pub mod config;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, ConfigResult, ConfigurationManager, ParameterUpdates};
