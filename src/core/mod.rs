//! Core types and constants for position acquisition

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
