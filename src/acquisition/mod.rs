//! Position acquisition engine
//!
//! Collects fixes for a fixed window, keeps the most accurate one and
//! finalizes with it, or with a typed failure when nothing usable arrived.

pub mod best;
pub mod progress;
pub mod session;
pub mod engine;

pub use best::BestFixTracker;
pub use progress::WindowClock;
pub use session::{AcquisitionSession, SessionId, SessionStatus};
pub use engine::AcquisitionEngine;
