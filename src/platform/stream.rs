//! Position stream provider interface

use crate::core::PositionSample;
use crate::platform::{StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options passed to the provider when a subscription is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Ask the provider for its most accurate mode (GNSS rather than network)
    pub high_accuracy: bool,
    /// Minimum interval between delivered fixes (milliseconds, 0 = provider default)
    pub min_interval_ms: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            min_interval_ms: 0,
        }
    }
}

/// Event pushed by an open subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Sample(PositionSample),
    Error(StreamError),
}

/// Destination for stream events. Providers call it from whatever thread they run on.
pub type StreamSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Handle to a live position subscription
pub trait PositionSubscription: Send {
    /// Stop delivering events and release the underlying radio.
    /// Must be safe to call more than once.
    fn close(&mut self);

    /// Check whether the subscription still delivers events
    fn is_open(&self) -> bool;
}

/// Continuous position stream source
pub trait PositionStreamProvider: Send {
    /// Open a subscription delivering events into `sink` until closed
    fn open(
        &mut self,
        options: &StreamOptions,
        sink: StreamSink,
    ) -> StreamResult<Box<dyn PositionSubscription>>;
}
