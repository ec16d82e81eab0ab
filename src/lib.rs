//! Playback Stream State Machine
//!
//! Lifecycle and position tracking for a playback stream built on top of an
//! opaque audio sink. The sink does the actual transport; this crate keeps
//! the stream's view of it consistent:
//!
//! - a poll-driven state machine (`Open → Starting → Started → Pausing → ...`)
//!   that only leaves a transient state once the sink confirms it settled
//! - a frame counter that widens the sink's narrow, wrapping position into a
//!   monotonic 64-bit count, and reconciles written/read frames across
//!   flushes and stops
//! - presentation timestamps translated into the caller's clock
//!
//! # Crate feature flags
//! - `simulated` (default): scriptable in-memory sink ([`sink::simulated`])
//!   used by the tests and the `trackstream` demo binary
//!
//! # Quick start
//! ```
//! # #[cfg(feature = "simulated")]
//! # {
//! use std::time::Duration;
//! use trackstream::{SinkController, StreamConfig, StreamState, TrackStream};
//!
//! let controller = SinkController::new();
//! let mut stream = TrackStream::new();
//! stream
//!     .open(&StreamConfig::low_latency(48_000), |params| controller.create(params))
//!     .unwrap();
//!
//! stream.request_start().unwrap();
//! while stream.state() != StreamState::Started {
//!     stream.update_state().unwrap();
//! }
//!
//! let frames = vec![0u8; 192 * stream.bytes_per_frame()];
//! let written = stream.write(&frames, 192, Duration::ZERO).unwrap();
//! assert_eq!(written, 192);
//! stream.close().unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod config; // Requested Parameters
pub mod position; // Wraparound-Safe Frame Counting
pub mod sink; // Sink Abstraction
pub mod state; // Lifecycle States
pub mod stream; // Playback Stream
pub mod timestamp; // Clock Translation

use sink::SinkError;
use timestamp::ClockId;

/// Error types for stream operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackStreamError {
    /// Operation not legal in the current state, or no sink attached
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Bad frame count, buffer or size
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Timestamps cannot be expressed in the requested clock
    #[error("Unsupported clock: {0}")]
    UnsupportedClock(ClockId),

    /// The output device went away
    #[error("Stream disconnected")]
    Disconnected,

    /// The sink has not presented any frame yet
    #[error("No presentation timestamp available")]
    NoTimestamp,

    /// Non-blocking operation could not make progress
    #[error("Operation would block")]
    WouldBlock,

    /// Any other sink failure
    #[error("Sink error: {0}")]
    Sink(SinkError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<SinkError> for TrackStreamError {
    /// Maps sink status codes onto the stream taxonomy.
    ///
    /// Statuses without a stream-level meaning are kept as
    /// [`TrackStreamError::Sink`].
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::WouldBlock => TrackStreamError::WouldBlock,
            SinkError::BadValue => {
                TrackStreamError::InvalidArgument(format!("sink rejected value ({err})"))
            }
            SinkError::NoInit | SinkError::InvalidOperation => {
                TrackStreamError::InvalidState(format!("sink rejected operation ({err})"))
            }
            SinkError::DeadObject => TrackStreamError::Disconnected,
            other => TrackStreamError::Sink(other),
        }
    }
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, TrackStreamError>;

// Public API exports
pub use config::{SampleFormat, StreamConfig};
pub use position::FramePositionTracker;
pub use sink::{AudioSink, SinkParams};
#[cfg(feature = "simulated")]
pub use sink::{SimulatedSink, SinkController};
pub use state::StreamState;
pub use stream::{TrackStream, DEFAULT_FRAMES_PER_BURST};
pub use timestamp::{ExtendedTimestamp, FrameTimestamp, TimestampTranslator};
