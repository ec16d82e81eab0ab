//! Audio Sink Abstraction
//!
//! The stream never talks to a driver directly. It drives an [`AudioSink`],
//! an opaque output that owns buffering, mixing and device I/O, and only
//! relies on the small command/query surface defined here.

#[cfg(feature = "simulated")]
pub mod simulated;

#[cfg(feature = "simulated")]
pub use simulated::{SimulatedSink, SinkController};

use crate::config::SampleFormat;
use crate::timestamp::ExtendedTimestamp;

/// Status codes reported by a sink
///
/// These mirror the status values of typical platform audio APIs. The stream
/// translates them into [`crate::TrackStreamError`] at its boundary.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// Non-blocking transfer could not make progress
    #[error("operation would block")]
    WouldBlock,

    /// Sink was not initialized
    #[error("sink not initialized")]
    NoInit,

    /// Argument rejected by the sink
    #[error("bad value")]
    BadValue,

    /// Operation not valid in the sink's current state
    #[error("invalid operation")]
    InvalidOperation,

    /// The output device or server went away
    #[error("dead object")]
    DeadObject,

    /// Sink could not allocate resources
    #[error("out of memory")]
    NoMemory,

    /// Sink did not answer in time
    #[error("timed out")]
    TimedOut,

    /// Access to the device was denied
    #[error("permission denied")]
    PermissionDenied,

    /// Any other platform status
    #[error("unknown sink status {0}")]
    Unknown(i32),
}

/// Result type for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Parameters handed to a sink factory when a stream is opened
///
/// Unspecified values from the stream configuration have already been
/// replaced by concrete defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkParams {
    /// Requested sample rate in Hz (0 lets the sink choose)
    pub sample_rate: u32,
    /// Requested channel count
    pub channel_count: u16,
    /// Requested sample format
    pub format: SampleFormat,
    /// Requested buffer capacity in frames (0 lets the sink choose)
    pub buffer_capacity_frames: u32,
}

/// Playback output driven by a [`crate::TrackStream`]
///
/// Commands are asynchronous: a successful `start()` only means the request
/// was accepted. The stream learns about completion by polling
/// [`AudioSink::has_started`], [`AudioSink::is_stopped`] and
/// [`AudioSink::position`].
pub trait AudioSink: Send {
    /// Begin consuming queued frames
    fn start(&mut self) -> SinkResult<()>;

    /// Halt consumption, keeping queued frames
    fn pause(&mut self) -> SinkResult<()>;

    /// Halt consumption after draining queued frames
    fn stop(&mut self) -> SinkResult<()>;

    /// Discard queued frames; the position counter returns to zero
    fn flush(&mut self) -> SinkResult<()>;

    /// Raw playback head position in frames
    ///
    /// The counter may be narrower than 32 bits and wraps around.
    fn position(&self) -> SinkResult<u32>;

    /// Queue interleaved sample bytes
    ///
    /// Returns the number of bytes accepted. A non-blocking call with no room
    /// available returns [`SinkError::WouldBlock`].
    fn write(&mut self, bytes: &[u8], blocking: bool) -> SinkResult<usize>;

    /// Latest presentation timestamps across clock bases and pipeline stages
    fn timestamp(&self) -> SinkResult<ExtendedTimestamp>;

    /// True once the sink is actually running after `start()`
    fn has_started(&self) -> bool;

    /// True once the sink halted after `pause()` or `stop()`
    fn is_stopped(&self) -> bool;

    /// Adjust the usable part of the buffer; returns the size actually applied
    fn set_buffer_size_frames(&mut self, frames: u32) -> SinkResult<u32>;

    /// Usable part of the buffer in frames
    fn buffer_size_frames(&self) -> u32;

    /// Total buffer capacity in frames
    fn buffer_capacity_frames(&self) -> u32;

    /// Number of underruns since creation
    fn underrun_count(&self) -> u32;

    /// Negotiated sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Negotiated channel count
    fn channel_count(&self) -> u16;

    /// Negotiated sample format
    fn format(&self) -> SampleFormat;

    /// Frames consumed per hardware burst, when the sink can tell
    fn frames_per_burst(&self) -> Option<u32> {
        None
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn start(&mut self) -> SinkResult<()> {
        (**self).start()
    }

    fn pause(&mut self) -> SinkResult<()> {
        (**self).pause()
    }

    fn stop(&mut self) -> SinkResult<()> {
        (**self).stop()
    }

    fn flush(&mut self) -> SinkResult<()> {
        (**self).flush()
    }

    fn position(&self) -> SinkResult<u32> {
        (**self).position()
    }

    fn write(&mut self, bytes: &[u8], blocking: bool) -> SinkResult<usize> {
        (**self).write(bytes, blocking)
    }

    fn timestamp(&self) -> SinkResult<ExtendedTimestamp> {
        (**self).timestamp()
    }

    fn has_started(&self) -> bool {
        (**self).has_started()
    }

    fn is_stopped(&self) -> bool {
        (**self).is_stopped()
    }

    fn set_buffer_size_frames(&mut self, frames: u32) -> SinkResult<u32> {
        (**self).set_buffer_size_frames(frames)
    }

    fn buffer_size_frames(&self) -> u32 {
        (**self).buffer_size_frames()
    }

    fn buffer_capacity_frames(&self) -> u32 {
        (**self).buffer_capacity_frames()
    }

    fn underrun_count(&self) -> u32 {
        (**self).underrun_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn format(&self) -> SampleFormat {
        (**self).format()
    }

    fn frames_per_burst(&self) -> Option<u32> {
        (**self).frames_per_burst()
    }
}
