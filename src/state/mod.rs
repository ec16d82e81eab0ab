//! Stream Lifecycle States
//!
//! The state enum of a playback stream plus the transition tables that the
//! stream consults before forwarding a lifecycle request to its sink.
//!
//! Transient states (`Starting`, `Pausing`, `Flushing`, `Stopping`) are only
//! left through [`crate::TrackStream::update_state`], once the sink confirms
//! the operation settled.

use std::fmt;

/// Lifecycle state of a playback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    /// Constructed, no sink attached yet
    #[default]
    Uninitialized,
    /// Sink created, never started
    Open,
    /// Start requested, waiting for the sink to report it is running
    Starting,
    /// Sink is consuming frames
    Started,
    /// Pause requested, waiting for the position to settle
    Pausing,
    /// Sink halted, queued frames retained
    Paused,
    /// Flush requested, waiting for the position to return to zero
    Flushing,
    /// Queued frames discarded
    Flushed,
    /// Stop requested, waiting for the sink to drain
    Stopping,
    /// Sink halted after draining
    Stopped,
    /// Sink released (terminal)
    Closed,
    /// Output device went away underneath the sink
    Disconnected,
}

impl StreamState {
    /// Every state, in declaration order
    pub const ALL: [StreamState; 12] = [
        StreamState::Uninitialized,
        StreamState::Open,
        StreamState::Starting,
        StreamState::Started,
        StreamState::Pausing,
        StreamState::Paused,
        StreamState::Flushing,
        StreamState::Flushed,
        StreamState::Stopping,
        StreamState::Stopped,
        StreamState::Closed,
        StreamState::Disconnected,
    ];

    /// Upper-case name used in log lines and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Uninitialized => "UNINITIALIZED",
            StreamState::Open => "OPEN",
            StreamState::Starting => "STARTING",
            StreamState::Started => "STARTED",
            StreamState::Pausing => "PAUSING",
            StreamState::Paused => "PAUSED",
            StreamState::Flushing => "FLUSHING",
            StreamState::Flushed => "FLUSHED",
            StreamState::Stopping => "STOPPING",
            StreamState::Stopped => "STOPPED",
            StreamState::Closed => "CLOSED",
            StreamState::Disconnected => "DISCONNECTED",
        }
    }

    /// States that hold a live, usable sink
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            StreamState::Uninitialized | StreamState::Closed | StreamState::Disconnected
        )
    }

    /// States that only advance through a poll
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StreamState::Starting
                | StreamState::Pausing
                | StreamState::Flushing
                | StreamState::Stopping
        )
    }

    /// States in which the sink is expected to be advancing its position
    pub fn is_advancing(&self) -> bool {
        matches!(
            self,
            StreamState::Starting | StreamState::Started | StreamState::Stopping
        )
    }

    /// A stream may be destroyed without leaking its sink only from these states
    pub fn is_released(&self) -> bool {
        matches!(self, StreamState::Uninitialized | StreamState::Closed)
    }

    /// `request_start()` is legal from here
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            StreamState::Open | StreamState::Paused | StreamState::Stopped | StreamState::Flushed
        )
    }

    /// `request_pause()` is legal from here
    pub fn can_pause(&self) -> bool {
        matches!(self, StreamState::Starting | StreamState::Started)
    }

    /// `request_flush()` is legal from here
    pub fn can_flush(&self) -> bool {
        *self == StreamState::Paused
    }

    /// `request_stop()` is legal from here
    pub fn can_stop(&self) -> bool {
        self.is_active()
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
