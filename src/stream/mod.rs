//! Playback Stream
//!
//! [`TrackStream`] drives an [`AudioSink`] through its lifecycle and keeps
//! the caller-visible frame counters consistent while the sink's own
//! position counter wraps, stalls or restarts at zero.
//!
//! Nothing here runs in the background. Lifecycle requests only move the
//! stream into a transient state; the caller polls
//! [`TrackStream::update_state`] at its own cadence to observe the sink
//! settling.
//!
//! ```
//! # #[cfg(feature = "simulated")]
//! # {
//! use std::time::Duration;
//! use trackstream::{SinkController, StreamConfig, StreamState, TrackStream};
//!
//! let controller = SinkController::new();
//! let mut stream = TrackStream::new();
//! stream
//!     .open(&StreamConfig::new(48_000), |params| controller.create(params))
//!     .unwrap();
//!
//! let silence = vec![0u8; 256 * stream.bytes_per_frame()];
//! stream.write(&silence, 256, Duration::ZERO).unwrap();
//!
//! stream.request_start().unwrap();
//! stream.update_state().unwrap();
//! assert_eq!(stream.state(), StreamState::Started);
//!
//! controller.advance(128);
//! assert_eq!(stream.frames_read(), 128);
//! stream.close().unwrap();
//! # }
//! ```

use crate::config::{SampleFormat, StreamConfig, DEFAULT_CHANNEL_COUNT, DEFAULT_SAMPLE_FORMAT};
use crate::position::FramePositionTracker;
use crate::sink::{AudioSink, SinkError, SinkParams, SinkResult};
use crate::state::StreamState;
use crate::timestamp::{ClockId, FrameTimestamp, TimestampTranslator};
use crate::{Result, TrackStreamError};
use std::time::Duration;

/// Burst size reported when the sink cannot tell
///
/// Placeholder until sinks expose a burst query.
pub const DEFAULT_FRAMES_PER_BURST: u32 = 192;

/// Convert a frame count to a byte count
///
/// Fails for zero frames or when the result does not fit a signed 32-bit
/// byte count, the largest transfer a sink accepts.
pub fn frames_to_bytes(num_frames: usize, bytes_per_frame: usize) -> Result<usize> {
    if num_frames == 0 {
        return Err(TrackStreamError::InvalidArgument(
            "frame count must be positive".into(),
        ));
    }
    num_frames
        .checked_mul(bytes_per_frame)
        .filter(|bytes| *bytes <= i32::MAX as usize)
        .ok_or_else(|| {
            TrackStreamError::InvalidArgument(format!(
                "{num_frames} frames of {bytes_per_frame} bytes overflows a transfer"
            ))
        })
}

/// Playback stream over an [`AudioSink`]
pub struct TrackStream<S: AudioSink> {
    state: StreamState,
    sink: Option<S>,
    config: StreamConfig,
    /// Negotiated by the sink at open
    sample_rate: u32,
    channel_count: u16,
    format: SampleFormat,
    frames_written: u64,
    frames_read: FramePositionTracker,
    /// Raw position when start was requested
    position_when_starting: Option<u32>,
    /// Last raw position seen while pausing
    position_when_pausing: Option<u32>,
    /// Set by a flush/stop fold until the sink counter is seen back at zero
    awaiting_counter_reset: bool,
}

impl<S: AudioSink> TrackStream<S> {
    /// Create an unopened stream
    pub fn new() -> Self {
        TrackStream {
            state: StreamState::Uninitialized,
            sink: None,
            config: StreamConfig::default(),
            sample_rate: 0,
            channel_count: DEFAULT_CHANNEL_COUNT,
            format: DEFAULT_SAMPLE_FORMAT,
            frames_written: 0,
            frames_read: FramePositionTracker::new(),
            position_when_starting: None,
            position_when_pausing: None,
            awaiting_counter_reset: false,
        }
    }

    /// Create the sink and move to `Open`
    ///
    /// `create` receives the requested parameters with unspecified values
    /// filled in. If it fails the stream stays `Uninitialized`. On success
    /// the sink's negotiated rate, channel count and format replace the
    /// requested ones.
    pub fn open<F>(&mut self, config: &StreamConfig, create: F) -> Result<()>
    where
        F: FnOnce(&SinkParams) -> SinkResult<S>,
    {
        if self.state != StreamState::Uninitialized {
            return Err(self.invalid_state("open"));
        }
        config.validate()?;
        let tracker = FramePositionTracker::with_width(config.position_width_bits)
            .ok_or_else(|| TrackStreamError::Config("invalid position width".into()))?;

        let params = config.sink_params();
        log::debug!(
            "open(): channels = {}, format = {:?}, capacity = {}",
            params.channel_count,
            params.format,
            params.buffer_capacity_frames
        );
        let sink = create(&params).map_err(|err| {
            log::error!("open(): sink creation failed: {err}");
            TrackStreamError::from(err)
        })?;

        if sink.channel_count() == 0 {
            log::error!("open(): sink negotiated zero channels");
            return Err(TrackStreamError::Config(
                "sink negotiated zero channels".into(),
            ));
        }

        self.sample_rate = sink.sample_rate();
        self.channel_count = sink.channel_count();
        self.format = sink.format();
        self.config = *config;
        self.frames_read = tracker;
        self.frames_written = 0;
        self.awaiting_counter_reset = false;
        self.sink = Some(sink);
        self.set_state(StreamState::Open);
        Ok(())
    }

    /// Release the sink; further calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.state != StreamState::Closed {
            self.sink = None;
            self.position_when_starting = None;
            self.position_when_pausing = None;
            self.set_state(StreamState::Closed);
        }
        Ok(())
    }

    /// Ask the sink to start; legal from `Open`, `Paused`, `Stopped`, `Flushed`
    pub fn request_start(&mut self) -> Result<()> {
        let allowed = self.state.can_start();
        let sink = self.checked_sink("request_start", allowed)?;
        // the position at start lets update_state() report how far the sink ran
        let outcome = sink
            .position()
            .and_then(|position| sink.start().map(|()| position));
        match outcome {
            Ok(position) => {
                self.position_when_starting = Some(position);
                self.awaiting_counter_reset = false;
                self.set_state(StreamState::Starting);
                Ok(())
            }
            Err(err) => Err(self.sink_error("request_start", err)),
        }
    }

    /// Ask the sink to pause; legal from `Starting` and `Started`
    pub fn request_pause(&mut self) -> Result<()> {
        let allowed = self.state.can_pause();
        let sink = self.checked_sink("request_pause", allowed)?;
        let outcome = sink.pause().map(|()| sink.position());
        match outcome {
            Err(err) => Err(self.sink_error("request_pause", err)),
            Ok(snapshot) => {
                self.set_state(StreamState::Pausing);
                match snapshot {
                    Ok(position) => {
                        self.position_when_pausing = Some(position);
                        Ok(())
                    }
                    Err(err) => {
                        self.position_when_pausing = None;
                        Err(self.sink_error("request_pause", err))
                    }
                }
            }
        }
    }

    /// Discard queued frames; legal from `Paused`
    ///
    /// The discarded frames are counted as read so that `frames_read()`
    /// catches up with `frames_written()`.
    pub fn request_flush(&mut self) -> Result<()> {
        let allowed = self.state.can_flush();
        let sink = self.checked_sink("request_flush", allowed)?;
        match sink.flush() {
            Ok(()) => {
                self.set_state(StreamState::Flushing);
                self.fold_unread_frames();
                Ok(())
            }
            Err(err) => Err(self.sink_error("request_flush", err)),
        }
    }

    /// Ask the sink to stop; legal from any state with a live sink
    pub fn request_stop(&mut self) -> Result<()> {
        let allowed = self.state.can_stop();
        let sink = self.checked_sink("request_stop", allowed)?;
        match sink.stop() {
            Ok(()) => {
                self.set_state(StreamState::Stopping);
                self.fold_unread_frames();
                Ok(())
            }
            Err(err) => Err(self.sink_error("request_stop", err)),
        }
    }

    /// Poll the sink and leave a transient state once it settled
    ///
    /// Only `Starting`, `Pausing`, `Flushing` and `Stopping` query the sink;
    /// in every other state this is a no-op.
    pub fn update_state(&mut self) -> Result<()> {
        let Some(sink) = self.sink.as_ref() else {
            return Ok(());
        };
        match self.state {
            StreamState::Starting => {
                if sink.has_started() {
                    log::debug!(
                        "sink started (position at request: {:?})",
                        self.position_when_starting
                    );
                    self.set_state(StreamState::Started);
                }
            }
            StreamState::Pausing => {
                if sink.is_stopped() {
                    let position = match sink.position() {
                        Ok(position) => position,
                        Err(err) => return Err(self.sink_error("update_state", err)),
                    };
                    // the sink may report stopped before the head stops moving
                    if self.position_when_pausing == Some(position) {
                        self.set_state(StreamState::Paused);
                    }
                    self.position_when_pausing = Some(position);
                }
            }
            StreamState::Flushing => match sink.position() {
                Ok(0) => self.set_state(StreamState::Flushed),
                Ok(_) => {}
                Err(err) => return Err(self.sink_error("update_state", err)),
            },
            StreamState::Stopping => {
                if sink.is_stopped() {
                    self.set_state(StreamState::Stopped);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Queue `num_frames` frames from `buffer`
    ///
    /// A non-zero `timeout` selects a blocking transfer; its value is not
    /// enforced. Returns the number of frames accepted, which is zero when a
    /// non-blocking write finds no room.
    pub fn write(&mut self, buffer: &[u8], num_frames: usize, timeout: Duration) -> Result<usize> {
        if self.state == StreamState::Disconnected {
            return Err(TrackStreamError::Disconnected);
        }
        let bytes_per_frame = self.bytes_per_frame();
        let num_bytes = frames_to_bytes(num_frames, bytes_per_frame)?;
        if buffer.len() < num_bytes {
            return Err(TrackStreamError::InvalidArgument(format!(
                "buffer holds {} bytes, {} frames need {}",
                buffer.len(),
                num_frames,
                num_bytes
            )));
        }

        let blocking = !timeout.is_zero();
        let allowed = self.state.is_active();
        let sink = self.checked_sink("write", allowed)?;
        match sink.write(&buffer[..num_bytes], blocking) {
            Ok(bytes_written) => {
                let frames = bytes_written / bytes_per_frame;
                self.frames_written += frames as u64;
                Ok(frames)
            }
            Err(SinkError::WouldBlock) => Ok(0),
            Err(err) => {
                log::error!("invalid write, returned {err}");
                Err(self.sink_error("write", err))
            }
        }
    }

    /// Resize the usable part of the sink buffer; returns the applied size
    pub fn set_buffer_size(&mut self, requested_frames: u32) -> Result<u32> {
        let allowed = self.state.is_active();
        let sink = self.checked_sink("set_buffer_size", allowed)?;
        match sink.set_buffer_size_frames(requested_frames) {
            Ok(actual) => Ok(actual),
            Err(err) => Err(self.sink_error("set_buffer_size", err)),
        }
    }

    /// Usable part of the sink buffer in frames
    pub fn buffer_size(&self) -> Result<u32> {
        Ok(self.live_sink("buffer_size")?.buffer_size_frames())
    }

    /// Total sink buffer capacity in frames
    pub fn buffer_capacity(&self) -> Result<u32> {
        Ok(self.live_sink("buffer_capacity")?.buffer_capacity_frames())
    }

    /// Underruns (xruns) reported by the sink
    pub fn underrun_count(&self) -> Result<u32> {
        Ok(self.live_sink("underrun_count")?.underrun_count())
    }

    /// Frames per hardware burst
    pub fn frames_per_burst(&self) -> u32 {
        self.sink
            .as_ref()
            .and_then(|sink| sink.frames_per_burst())
            .unwrap_or(DEFAULT_FRAMES_PER_BURST)
    }

    /// Buffer size expressed as latency
    pub fn buffer_latency_ms(&self) -> Result<f64> {
        let frames = self.buffer_size()?;
        if self.sample_rate == 0 {
            return Err(self.invalid_state("buffer_latency_ms"));
        }
        Ok(frames as f64 * 1000.0 / self.sample_rate as f64)
    }

    /// Monotonic count of frames the sink has played
    ///
    /// The sink is only sampled while it is expected to advance; otherwise
    /// the cached count is returned unchanged. After a flush or stop the
    /// unplayed frames are already counted, so readings are ignored until
    /// the sink counter is back at zero or playback restarts.
    pub fn frames_read(&mut self) -> u64 {
        if !self.state.is_advancing() {
            return self.frames_read.frames();
        }
        let Some(Ok(position)) = self.sink.as_ref().map(|sink| sink.position()) else {
            return self.frames_read.frames();
        };
        if self.awaiting_counter_reset {
            if position == 0 {
                self.awaiting_counter_reset = false;
            } else {
                log::debug!("ignoring position {position} until the sink counter restarts");
            }
        } else {
            self.frames_read.update_from_raw(position);
        }
        self.frames_read.frames()
    }

    /// Monotonic count of frames accepted by `write()`
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Most recent presentation timestamp in `clock`
    pub fn timestamp(&self, clock: ClockId) -> Result<FrameTimestamp> {
        TimestampTranslator::timebase_for(clock)?;
        let sink = self.live_sink("timestamp")?;
        let extended = sink.timestamp().map_err(|err| {
            log::error!("timestamp(): sink returned {err}");
            TrackStreamError::from(err)
        })?;
        TimestampTranslator::translate(clock, &extended)
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Configuration the stream was opened with
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Negotiated sample rate in Hz (0 before open)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated samples per frame
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Negotiated sample format
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Size of one frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        self.channel_count as usize * self.format.bytes_per_sample()
    }

    /// The sink, while one is attached
    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    /// Mutable access to the sink, while one is attached
    pub fn sink_mut(&mut self) -> Option<&mut S> {
        self.sink.as_mut()
    }

    fn set_state(&mut self, next: StreamState) {
        if self.state != next {
            log::debug!("state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn invalid_state(&self, operation: &str) -> TrackStreamError {
        invalid_state_error(operation, self.state)
    }

    fn checked_sink(&mut self, operation: &str, allowed: bool) -> Result<&mut S> {
        let state = self.state;
        match self.sink.as_mut() {
            Some(sink) if allowed => Ok(sink),
            _ => Err(invalid_state_error(operation, state)),
        }
    }

    fn live_sink(&self, operation: &str) -> Result<&S> {
        self.sink
            .as_ref()
            .ok_or_else(|| self.invalid_state(operation))
    }

    /// Translate a sink failure, noting a lost device
    fn sink_error(&mut self, operation: &str, err: SinkError) -> TrackStreamError {
        log::error!("{operation}() failed: sink returned {err}");
        if err == SinkError::DeadObject && self.state.is_active() {
            self.set_state(StreamState::Disconnected);
        }
        TrackStreamError::from(err)
    }

    /// Count undelivered frames as read, then follow the sink counter back to zero
    fn fold_unread_frames(&mut self) {
        let unread = self.frames_written.saturating_sub(self.frames_read.frames());
        self.frames_read.advance(unread);
        self.frames_read.reset_baseline();
        self.awaiting_counter_reset = true;
    }
}

fn invalid_state_error(operation: &str, state: StreamState) -> TrackStreamError {
    log::warn!("{operation}() called when state is {state}");
    TrackStreamError::InvalidState(format!("{operation}() called when state is {state}"))
}

impl<S: AudioSink> Default for TrackStream<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AudioSink> Drop for TrackStream<S> {
    fn drop(&mut self) {
        if !self.state.is_released() {
            log::error!("stream not closed, in state {}", self.state);
        }
    }
}

#[cfg(all(test, feature = "simulated"))]
mod tests {
    use super::*;
    use crate::sink::{SimulatedSink, SinkController};
    use crate::timestamp::{ExtendedTimestamp, Timebase, TimestampLocation};

    fn open_stream(config: StreamConfig) -> (TrackStream<SimulatedSink>, SinkController) {
        let controller = SinkController::new();
        let mut stream = TrackStream::new();
        stream
            .open(&config, |params| controller.create(params))
            .unwrap();
        (stream, controller)
    }

    fn started_stream() -> (TrackStream<SimulatedSink>, SinkController) {
        let (mut stream, controller) = open_stream(StreamConfig::new(48_000));
        stream.request_start().unwrap();
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Started);
        (stream, controller)
    }

    #[test]
    fn test_frames_to_bytes() {
        assert_eq!(frames_to_bytes(100, 4).unwrap(), 400);
        assert!(matches!(
            frames_to_bytes(0, 4),
            Err(TrackStreamError::InvalidArgument(_))
        ));
        assert!(frames_to_bytes(usize::MAX, 8).is_err());
        assert!(frames_to_bytes(i32::MAX as usize / 4 + 1, 4).is_err());
    }

    #[test]
    fn test_open_uses_negotiated_values() {
        let controller = SinkController::new();
        controller.force_sample_rate(44_100);
        let mut stream = TrackStream::new();
        stream
            .open(&StreamConfig::new(48_000), |params| controller.create(params))
            .unwrap();
        assert_eq!(stream.state(), StreamState::Open);
        assert_eq!(stream.sample_rate(), 44_100);
        assert_eq!(stream.channel_count(), 2);
        assert_eq!(stream.format(), SampleFormat::F32);
        assert_eq!(stream.bytes_per_frame(), 8);
        stream.close().unwrap();
    }

    #[test]
    fn test_open_failure_stays_uninitialized() {
        let controller = SinkController::new();
        controller.fail_create(SinkError::NoMemory);
        let mut stream: TrackStream<SimulatedSink> = TrackStream::new();
        let err = stream
            .open(&StreamConfig::default(), |params| controller.create(params))
            .unwrap_err();
        assert_eq!(err, TrackStreamError::Sink(SinkError::NoMemory));
        assert_eq!(stream.state(), StreamState::Uninitialized);
        assert!(stream.sink().is_none());
    }

    #[test]
    fn test_open_twice_rejected() {
        let (mut stream, controller) = open_stream(StreamConfig::default());
        let err = stream
            .open(&StreamConfig::default(), |params| controller.create(params))
            .unwrap_err();
        assert!(matches!(err, TrackStreamError::InvalidState(_)));
        assert_eq!(stream.state(), StreamState::Open);
        stream.close().unwrap();
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let controller = SinkController::new();
        let mut stream: TrackStream<SimulatedSink> = TrackStream::new();
        let config = StreamConfig::default().with_position_width(0);
        let err = stream
            .open(&config, |params| controller.create(params))
            .unwrap_err();
        assert!(matches!(err, TrackStreamError::Config(_)));
        assert!(!controller.sink_alive());
    }

    #[test]
    fn test_open_rejects_zero_channel_sink() {
        let controller = SinkController::new();
        controller.force_channel_count(0);
        let mut stream: TrackStream<SimulatedSink> = TrackStream::new();
        let err = stream
            .open(&StreamConfig::default(), |params| controller.create(params))
            .unwrap_err();
        assert!(matches!(err, TrackStreamError::Config(_)));
        assert_eq!(stream.state(), StreamState::Uninitialized);
        assert!(!controller.sink_alive());
        assert!(matches!(
            stream.write(&[0u8; 80], 10, Duration::ZERO),
            Err(TrackStreamError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_failure_keeps_state() {
        let (mut stream, controller) = open_stream(StreamConfig::default());
        controller.fail_next_command(SinkError::TimedOut);
        let err = stream.request_start().unwrap_err();
        assert_eq!(err, TrackStreamError::Sink(SinkError::TimedOut));
        assert_eq!(stream.state(), StreamState::Open);
        stream.close().unwrap();
    }

    #[test]
    fn test_pause_requires_settled_position() {
        let (mut stream, controller) = started_stream();
        stream.request_pause().unwrap();
        assert_eq!(stream.state(), StreamState::Pausing);

        // sink claims stopped but the head is still moving
        controller.script_positions([12, 12]);
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Pausing);
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Paused);
        stream.close().unwrap();
    }

    #[test]
    fn test_pause_waits_for_sink_stopped() {
        let (mut stream, controller) = started_stream();
        controller.script_stopped([false, false]);
        stream.request_pause().unwrap();
        stream.update_state().unwrap();
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Pausing);
        // position unchanged since the request
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Paused);
        stream.close().unwrap();
    }

    #[test]
    fn test_stop_folds_unread_frames() {
        let (mut stream, controller) = started_stream();
        let buffer = vec![0u8; 100 * stream.bytes_per_frame()];
        assert_eq!(stream.write(&buffer, 100, Duration::ZERO).unwrap(), 100);
        controller.advance(30);
        assert_eq!(stream.frames_read(), 30);

        stream.request_stop().unwrap();
        assert_eq!(stream.state(), StreamState::Stopping);
        assert_eq!(stream.frames_read(), 100);
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.frames_read(), stream.frames_written());
        stream.close().unwrap();
    }

    #[test]
    fn test_stop_ignores_draining_positions() {
        let (mut stream, controller) = started_stream();
        let buffer = vec![0u8; 100 * stream.bytes_per_frame()];
        stream.write(&buffer, 100, Duration::ZERO).unwrap();
        controller.advance(30);
        assert_eq!(stream.frames_read(), 30);

        stream.request_stop().unwrap();
        // sink still drains before its counter restarts
        controller.script_positions([60, 90, 0]);
        assert_eq!(stream.frames_read(), 100);
        assert_eq!(stream.frames_read(), 100);
        assert_eq!(stream.frames_read(), 100);
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Stopped);

        stream.request_start().unwrap();
        stream.update_state().unwrap();
        stream.write(&buffer, 50, Duration::ZERO).unwrap();
        controller.advance(50);
        assert_eq!(stream.frames_read(), 150);
        assert_eq!(stream.frames_read(), stream.frames_written());
        stream.close().unwrap();
    }

    #[test]
    fn test_pause_snapshot_failure_still_pausing() {
        let (mut stream, controller) = started_stream();
        controller.fail_next_position(SinkError::TimedOut);
        let err = stream.request_pause().unwrap_err();
        assert_eq!(err, TrackStreamError::Sink(SinkError::TimedOut));
        assert_eq!(stream.state(), StreamState::Pausing);

        // first poll takes the missing snapshot, second confirms it
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Pausing);
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Paused);
        stream.close().unwrap();
    }

    #[test]
    fn test_frames_read_cached_when_paused() {
        let (mut stream, controller) = started_stream();
        let buffer = vec![0u8; 64 * stream.bytes_per_frame()];
        stream.write(&buffer, 64, Duration::ZERO).unwrap();
        controller.advance(20);
        assert_eq!(stream.frames_read(), 20);

        stream.request_pause().unwrap();
        stream.update_state().unwrap();
        assert_eq!(stream.state(), StreamState::Paused);
        controller.set_position(50);
        assert_eq!(stream.frames_read(), 20);
        stream.close().unwrap();
    }

    #[test]
    fn test_write_would_block_is_zero() {
        let (mut stream, controller) = open_stream(
            StreamConfig::default()
                .with_channel_count(1)
                .with_format(SampleFormat::F32),
        );
        assert_eq!(stream.bytes_per_frame(), 4);
        controller.script_write(Err(SinkError::WouldBlock));
        let buffer = vec![0u8; 400];
        assert_eq!(stream.write(&buffer, 100, Duration::ZERO).unwrap(), 0);
        assert_eq!(stream.frames_written(), 0);
        stream.close().unwrap();
    }

    #[test]
    fn test_write_partial_counts_whole_frames() {
        let (mut stream, controller) = open_stream(StreamConfig::default());
        controller.script_write(Ok(8 * 10 + 3));
        let buffer = vec![0u8; 8 * 20];
        assert_eq!(stream.write(&buffer, 20, Duration::from_millis(5)).unwrap(), 10);
        assert_eq!(stream.frames_written(), 10);
        stream.close().unwrap();
    }

    #[test]
    fn test_write_argument_errors() {
        let (mut stream, _controller) = open_stream(StreamConfig::default());
        let buffer = vec![0u8; 16];
        assert!(matches!(
            stream.write(&buffer, 0, Duration::ZERO),
            Err(TrackStreamError::InvalidArgument(_))
        ));
        assert!(matches!(
            stream.write(&buffer, 3, Duration::ZERO),
            Err(TrackStreamError::InvalidArgument(_))
        ));
        stream.close().unwrap();
    }

    #[test]
    fn test_write_sink_error_translated() {
        let (mut stream, controller) = open_stream(StreamConfig::default());
        controller.script_write(Err(SinkError::BadValue));
        let buffer = vec![0u8; 8];
        assert!(matches!(
            stream.write(&buffer, 1, Duration::ZERO),
            Err(TrackStreamError::InvalidArgument(_))
        ));
        stream.close().unwrap();
    }

    #[test]
    fn test_dead_sink_disconnects() {
        let (mut stream, controller) = started_stream();
        stream.request_pause().unwrap();
        controller.disconnect();
        let err = stream.update_state().unwrap_err();
        assert_eq!(err, TrackStreamError::Disconnected);
        assert_eq!(stream.state(), StreamState::Disconnected);

        let buffer = vec![0u8; 8];
        assert_eq!(
            stream.write(&buffer, 1, Duration::ZERO).unwrap_err(),
            TrackStreamError::Disconnected
        );
        assert!(matches!(
            stream.request_start(),
            Err(TrackStreamError::InvalidState(_))
        ));
        stream.close().unwrap();
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn test_buffer_queries() {
        let config = StreamConfig::new(48_000).with_buffer_capacity(960);
        let (mut stream, controller) = open_stream(config);
        assert_eq!(stream.buffer_capacity().unwrap(), 960);
        assert_eq!(stream.set_buffer_size(480).unwrap(), 480);
        assert_eq!(stream.buffer_size().unwrap(), 480);
        assert_eq!(stream.set_buffer_size(4_000).unwrap(), 960);
        assert!(matches!(
            stream.set_buffer_size(0),
            Err(TrackStreamError::InvalidArgument(_))
        ));
        approx::assert_relative_eq!(stream.buffer_latency_ms().unwrap(), 20.0);
        assert_eq!(stream.underrun_count().unwrap(), 0);

        assert_eq!(stream.frames_per_burst(), DEFAULT_FRAMES_PER_BURST);
        controller.set_frames_per_burst(96);
        assert_eq!(stream.frames_per_burst(), 96);
        stream.close().unwrap();
    }

    #[test]
    fn test_queries_after_close() {
        let (mut stream, _controller) = open_stream(StreamConfig::default());
        stream.close().unwrap();
        assert!(matches!(
            stream.buffer_size(),
            Err(TrackStreamError::InvalidState(_))
        ));
        assert!(matches!(
            stream.set_buffer_size(64),
            Err(TrackStreamError::InvalidState(_))
        ));
        assert!(matches!(
            stream.timestamp(ClockId::Monotonic),
            Err(TrackStreamError::InvalidState(_))
        ));
        assert_eq!(stream.frames_per_burst(), DEFAULT_FRAMES_PER_BURST);
    }

    #[test]
    fn test_timestamp_selects_timebase() {
        let (mut stream, controller) = open_stream(StreamConfig::default());
        controller.set_timestamp(Ok(ExtendedTimestamp::new()
            .with_sample(Timebase::Monotonic, TimestampLocation::Kernel, 480, 10_000)
            .with_sample(Timebase::BootTime, TimestampLocation::Kernel, 480, 90_000)));
        let mono = stream.timestamp(ClockId::Monotonic).unwrap();
        assert_eq!((mono.frame_position, mono.time_nanos), (480, 10_000));
        let boot = stream.timestamp(ClockId::BootTime).unwrap();
        assert_eq!(boot.time_nanos, 90_000);

        controller.set_timestamp(Err(SinkError::InvalidOperation));
        assert!(matches!(
            stream.timestamp(ClockId::Monotonic),
            Err(TrackStreamError::InvalidState(_))
        ));
        stream.close().unwrap();
    }
}
