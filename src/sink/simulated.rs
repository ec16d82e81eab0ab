//! In-memory sink with scriptable behavior
//!
//! [`SimulatedSink`] models a playback device as a bounded queue of frames
//! that a virtual DAC drains when [`SinkController::advance`] is called.
//! The [`SinkController`] shares the sink's state so a test (or the demo
//! binary) can keep steering the sink after it has been moved into a stream:
//! queue `has_started`/`is_stopped`/position readings, inject errors, or
//! override the reported timestamp.

use super::{AudioSink, SinkError, SinkParams, SinkResult};
use crate::config::SampleFormat;
use crate::timestamp::{ExtendedTimestamp, Timebase, TimestampLocation};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Sample rate chosen when the stream leaves it unspecified
pub const SIMULATED_DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Buffer capacity chosen when the stream leaves it unspecified
pub const SIMULATED_DEFAULT_CAPACITY_FRAMES: u32 = 1_024;

/// Offset between the simulated boot-time and monotonic clocks
const BOOT_CLOCK_OFFSET_NANOS: i64 = 5_000_000_000;

/// Start of the simulated monotonic clock
const CLOCK_EPOCH_NANOS: i64 = 1_000_000_000;

#[derive(Debug)]
struct SimulatedState {
    // negotiated parameters
    sample_rate: u32,
    channel_count: u16,
    format: SampleFormat,
    capacity_frames: u32,
    buffer_size_frames: u32,
    frames_per_burst: Option<u32>,
    position_width_bits: u32,

    // overrides applied at creation
    forced_sample_rate: Option<u32>,
    forced_channel_count: Option<u16>,
    create_error: Option<SinkError>,

    // device model
    running: bool,
    stopped: bool,
    position: u32,
    queued_frames: u64,
    presented_frames: i64,
    clock_nanos: i64,
    underruns: u32,
    disconnected: bool,

    // scripted answers, consumed front to back
    has_started_script: VecDeque<bool>,
    stopped_script: VecDeque<bool>,
    position_script: VecDeque<SinkResult<u32>>,
    write_script: VecDeque<SinkResult<usize>>,
    command_error: Option<SinkError>,
    timestamp_override: Option<SinkResult<ExtendedTimestamp>>,

    commands: Vec<&'static str>,
}

impl SimulatedState {
    fn new() -> Self {
        SimulatedState {
            sample_rate: SIMULATED_DEFAULT_SAMPLE_RATE,
            channel_count: 2,
            format: SampleFormat::F32,
            capacity_frames: SIMULATED_DEFAULT_CAPACITY_FRAMES,
            buffer_size_frames: SIMULATED_DEFAULT_CAPACITY_FRAMES,
            frames_per_burst: None,
            position_width_bits: 32,
            forced_sample_rate: None,
            forced_channel_count: None,
            create_error: None,
            running: false,
            stopped: true,
            position: 0,
            queued_frames: 0,
            presented_frames: 0,
            clock_nanos: CLOCK_EPOCH_NANOS,
            underruns: 0,
            disconnected: false,
            has_started_script: VecDeque::new(),
            stopped_script: VecDeque::new(),
            position_script: VecDeque::new(),
            write_script: VecDeque::new(),
            command_error: None,
            timestamp_override: None,
            commands: Vec::new(),
        }
    }

    fn position_mask(&self) -> u64 {
        (1u64 << self.position_width_bits) - 1
    }

    fn bytes_per_frame(&self) -> usize {
        self.channel_count as usize * self.format.bytes_per_sample()
    }

    /// Record a command and return the injected failure, if any
    fn command(&mut self, name: &'static str) -> SinkResult<()> {
        self.commands.push(name);
        if self.disconnected {
            return Err(SinkError::DeadObject);
        }
        match self.command_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn consume(&mut self, frames: u64) {
        if !self.running {
            return;
        }
        let played = frames.min(self.queued_frames);
        if played < frames {
            self.underruns += 1;
        }
        self.queued_frames -= played;
        self.position = ((self.position as u64 + played) & self.position_mask()) as u32;
        self.presented_frames += played as i64;
        if self.sample_rate > 0 {
            self.clock_nanos += (frames as i64 * 1_000_000_000) / self.sample_rate as i64;
        }
    }
}

/// Handle for steering a [`SimulatedSink`] from outside the stream
#[derive(Debug, Clone)]
pub struct SinkController {
    shared: Arc<Mutex<SimulatedState>>,
}

impl SinkController {
    /// Create a controller with default device behavior
    pub fn new() -> Self {
        SinkController {
            shared: Arc::new(Mutex::new(SimulatedState::new())),
        }
    }

    /// Sink factory for [`crate::TrackStream::open`]
    ///
    /// Requested values of zero are replaced by the simulated defaults.
    pub fn create(&self, params: &SinkParams) -> SinkResult<SimulatedSink> {
        let mut state = self.shared.lock();
        if let Some(err) = state.create_error.take() {
            return Err(err);
        }
        state.sample_rate = match (state.forced_sample_rate, params.sample_rate) {
            (Some(rate), _) => rate,
            (None, 0) => SIMULATED_DEFAULT_SAMPLE_RATE,
            (None, rate) => rate,
        };
        state.channel_count = state.forced_channel_count.unwrap_or(params.channel_count);
        state.format = params.format;
        state.capacity_frames = match params.buffer_capacity_frames {
            0 => SIMULATED_DEFAULT_CAPACITY_FRAMES,
            frames => frames,
        };
        state.buffer_size_frames = state.capacity_frames;
        Ok(SimulatedSink {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Make the next `create` fail
    pub fn fail_create(&self, err: SinkError) {
        self.shared.lock().create_error = Some(err);
    }

    /// Negotiate this sample rate regardless of the request
    pub fn force_sample_rate(&self, rate: u32) {
        self.shared.lock().forced_sample_rate = Some(rate);
    }

    /// Negotiate this channel count regardless of the request
    pub fn force_channel_count(&self, channels: u16) {
        self.shared.lock().forced_channel_count = Some(channels);
    }

    /// Width of the reported position counter
    pub fn set_position_width(&self, bits: u32) {
        self.shared.lock().position_width_bits = bits.clamp(1, 32);
    }

    /// Report a burst size
    pub fn set_frames_per_burst(&self, frames: u32) {
        self.shared.lock().frames_per_burst = Some(frames);
    }

    /// Move the hardware position counter
    pub fn set_position(&self, raw: u32) {
        let mut state = self.shared.lock();
        state.position = (raw as u64 & state.position_mask()) as u32;
    }

    /// Let the virtual DAC play `frames` frames
    ///
    /// Frames beyond what is queued count as an underrun.
    pub fn advance(&self, frames: u64) {
        self.shared.lock().consume(frames);
    }

    /// Queue answers for `has_started()`
    pub fn script_has_started(&self, answers: impl IntoIterator<Item = bool>) {
        self.shared.lock().has_started_script.extend(answers);
    }

    /// Queue answers for `is_stopped()`
    pub fn script_stopped(&self, answers: impl IntoIterator<Item = bool>) {
        self.shared.lock().stopped_script.extend(answers);
    }

    /// Queue raw readings for `position()`
    pub fn script_positions(&self, positions: impl IntoIterator<Item = u32>) {
        self.shared
            .lock()
            .position_script
            .extend(positions.into_iter().map(Ok));
    }

    /// Make the next `position()` fail
    pub fn fail_next_position(&self, err: SinkError) {
        self.shared.lock().position_script.push_back(Err(err));
    }

    /// Queue a result for `write()` (byte count or error)
    pub fn script_write(&self, result: SinkResult<usize>) {
        self.shared.lock().write_script.push_back(result);
    }

    /// Make the next start/pause/stop/flush fail
    pub fn fail_next_command(&self, err: SinkError) {
        self.shared.lock().command_error = Some(err);
    }

    /// Override the reported timestamp
    pub fn set_timestamp(&self, result: SinkResult<ExtendedTimestamp>) {
        self.shared.lock().timestamp_override = Some(result);
    }

    /// Simulate the device going away
    pub fn disconnect(&self) {
        let mut state = self.shared.lock();
        state.disconnected = true;
        state.running = false;
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<&'static str> {
        self.shared.lock().commands.clone()
    }

    /// Frames queued but not yet played
    pub fn queued_frames(&self) -> u64 {
        self.shared.lock().queued_frames
    }

    /// Whether the virtual DAC is consuming frames
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// True while a sink created by this controller is still alive
    pub fn sink_alive(&self) -> bool {
        Arc::strong_count(&self.shared) > 1
    }
}

impl Default for SinkController {
    fn default() -> Self {
        Self::new()
    }
}

/// Scriptable in-memory [`AudioSink`]
#[derive(Debug)]
pub struct SimulatedSink {
    shared: Arc<Mutex<SimulatedState>>,
}

impl AudioSink for SimulatedSink {
    fn start(&mut self) -> SinkResult<()> {
        let mut state = self.shared.lock();
        state.command("start")?;
        state.running = true;
        state.stopped = false;
        Ok(())
    }

    fn pause(&mut self) -> SinkResult<()> {
        let mut state = self.shared.lock();
        state.command("pause")?;
        state.running = false;
        state.stopped = true;
        Ok(())
    }

    fn stop(&mut self) -> SinkResult<()> {
        let mut state = self.shared.lock();
        state.command("stop")?;
        // drained instantly; the counter restarts like after a flush
        state.running = false;
        state.stopped = true;
        state.queued_frames = 0;
        state.position = 0;
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        let mut state = self.shared.lock();
        state.command("flush")?;
        if state.running {
            return Err(SinkError::InvalidOperation);
        }
        state.queued_frames = 0;
        state.position = 0;
        Ok(())
    }

    fn position(&self) -> SinkResult<u32> {
        let mut state = self.shared.lock();
        if let Some(scripted) = state.position_script.pop_front() {
            return scripted;
        }
        if state.disconnected {
            return Err(SinkError::DeadObject);
        }
        Ok(state.position)
    }

    fn write(&mut self, bytes: &[u8], blocking: bool) -> SinkResult<usize> {
        let mut state = self.shared.lock();
        state.commands.push("write");
        if let Some(scripted) = state.write_script.pop_front() {
            return scripted;
        }
        if state.disconnected {
            return Err(SinkError::DeadObject);
        }
        let bytes_per_frame = state.bytes_per_frame();
        if bytes_per_frame == 0 {
            return Err(SinkError::NoInit);
        }
        let frames = (bytes.len() / bytes_per_frame) as u64;
        let mut room = (state.buffer_size_frames as u64).saturating_sub(state.queued_frames);
        if blocking && room < frames && state.running {
            // the caller waits while the DAC drains enough to fit everything
            let shortfall = frames - room;
            state.consume(shortfall);
            room = (state.buffer_size_frames as u64).saturating_sub(state.queued_frames);
        }
        if room == 0 && !blocking {
            return Err(SinkError::WouldBlock);
        }
        let accepted = frames.min(room);
        state.queued_frames += accepted;
        Ok(accepted as usize * bytes_per_frame)
    }

    fn timestamp(&self) -> SinkResult<ExtendedTimestamp> {
        let state = self.shared.lock();
        if let Some(result) = &state.timestamp_override {
            return result.clone();
        }
        if state.disconnected {
            return Err(SinkError::DeadObject);
        }
        if state.presented_frames == 0 {
            return Ok(ExtendedTimestamp::new());
        }
        Ok(ExtendedTimestamp::new()
            .with_sample(
                Timebase::Monotonic,
                TimestampLocation::Server,
                state.presented_frames,
                state.clock_nanos,
            )
            .with_sample(
                Timebase::BootTime,
                TimestampLocation::Server,
                state.presented_frames,
                state.clock_nanos + BOOT_CLOCK_OFFSET_NANOS,
            ))
    }

    fn has_started(&self) -> bool {
        let mut state = self.shared.lock();
        match state.has_started_script.pop_front() {
            Some(answer) => answer,
            None => state.running,
        }
    }

    fn is_stopped(&self) -> bool {
        let mut state = self.shared.lock();
        match state.stopped_script.pop_front() {
            Some(answer) => answer,
            None => state.stopped,
        }
    }

    fn set_buffer_size_frames(&mut self, frames: u32) -> SinkResult<u32> {
        let mut state = self.shared.lock();
        if frames == 0 {
            return Err(SinkError::BadValue);
        }
        state.buffer_size_frames = frames.min(state.capacity_frames);
        Ok(state.buffer_size_frames)
    }

    fn buffer_size_frames(&self) -> u32 {
        self.shared.lock().buffer_size_frames
    }

    fn buffer_capacity_frames(&self) -> u32 {
        self.shared.lock().capacity_frames
    }

    fn underrun_count(&self) -> u32 {
        self.shared.lock().underruns
    }

    fn sample_rate(&self) -> u32 {
        self.shared.lock().sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.shared.lock().channel_count
    }

    fn format(&self) -> SampleFormat {
        self.shared.lock().format
    }

    fn frames_per_burst(&self) -> Option<u32> {
        self.shared.lock().frames_per_burst
    }
}
