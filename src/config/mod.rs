//! Stream Configuration
//!
//! Requested stream parameters. Every field except the position counter
//! width may be left unspecified, in which case a default is substituted
//! when the sink is created. The sink has the final say: after `open()` the
//! stream reports the values the sink actually negotiated.

use crate::position::DEFAULT_POSITION_WIDTH_BITS;
use crate::sink::SinkParams;
use crate::{Result, TrackStreamError};
use serde::{Deserialize, Serialize};

/// Channel count used when none is requested (stereo)
pub const DEFAULT_CHANNEL_COUNT: u16 = 2;

/// Sample format used when none is requested
pub const DEFAULT_SAMPLE_FORMAT: SampleFormat = SampleFormat::F32;

/// Interleaved PCM sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Signed 16-bit integer
    I16,
    /// Signed 24-bit integer, packed in 3 bytes
    I24Packed,
    /// Signed 32-bit integer
    I32,
    /// 32-bit IEEE float
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::I24Packed => 3,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }
}

/// Requested parameters for opening a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Samples per frame
    pub channel_count: Option<u16>,
    /// Sample encoding
    pub format: Option<SampleFormat>,
    /// Buffer capacity in frames
    pub buffer_capacity_frames: Option<u32>,
    /// Width of the sink's position counter in bits
    pub position_width_bits: u32,
}

impl StreamConfig {
    /// Request a sample rate, leaving everything else to the sink
    pub fn new(sample_rate: u32) -> Self {
        StreamConfig {
            sample_rate: Some(sample_rate),
            ..Self::default()
        }
    }

    /// Small buffer (two bursts) for interactive use
    pub fn low_latency(sample_rate: u32) -> Self {
        Self::new(sample_rate).with_buffer_capacity(2 * crate::stream::DEFAULT_FRAMES_PER_BURST)
    }

    /// Large buffer (~185ms at 44.1kHz) that tolerates scheduling hiccups
    pub fn stable(sample_rate: u32) -> Self {
        Self::new(sample_rate).with_buffer_capacity(8192)
    }

    /// Parse a configuration from JSON; missing fields are unspecified
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StreamConfig = serde_json::from_str(json)
            .map_err(|e| TrackStreamError::Config(format!("invalid stream config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the channel count
    pub fn with_channel_count(mut self, channels: u16) -> Self {
        self.channel_count = Some(channels);
        self
    }

    /// Set the sample format
    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the buffer capacity in frames
    pub fn with_buffer_capacity(mut self, frames: u32) -> Self {
        self.buffer_capacity_frames = Some(frames);
        self
    }

    /// Set the sink position counter width
    pub fn with_position_width(mut self, bits: u32) -> Self {
        self.position_width_bits = bits;
        self
    }

    /// Reject values no sink could honor
    pub fn validate(&self) -> Result<()> {
        if !(1..=32).contains(&self.position_width_bits) {
            return Err(TrackStreamError::Config(format!(
                "position width must be 1..=32 bits, got {}",
                self.position_width_bits
            )));
        }
        if self.sample_rate == Some(0) {
            return Err(TrackStreamError::Config("sample rate must be non-zero".into()));
        }
        if self.channel_count == Some(0) {
            return Err(TrackStreamError::Config(
                "channel count must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Concrete parameters for the sink factory
    pub fn sink_params(&self) -> SinkParams {
        SinkParams {
            sample_rate: self.sample_rate.unwrap_or(0),
            channel_count: self.channel_count.unwrap_or(DEFAULT_CHANNEL_COUNT),
            format: self.format.unwrap_or(DEFAULT_SAMPLE_FORMAT),
            buffer_capacity_frames: self.buffer_capacity_frames.unwrap_or(0),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            sample_rate: None,
            channel_count: None,
            format: None,
            buffer_capacity_frames: None,
            position_width_bits: DEFAULT_POSITION_WIDTH_BITS,
        }
    }
}
