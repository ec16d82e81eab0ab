//! Frame Position Tracking
//!
//! Sinks report their playback head as a narrow counter (32 bits or fewer)
//! that wraps around and is reset to zero by a flush or stop. The tracker
//! widens those readings into a 64-bit frame count that only ever moves
//! forward, except where [`FramePositionTracker::advance`] is used to fold
//! frames in across a reset.

/// Default width of a sink position counter in bits
pub const DEFAULT_POSITION_WIDTH_BITS: u32 = 32;

/// Widens a wraparound-prone hardware position into a monotonic frame count
///
/// `frames() = wraparound_count * 2^W + baseline + accumulated_offset`
///
/// Each reading is compared with the baseline modulo `2^W`. A step of less
/// than half the counter range is forward progress, and crossing zero on the
/// way counts as a wraparound. A larger step can only be a stale reading from
/// a racing position query, so it is ignored. The very first reading is
/// taken as-is, wherever the hardware counter happens to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePositionTracker {
    /// Last accepted raw position
    baseline: u32,
    /// Number of times the raw counter wrapped since the last reset
    wraparound_count: u64,
    /// Frames folded in across resets
    accumulated_offset: u64,
    /// Counter width in bits (1..=32)
    width_bits: u32,
    /// False until the first reading
    primed: bool,
}

impl FramePositionTracker {
    /// Create a tracker for a 32-bit counter
    pub fn new() -> Self {
        FramePositionTracker {
            baseline: 0,
            wraparound_count: 0,
            accumulated_offset: 0,
            width_bits: DEFAULT_POSITION_WIDTH_BITS,
            primed: false,
        }
    }

    /// Create a tracker for a counter of `width_bits` bits
    ///
    /// Returns `None` unless `1 <= width_bits <= 32`.
    pub fn with_width(width_bits: u32) -> Option<Self> {
        if !(1..=32).contains(&width_bits) {
            return None;
        }
        Some(FramePositionTracker {
            width_bits,
            ..Self::new()
        })
    }

    /// Counter width in bits
    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    /// Number of distinct raw values (`2^W`)
    pub fn range(&self) -> u64 {
        1u64 << self.width_bits
    }

    fn mask(&self) -> u64 {
        self.range() - 1
    }

    /// Fold a new raw reading into the count and return the updated value
    pub fn update_from_raw(&mut self, raw: u32) -> u64 {
        let raw = (raw as u64 & self.mask()) as u32;
        if !self.primed {
            self.primed = true;
            self.baseline = raw;
            return self.frames();
        }
        let step = (raw as u64).wrapping_sub(self.baseline as u64) & self.mask();
        let half = self.range() / 2;
        // a drop of exactly half the range stays jitter
        if step < half || (step == half && raw > self.baseline) {
            if raw < self.baseline {
                self.wraparound_count += 1;
            }
            self.baseline = raw;
        } else if step != 0 {
            log::warn!(
                "ignoring stale position reading: {} -> {}",
                self.baseline,
                raw
            );
        }
        self.frames()
    }

    /// Monotonic frame count
    pub fn frames(&self) -> u64 {
        self.wraparound_count * self.range() + self.baseline as u64 + self.accumulated_offset
    }

    /// Last accepted raw position
    pub fn baseline(&self) -> u32 {
        self.baseline
    }

    /// Number of wraparounds since the last baseline reset
    pub fn wraparound_count(&self) -> u64 {
        self.wraparound_count
    }

    /// Add frames that the sink will never report (e.g. discarded by a flush)
    pub fn advance(&mut self, frames: u64) {
        self.accumulated_offset += frames;
    }

    /// Prepare for the sink counter restarting at zero
    ///
    /// The frame count is preserved; only the raw reference point moves.
    pub fn reset_baseline(&mut self) {
        self.accumulated_offset += self.wraparound_count * self.range() + self.baseline as u64;
        self.wraparound_count = 0;
        self.baseline = 0;
        self.primed = true;
    }
}

impl Default for FramePositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
