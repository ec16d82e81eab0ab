//! Presentation Timestamps
//!
//! A sink reports when a given frame was presented, measured at several
//! stages of its pipeline and against more than one clock base. Callers ask
//! for a single (frame, time) pair in the clock they use; the translator maps
//! that clock to a sink timebase and picks the most trustworthy sample.

use crate::{Result, TrackStreamError};
use std::fmt;

/// Clock a caller wants timestamps expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockId {
    /// Wall clock (may jump)
    Realtime,
    /// Monotonic clock, stops while suspended
    Monotonic,
    /// Monotonic clock without frequency adjustment
    MonotonicRaw,
    /// Monotonic clock that keeps counting while suspended
    BootTime,
}

impl ClockId {
    /// Map a POSIX `clockid_t` value
    pub fn from_raw(clock_id: i32) -> Option<Self> {
        match clock_id {
            0 => Some(ClockId::Realtime),
            1 => Some(ClockId::Monotonic),
            4 => Some(ClockId::MonotonicRaw),
            7 => Some(ClockId::BootTime),
            _ => None,
        }
    }
}

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClockId::Realtime => "CLOCK_REALTIME",
            ClockId::Monotonic => "CLOCK_MONOTONIC",
            ClockId::MonotonicRaw => "CLOCK_MONOTONIC_RAW",
            ClockId::BootTime => "CLOCK_BOOTTIME",
        };
        f.write_str(name)
    }
}

/// Clock bases a sink can report in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timebase {
    /// Same epoch as [`ClockId::Monotonic`]
    Monotonic,
    /// Same epoch as [`ClockId::BootTime`]
    BootTime,
}

/// Pipeline stage a timestamp was taken at, ordered by distance from the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimestampLocation {
    /// Client side, when data was handed over
    Client,
    /// Mixer / audio server
    Server,
    /// Driver, closest to the DAC
    Kernel,
}

/// One (frame, time) observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampSample {
    /// Clock base of `time_nanos`
    pub timebase: Timebase,
    /// Where in the pipeline the observation was made
    pub location: TimestampLocation,
    /// Frame presented at `time_nanos`
    pub position: i64,
    /// Presentation time; zero or negative means not yet valid
    pub time_nanos: i64,
}

impl TimestampSample {
    /// A sample with a positive time
    pub fn is_valid(&self) -> bool {
        self.time_nanos > 0
    }
}

/// Set of timestamps a sink reports in one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedTimestamp {
    samples: Vec<TimestampSample>,
}

impl ExtendedTimestamp {
    /// Empty set (nothing presented yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observation
    pub fn push(&mut self, sample: TimestampSample) {
        self.samples.push(sample);
    }

    /// Builder form of [`ExtendedTimestamp::push`]
    pub fn with_sample(
        mut self,
        timebase: Timebase,
        location: TimestampLocation,
        position: i64,
        time_nanos: i64,
    ) -> Self {
        self.push(TimestampSample {
            timebase,
            location,
            position,
            time_nanos,
        });
        self
    }

    /// All observations
    pub fn samples(&self) -> &[TimestampSample] {
        &self.samples
    }

    /// Best observation for `timebase`
    ///
    /// Invalid samples are skipped. Among the rest the one closest to the
    /// hardware wins, then the most recent.
    pub fn best(&self, timebase: Timebase) -> Option<TimestampSample> {
        self.samples
            .iter()
            .filter(|s| s.timebase == timebase && s.is_valid())
            .max_by_key(|s| (s.location, s.time_nanos))
            .copied()
    }
}

/// Frame position paired with its presentation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimestamp {
    /// Frame index
    pub frame_position: i64,
    /// Time in the requested clock
    pub time_nanos: i64,
}

/// Maps caller clocks onto sink timebases
pub struct TimestampTranslator;

impl TimestampTranslator {
    /// Sink timebase for a caller clock
    pub fn timebase_for(clock: ClockId) -> Result<Timebase> {
        match clock {
            ClockId::Monotonic => Ok(Timebase::Monotonic),
            ClockId::BootTime => Ok(Timebase::BootTime),
            ClockId::Realtime | ClockId::MonotonicRaw => {
                log::error!("timestamp requested for unsupported clock {clock}");
                Err(TrackStreamError::UnsupportedClock(clock))
            }
        }
    }

    /// Select the best sample of `extended` for `clock`
    pub fn translate(clock: ClockId, extended: &ExtendedTimestamp) -> Result<FrameTimestamp> {
        let timebase = Self::timebase_for(clock)?;
        let sample = extended.best(timebase).ok_or(TrackStreamError::NoTimestamp)?;
        Ok(FrameTimestamp {
            frame_position: sample.position,
            time_nanos: sample.time_nanos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TimestampLocation::*;

    fn sample_set() -> ExtendedTimestamp {
        ExtendedTimestamp::new()
            .with_sample(Timebase::Monotonic, Server, 960, 2_000_000)
            .with_sample(Timebase::Monotonic, Kernel, 900, 1_900_000)
            .with_sample(Timebase::BootTime, Server, 960, 5_000_000)
            .with_sample(Timebase::BootTime, Kernel, 1_000, 0)
    }

    #[test]
    fn test_prefers_kernel_location() {
        let ts = TimestampTranslator::translate(ClockId::Monotonic, &sample_set()).unwrap();
        assert_eq!(ts.frame_position, 900);
        assert_eq!(ts.time_nanos, 1_900_000);
    }

    #[test]
    fn test_skips_invalid_samples() {
        // kernel boottime sample has no time yet
        let ts = TimestampTranslator::translate(ClockId::BootTime, &sample_set()).unwrap();
        assert_eq!(ts.frame_position, 960);
        assert_eq!(ts.time_nanos, 5_000_000);
    }

    #[test]
    fn test_most_recent_breaks_ties() {
        let set = ExtendedTimestamp::new()
            .with_sample(Timebase::Monotonic, Server, 100, 10)
            .with_sample(Timebase::Monotonic, Server, 200, 20);
        assert_eq!(set.best(Timebase::Monotonic).unwrap().position, 200);
    }

    #[test]
    fn test_unsupported_clock() {
        for clock in [ClockId::Realtime, ClockId::MonotonicRaw] {
            let err = TimestampTranslator::translate(clock, &sample_set()).unwrap_err();
            assert!(matches!(err, TrackStreamError::UnsupportedClock(c) if c == clock));
        }
    }

    #[test]
    fn test_empty_timestamp() {
        let err =
            TimestampTranslator::translate(ClockId::Monotonic, &ExtendedTimestamp::new())
                .unwrap_err();
        assert!(matches!(err, TrackStreamError::NoTimestamp));
    }

    #[test]
    fn test_clock_from_raw() {
        assert_eq!(ClockId::from_raw(1), Some(ClockId::Monotonic));
        assert_eq!(ClockId::from_raw(7), Some(ClockId::BootTime));
        assert_eq!(ClockId::from_raw(42), None);
    }
}
