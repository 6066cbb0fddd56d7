//! Frame rate gating and timecode stamping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rational frame rate, e.g. 30/1 or 30000/1001
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator.max(1) as f64
    }

    /// Whole frames per second used for the frame field of a timecode
    fn frames_per_timecode_second(&self) -> u64 {
        (self.as_f64().round() as u64).max(1)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(30, 1)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{} fps", self.numerator)
        } else {
            write!(f, "{}/{} fps", self.numerator, self.denominator)
        }
    }
}

/// Non-drop-frame SMPTE style timecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

impl Timecode {
    /// Timecode of `seconds` at `rate`, wrapping every 24 hours
    pub fn from_seconds(seconds: f64, rate: FrameRate) -> Self {
        let fps = rate.frames_per_timecode_second();
        let total_frames = (seconds.max(0.0) * rate.as_f64()).floor() as u64;
        let total_frames = total_frames % (fps * SECONDS_PER_DAY);
        let frames = total_frames % fps;
        let total_seconds = total_frames / fps;
        Self {
            hours: (total_seconds / 3600) as u32,
            minutes: ((total_seconds / 60) % 60) as u32,
            seconds: (total_seconds % 60) as u32,
            frames: frames as u32,
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Timecode qualified by the rate it was computed at
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneTime {
    pub timecode: Timecode,
    pub rate: FrameRate,
}

impl SceneTime {
    pub fn at(seconds: f64, rate: FrameRate) -> Self {
        Self {
            timecode: Timecode::from_seconds(seconds, rate),
            rate,
        }
    }
}

/// Wall clock in seconds
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Enforces a minimum spacing of one frame interval between accepted samples
#[derive(Debug, Clone)]
pub struct RateGate {
    rate: FrameRate,
    second_rate: f64,
    last_accepted_seconds: f64,
}

impl RateGate {
    pub fn new(rate: FrameRate) -> Self {
        Self {
            rate,
            // the interval is taken from the numerator alone
            second_rate: 1.0 / rate.numerator.max(1) as f64,
            last_accepted_seconds: 0.0,
        }
    }

    pub fn rate(&self) -> FrameRate {
        self.rate
    }

    pub fn should_skip(&mut self, now_seconds: f64) -> bool {
        if now_seconds < self.last_accepted_seconds + self.second_rate {
            return true;
        }
        self.last_accepted_seconds = now_seconds;
        false
    }

    /// Scene time for an accepted sample, `None` when the sample is gated
    pub fn admit(&mut self, now_seconds: f64) -> Option<SceneTime> {
        if self.should_skip(now_seconds) {
            None
        } else {
            Some(SceneTime::at(now_seconds, self.rate))
        }
    }
}
