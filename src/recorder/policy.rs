//! Rotation windows.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Unit of the rotation interval.
///
/// Single-letter aliases (`S`, `M`, `H`, `D`) are accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationUnit {
    /// Seconds
    #[serde(alias = "S", alias = "s")]
    Seconds,
    /// Minutes
    #[serde(alias = "M", alias = "m")]
    Minutes,
    /// Hours
    #[serde(alias = "H", alias = "h")]
    Hours,
    /// Days
    #[serde(alias = "D", alias = "d")]
    Days,
}

impl RotationUnit {
    fn seconds(self) -> i64 {
        match self {
            RotationUnit::Seconds => 1,
            RotationUnit::Minutes => 60,
            RotationUnit::Hours => 3_600,
            RotationUnit::Days => 86_400,
        }
    }
}

/// Where a new window starts when a segment is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowAlignment {
    /// The window starts at the instant the segment is opened.
    #[default]
    Arrival,
    /// The window starts at the last multiple of the interval since the Unix
    /// epoch, so hourly segments start on the hour.
    Aligned,
}

/// Window length and alignment of the rotating recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Interval unit
    #[serde(default = "default_unit")]
    pub unit: RotationUnit,
    /// Number of units per window, at least 1
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Window-start computation
    #[serde(default)]
    pub alignment: WindowAlignment,
}

fn default_unit() -> RotationUnit {
    RotationUnit::Hours
}

fn default_interval() -> u32 {
    1
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            interval: default_interval(),
            alignment: WindowAlignment::default(),
        }
    }
}

impl RotationPolicy {
    /// Window of `interval` units starting on arrival.
    pub fn new(unit: RotationUnit, interval: u32) -> Self {
        Self {
            unit,
            interval,
            alignment: WindowAlignment::Arrival,
        }
    }

    /// Same window length, aligned on interval multiples.
    pub fn aligned(mut self) -> Self {
        self.alignment = WindowAlignment::Aligned;
        self
    }

    /// Length of one window. Never shorter than one second.
    pub fn length(&self) -> TimeDelta {
        TimeDelta::seconds(self.unit.seconds() * i64::from(self.interval.max(1)))
    }

    /// Window-start for a segment opened at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.alignment {
            WindowAlignment::Arrival => now,
            WindowAlignment::Aligned => {
                let length = self.length().num_seconds();
                let secs = now.timestamp();
                DateTime::from_timestamp(secs - secs.rem_euclid(length), 0).unwrap_or(now)
            }
        }
    }

    /// First instant that belongs to the next window. A window reaching past
    /// the representable range never ends.
    pub fn boundary(&self, window_start: DateTime<Utc>) -> DateTime<Utc> {
        window_start
            .checked_add_signed(self.length())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether a line arriving at `now` must go to a new segment.
    pub fn is_due(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= self.boundary(window_start)
    }
}
