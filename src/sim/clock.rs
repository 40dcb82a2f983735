//! Wall-clock helpers: decimal hours, wrapping clock windows, and sample cadence.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Cadence assumed when a series is too short to infer one.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 5;

/// Length of the maximum-demand averaging window.
pub const MD_WINDOW_MINUTES: f64 = 30.0;

/// Hour of day as a decimal, e.g. `14:30:00` → `14.5`.
pub fn decimal_hour(at: NaiveDateTime) -> f64 {
    f64::from(at.hour()) + f64::from(at.minute()) / 60.0 + f64::from(at.second()) / 3600.0
}

/// Forward distance in hours from `from` to `to` on a 24-hour clock.
pub fn hours_until(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(24.0)
}

/// Wraps an arbitrary hour value onto `[0, 24)`.
pub fn wrap_hour(hour: f64) -> f64 {
    hour.rem_euclid(24.0)
}

/// A daily clock window `[start_hour, end_hour)`.
///
/// `start_hour > end_hour` means the window spans midnight. A window whose
/// start equals its end is empty and never active.
///
/// # Examples
///
/// ```
/// use bess_sim::sim::clock::ClockWindow;
///
/// let night = ClockWindow::new(22.0, 6.0);
/// assert!(night.contains_hour(23.5));
/// assert!(night.contains_hour(2.0));
/// assert!(!night.contains_hour(6.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockWindow {
    #[serde(deserialize_with = "deserialize_hour")]
    pub start_hour: f64,
    #[serde(deserialize_with = "deserialize_hour")]
    pub end_hour: f64,
}

impl ClockWindow {
    pub const fn new(start_hour: f64, end_hour: f64) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Copy of this window with both bounds wrapped onto `[0, 24)`.
    pub fn normalized(self) -> Self {
        Self::new(wrap_hour(self.start_hour), wrap_hour(self.end_hour))
    }

    pub fn is_empty(&self) -> bool {
        (wrap_hour(self.start_hour) - wrap_hour(self.end_hour)).abs() < 1e-6
    }

    /// Window length in hours (0 for an empty window).
    pub fn duration_hours(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            hours_until(self.start_hour, self.end_hour)
        }
    }

    /// Whether a decimal hour falls inside the window; the end is exclusive.
    pub fn contains_hour(&self, hour: f64) -> bool {
        if self.is_empty() {
            return false;
        }
        let Self {
            start_hour: start,
            end_hour: end,
        } = self.normalized();
        if start <= end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.contains_hour(decimal_hour(at))
    }
}

impl fmt::Display for ClockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_hour(self.start_hour), format_hour(self.end_hour))
    }
}

/// Formats a decimal hour as `HH:MM`.
pub fn format_hour(hour: f64) -> String {
    let total_minutes = (wrap_hour(hour) * 60.0).round() as i64;
    format!("{:02}:{:02}", (total_minutes / 60) % 24, total_minutes % 60)
}

/// Parses `HH:MM` into a decimal hour.
pub fn parse_hour(s: &str) -> Option<f64> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 24 || m >= 60 || (h == 24 && m > 0) {
        return None;
    }
    Some(f64::from(h) + f64::from(m) / 60.0)
}

fn deserialize_hour<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct HourVisitor;

    impl Visitor<'_> for HourVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal hour or an \"HH:MM\" string")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<f64, E> {
            parse_hour(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(HourVisitor)
}

/// Uniform sampling interval of a load series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval: TimeDelta,
}

impl Cadence {
    pub fn from_minutes(minutes: i64) -> Self {
        Self {
            interval: TimeDelta::minutes(minutes.max(1)),
        }
    }

    /// Infers the cadence from sorted, de-duplicated timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonUniformCadence`] at the first gap that differs
    /// from the spacing of the first two samples.
    pub fn infer(timestamps: &[NaiveDateTime]) -> Result<Self> {
        let [first, second, ..] = timestamps else {
            return Ok(Self::from_minutes(DEFAULT_INTERVAL_MINUTES));
        };
        let interval = *second - *first;
        if interval <= TimeDelta::zero() {
            return Err(Error::NonUniformCadence {
                at: *second,
                expected_minutes: DEFAULT_INTERVAL_MINUTES,
                found_minutes: interval.num_minutes(),
            });
        }
        for pair in timestamps.windows(2) {
            let gap = pair[1] - pair[0];
            if gap != interval {
                return Err(Error::NonUniformCadence {
                    at: pair[1],
                    expected_minutes: interval.num_minutes(),
                    found_minutes: gap.num_minutes(),
                });
            }
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn minutes(&self) -> f64 {
        self.interval.num_seconds() as f64 / 60.0
    }

    pub fn hours(&self) -> f64 {
        self.minutes() / 60.0
    }

    /// Number of samples spanning the 30-minute demand window.
    pub fn md_window_len(&self) -> usize {
        ((MD_WINDOW_MINUTES / self.minutes()).round() as usize).max(1)
    }
}
