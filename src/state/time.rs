//! Hours/minutes/seconds durations and their conversion to plain seconds

use serde::{Deserialize, Serialize};

/// A wall-clock style duration as entered by the user.
///
/// Stored values are always normalised: `minutes` and `seconds` are in
/// `[0, 59]`, `hours` is at most [`MAX_HOURS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hms {
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}

/// Longest duration a timer or pause may be set to, in hours
pub const MAX_HOURS: u64 = 9999;

/// Which field of an [`Hms`] an adjustment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    Minutes,
    Seconds,
}

impl Hms {
    pub fn new(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self { hours, minutes, seconds }
    }

    /// Total length in seconds
    pub fn to_seconds(&self) -> u64 {
        self.hours
            .saturating_mul(3600)
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds)
    }

    /// Split a number of seconds back into hours, minutes and seconds
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    /// Clamp minutes and seconds into `[0, 59]` and hours to [`MAX_HOURS`]
    pub fn normalized(self) -> Self {
        Self {
            hours: self.hours.min(MAX_HOURS),
            minutes: self.minutes.min(59),
            seconds: self.seconds.min(59),
        }
    }

    /// Build from raw, possibly negative user input, clamping each field
    pub fn clamped(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours: hours.clamp(0, MAX_HOURS as i64) as u64,
            minutes: minutes.clamp(0, 59) as u64,
            seconds: seconds.clamp(0, 59) as u64,
        }
    }

    /// Nudge one field by `delta`, clamping the result
    pub fn adjusted(self, unit: TimeUnit, delta: i64) -> Self {
        let (h, m, s) = (self.hours as i64, self.minutes as i64, self.seconds as i64);
        match unit {
            TimeUnit::Hours => Self::clamped(h.saturating_add(delta), m, s),
            TimeUnit::Minutes => Self::clamped(h, m.saturating_add(delta), s),
            TimeUnit::Seconds => Self::clamped(h, m, s.saturating_add(delta)),
        }
    }
}

/// Format remaining seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_remaining(total: u64) -> String {
    let hms = Hms::from_seconds(total);
    if hms.hours > 0 {
        format!("{}:{:02}:{:02}", hms.hours, hms.minutes, hms.seconds)
    } else {
        format!("{}:{:02}", hms.minutes, hms.seconds)
    }
}
