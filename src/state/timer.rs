//! Timer, pause and reminder configuration

use serde::{Deserialize, Serialize};

use super::time::Hms;

/// Palette used for newly added timers, indexed by position
const TIMER_COLORS: [&str; 4] = ["#3498db", "#e67e22", "#2ecc71", "#9b59b6"];

/// Allowed final-warning thresholds, highest first
const BEEP_AT_STEPS: [u64; 3] = [10, 5, 0];

/// Progress bar fill direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Right,
}

/// Fields shared by timers and pauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    #[serde(flatten)]
    pub duration: Hms,
    pub color: String,
    pub alpha: f64,
    #[serde(default)]
    pub direction: Direction,
    /// Seconds before the end during which a beep fires every tick (0 disables)
    #[serde(default)]
    pub beep_at: u64,
}

impl Interval {
    pub fn total_seconds(&self) -> u64 {
        self.duration.to_seconds()
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 };
    }

    /// Snap an arbitrary threshold down to 0, 5 or 10
    pub fn set_beep_at(&mut self, beep_at: u64) {
        self.beep_at = BEEP_AT_STEPS
            .iter()
            .copied()
            .find(|step| beep_at >= *step)
            .unwrap_or(0);
    }
}

/// One configured countdown interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    #[serde(flatten)]
    pub interval: Interval,
    pub name: String,
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// Per-timer sound override; `None` uses the global setting
    #[serde(default)]
    pub sound: Option<SoundChoice>,
}

impl Timer {
    /// Default timer for position `index` in the list
    pub fn new(index: usize) -> Self {
        Self {
            interval: Interval {
                duration: Hms::default(),
                color: TIMER_COLORS.get(index).unwrap_or(&TIMER_COLORS[0]).to_string(),
                alpha: 0.8,
                direction: Direction::Right,
                beep_at: 5,
            },
            name: default_timer_name(index),
            reminders: ReminderConfig::default(),
            sound: None,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.interval.total_seconds()
    }

    pub fn set_name(&mut self, index: usize, name: &str) {
        let trimmed = name.trim();
        self.name = if trimmed.is_empty() {
            default_timer_name(index)
        } else {
            trimmed.to_string()
        };
    }
}

pub fn default_timer_name(index: usize) -> String {
    format!("Timer {}", index + 1)
}

/// Gap inserted after a timer in serial mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pause {
    #[serde(flatten)]
    pub interval: Interval,
}

impl Default for Pause {
    fn default() -> Self {
        Self {
            interval: Interval {
                duration: Hms::default(),
                color: "#95a5a6".to_string(),
                alpha: 0.8,
                direction: Direction::Right,
                beep_at: 0,
            },
        }
    }
}

impl Pause {
    pub fn total_seconds(&self) -> u64 {
        self.interval.total_seconds()
    }
}

/// Side effects shared by every reminder kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEffects {
    #[serde(default = "enabled")]
    pub flash: bool,
    #[serde(default = "enabled")]
    pub sound: bool,
    #[serde(default)]
    pub message: bool,
    #[serde(default)]
    pub message_text: String,
}

fn enabled() -> bool {
    true
}

impl Default for ReminderEffects {
    fn default() -> Self {
        Self {
            flash: true,
            sound: true,
            message: false,
            message_text: String::new(),
        }
    }
}

impl ReminderEffects {
    /// Message to show, if messaging is enabled and there is text
    pub fn message_text(&self) -> Option<&str> {
        (self.message && !self.message_text.is_empty()).then_some(self.message_text.as_str())
    }
}

/// Reminder firing a fixed time before the timer ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomReminder {
    #[serde(flatten)]
    pub before_end: Hms,
    #[serde(flatten)]
    pub effects: ReminderEffects,
}

impl CustomReminder {
    pub fn trigger_offset(&self) -> u64 {
        self.before_end.to_seconds()
    }
}

/// Reminder firing every N seconds of elapsed time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveryReminder {
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
    #[serde(flatten)]
    pub effects: ReminderEffects,
}

impl EveryReminder {
    pub fn period(&self) -> u64 {
        self.minutes.saturating_mul(60).saturating_add(self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub custom: Vec<CustomReminder>,
    #[serde(default)]
    pub every: EveryReminder,
    /// Seconds a reminder's flash/beep/message stays active
    #[serde(default = "default_reminder_duration")]
    pub duration: u64,
}

fn default_reminder_duration() -> u64 {
    5
}

/// Longest a reminder's effects may stay active, in seconds
pub const MAX_REMINDER_DURATION: u64 = 600;

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            custom: Vec::new(),
            every: EveryReminder::default(),
            duration: default_reminder_duration(),
        }
    }
}

impl ReminderConfig {
    /// Clamp user-supplied values into their valid ranges
    pub fn normalized(mut self) -> Self {
        self.duration = self.duration.clamp(1, MAX_REMINDER_DURATION);
        self.every.seconds = self.every.seconds.min(59);
        for custom in &mut self.custom {
            custom.before_end = custom.before_end.normalized();
        }
        self
    }
}

/// Sound played for beeps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundChoice {
    #[default]
    DoubleBeep,
    Alarm,
    /// A bundled sample, by file stem
    Sample(String),
}
