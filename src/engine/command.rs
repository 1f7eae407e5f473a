//! Operations accepted by the engine

use chrono::NaiveTime;
use serde::Deserialize;
use thiserror::Error;

use super::sequence::ItemRef;
use crate::state::{
    Direction, Hms, Mode, ReminderConfig, SoundChoice, TimeUnit, VisibilitySettings,
};

#[derive(Debug, Clone)]
pub enum Command {
    /// Start from idle, or resume if paused
    Start { countdown: usize },
    /// Start, pause or resume depending on the current phase
    Toggle { countdown: usize },
    Pause { countdown: usize },
    Resume { countdown: usize },
    /// Stop and return to idle
    Reset { countdown: usize },
    /// Arm or disarm a start at a local time of day
    Schedule { countdown: usize, at: Option<NaiveTime> },
    AddTimer,
    RemoveTimer { index: usize },
    SetDuration { item: ItemRef, duration: Hms },
    AdjustTime { item: ItemRef, unit: TimeUnit, delta: i64 },
    SetAppearance { item: ItemRef, appearance: Appearance },
    SetBeepAt { item: ItemRef, beep_at: u64 },
    SetName { index: usize, name: String },
    SetReminders { index: usize, reminders: ReminderConfig },
    SetTimerSound { index: usize, sound: Option<SoundChoice> },
    /// Merge any of enabled, sound and volume into the global settings
    UpdateSound(SoundUpdate),
    SetSoundEnabled(bool),
    SetVisibility(VisibilitySettings),
    SetMode(Mode),
    /// Forget the saved session and start over with defaults
    ClearSavedState,
    /// Read-only: return the current session
    Snapshot,
}

impl Command {
    /// Whether the command leaves the session untouched
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::Snapshot)
    }
}

/// Partial update of colour, opacity and fill direction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Appearance {
    pub color: Option<String>,
    pub alpha: Option<f64>,
    pub direction: Option<Direction>,
}

/// Partial update of the global sound settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoundUpdate {
    pub enabled: Option<bool>,
    pub sound: Option<SoundChoice>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no countdown with id {0}")]
    UnknownCountdown(usize),

    #[error("no timer at index {0}")]
    UnknownTimer(usize),
}
