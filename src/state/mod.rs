//! State management module
//!
//! This module contains the persisted session model and the shared
//! application state handed to HTTP handlers.

pub mod app_state;
pub mod session;
pub mod time;
pub mod timer;

// Re-export main types
pub use app_state::{AppState, DispatchError};
pub use session::{Countdown, Mode, Phase, Session, SoundSettings, VisibilitySettings};
pub use time::{format_remaining, Hms, TimeUnit};
pub use timer::{
    CustomReminder, Direction, EveryReminder, Interval, Pause, ReminderConfig, ReminderEffects,
    SoundChoice, Timer,
};
