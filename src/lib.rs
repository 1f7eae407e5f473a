//! Countdown Sequencer - serial/parallel countdown timers with reminders
//!
//! This library provides the countdown engine (sequencing, reminders,
//! final-warning alerts, scheduled starts), session persistence with
//! elapsed-time correction, and an HTTP surface to drive it.

pub mod api;
pub mod config;
pub mod engine;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use engine::{Command, Engine};
pub use state::{AppState, Session};
pub use utils::signals::shutdown_signal;
