//! Timer sequencing engine
//!
//! The engine is a single-owner state machine. Commands from the outside and
//! wakeups from the clock are fed to it one at a time through [`EngineEvent`]s,
//! so every transition runs to completion before the next one starts.

pub mod clock;
pub mod command;
pub mod driver;
pub mod effects;
pub mod reminder;
pub mod sequence;

use tokio::sync::oneshot;

use crate::state::Session;

pub use clock::{CancelToken, Clock, ManualClock, TokioClock, Wakeup};
pub use command::{Command, CommandError};
pub use driver::Engine;
pub use sequence::{build_sequence, build_single, ItemKind, ItemRef, SequenceItem};

/// How long the completion indicator stays up after a run finishes
pub const COMPLETION_DISPLAY_MS: u64 = 5000;

/// Interval between ticks
pub const TICK_MS: u64 = 1000;

/// How long the flash accompanying the final alert lasts
pub const FINAL_FLASH_MS: u64 = 1200;

/// Spacing of the beeps announcing a scheduled start
pub const SCHEDULED_START_BEEP_MS: u64 = 300;

/// Everything the engine reacts to
pub enum EngineEvent {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Session, CommandError>>,
    },
    Wakeup {
        token: CancelToken,
        wakeup: Wakeup,
    },
    /// Save and stop processing
    Shutdown { done: oneshot::Sender<()> },
}
