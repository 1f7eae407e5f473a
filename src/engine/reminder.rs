//! Per-tick reminder decisions
//!
//! Pure functions: given a timer's reminder configuration and where the tick
//! landed, decide which reminders fire, whether the final-warning window
//! applies, and whether a lingering reminder flash may be cleared. The driver
//! turns the decision into scheduled side effects.

use crate::state::{ReminderConfig, ReminderEffects};

/// Where a tick landed within the current item
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Seconds left after this tick's decrement; always positive here
    pub remaining: u64,
    /// Seconds since the item started
    pub elapsed: u64,
    pub beep_at: u64,
    /// Reminders of the current timer; pauses have none
    pub reminders: Option<&'a ReminderConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderSource {
    Custom(usize),
    Every,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderFire<'a> {
    pub source: ReminderSource,
    pub effects: &'a ReminderEffects,
    /// Seconds the effects stay active
    pub duration: u64,
}

/// Final-warning behaviour for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalAction {
    /// Outside the warning window
    None,
    /// Just reached the threshold: switch to critical flashing and beep
    Enter,
    /// Inside the window: beep
    Beep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickDecision<'a> {
    pub fired: Vec<ReminderFire<'a>>,
    pub critical: CriticalAction,
    /// No reminder window covers this tick and no warning applies, so a
    /// non-critical flash may stop
    pub clear_flash: bool,
}

impl TickDecision<'_> {
    pub fn in_critical_window(&self) -> bool {
        self.critical != CriticalAction::None
    }
}

/// `0 < remaining <= beep_at`
pub fn in_critical_window(beep_at: u64, remaining: u64) -> bool {
    beep_at > 0 && remaining > 0 && remaining <= beep_at
}

/// The final alert at zero only sounds when a warning threshold is set
pub fn final_alert(beep_at: u64) -> bool {
    beep_at > 0
}

/// A custom reminder's effects cover `(offset - duration, offset]`
pub fn custom_window_active(offset: u64, duration: u64, remaining: u64) -> bool {
    remaining <= offset && (remaining as i128) > offset as i128 - duration as i128
}

/// An "every" reminder's effects cover the first `duration` seconds of each period
pub fn every_window_active(period: u64, duration: u64, elapsed: u64) -> bool {
    period > 0 && elapsed > 0 && elapsed % period < duration
}

/// Whether any reminder's effect window covers this tick
pub fn any_window_active(config: &ReminderConfig, remaining: u64, elapsed: u64) -> bool {
    let duration = config.duration;
    config
        .custom
        .iter()
        .any(|c| custom_window_active(c.trigger_offset(), duration, remaining))
        || every_window_active(config.every.period(), duration, elapsed)
}

/// Reminders that trigger exactly on this tick
pub fn fired_reminders(config: &ReminderConfig, remaining: u64, elapsed: u64) -> Vec<ReminderFire<'_>> {
    let mut fired: Vec<ReminderFire<'_>> = config
        .custom
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            let offset = c.trigger_offset();
            offset > 0 && remaining == offset
        })
        .map(|(i, c)| ReminderFire {
            source: ReminderSource::Custom(i),
            effects: &c.effects,
            duration: config.duration,
        })
        .collect();

    let period = config.every.period();
    if period > 0 && elapsed > 0 && remaining > 0 && elapsed % period == 0 {
        fired.push(ReminderFire {
            source: ReminderSource::Every,
            effects: &config.every.effects,
            duration: config.duration,
        });
    }
    fired
}

pub fn evaluate<'a>(ctx: &TickContext<'a>) -> TickDecision<'a> {
    let fired = ctx
        .reminders
        .map(|config| fired_reminders(config, ctx.remaining, ctx.elapsed))
        .unwrap_or_default();

    let critical = if in_critical_window(ctx.beep_at, ctx.remaining) {
        if ctx.remaining == ctx.beep_at {
            CriticalAction::Enter
        } else {
            CriticalAction::Beep
        }
    } else {
        CriticalAction::None
    };

    let clear_flash = critical == CriticalAction::None
        && ctx
            .reminders
            .is_some_and(|config| !any_window_active(config, ctx.remaining, ctx.elapsed));

    TickDecision {
        fired,
        critical,
        clear_flash,
    }
}
