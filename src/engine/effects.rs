//! Registry of in-flight reminder side effects
//!
//! Every delayed beep, flash stop or message hide is scheduled through the
//! clock and recorded here under its token. Pausing, stopping or resetting a
//! countdown cancels all of its entries in one go, and a wakeup whose token is
//! no longer registered is treated as stale.

use std::collections::HashMap;

use tracing::debug;

use super::clock::{CancelToken, Clock, Wakeup};
use crate::state::SoundChoice;

#[derive(Debug, Clone, PartialEq)]
pub enum EffectAction {
    /// Play a beep if the countdown is still ticking and sound is on
    Beep { sound: SoundChoice },
    /// End of a reminder's flash window
    ReminderFlashEnd,
    /// End of the flash that accompanies the final alert
    FinalFlashEnd,
    /// Hide a reminder message
    MessageHide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub countdown: usize,
    pub action: EffectAction,
}

#[derive(Debug, Default)]
pub struct ActiveEffects {
    entries: HashMap<CancelToken, Effect>,
}

impl ActiveEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` for `countdown` after `delay_ms`
    pub fn schedule<C: Clock>(
        &mut self,
        clock: &mut C,
        delay_ms: u64,
        countdown: usize,
        action: EffectAction,
    ) -> CancelToken {
        let token = clock.schedule_after(delay_ms, Wakeup::Effect);
        self.entries.insert(token, Effect { countdown, action });
        token
    }

    /// Claim a fired effect. Returns `None` when it was already claimed or cancelled.
    pub fn take(&mut self, token: CancelToken) -> Option<Effect> {
        self.entries.remove(&token)
    }

    /// Cancel every pending effect of one countdown
    pub fn cancel_for<C: Clock>(&mut self, clock: &mut C, countdown: usize) -> usize {
        let tokens: Vec<CancelToken> = self
            .entries
            .iter()
            .filter(|(_, effect)| effect.countdown == countdown)
            .map(|(token, _)| *token)
            .collect();
        for token in &tokens {
            clock.cancel(*token);
            self.entries.remove(token);
        }
        if !tokens.is_empty() {
            debug!("Cancelled {} pending effects for countdown {}", tokens.len(), countdown);
        }
        tokens.len()
    }

    pub fn cancel_all<C: Clock>(&mut self, clock: &mut C) {
        for (token, _) in self.entries.drain() {
            clock.cancel(token);
        }
    }

    /// Whether `countdown` has a pending effect matching `action`
    pub fn has_pending(&self, countdown: usize, action: &EffectAction) -> bool {
        self.entries
            .values()
            .any(|effect| effect.countdown == countdown && &effect.action == action)
    }

    /// Renumber countdowns after the one at `removed` was deleted
    pub fn shift_after(&mut self, removed: usize) {
        for effect in self.entries.values_mut() {
            if effect.countdown > removed {
                effect.countdown -= 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
