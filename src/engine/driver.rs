//! The countdown driver
//!
//! [`Engine`] owns the session and every scheduled wakeup. Each countdown
//! (one in serial mode, one per timer in parallel mode) walks its frozen
//! sequence one tick per second, evaluates reminders and the final warning,
//! and advances to the next item at zero. Runtime bookkeeping that must not
//! survive a restart lives next to the session in [`CountdownRuntime`].

use chrono::NaiveTime;
use tracing::{debug, info, warn};

use super::{
    clock::{CancelToken, Clock, ManualClock, Wakeup},
    command::{Appearance, Command, CommandError, SoundUpdate},
    effects::{ActiveEffects, Effect, EffectAction},
    reminder::{self, CriticalAction, TickContext},
    sequence::{build_sequence, build_single, ItemKind, ItemRef},
    COMPLETION_DISPLAY_MS, FINAL_FLASH_MS, SCHEDULED_START_BEEP_MS, TICK_MS,
};
use crate::{
    services::{
        alerts::{AlertDispatcher, DisplayUpdate},
        persistence::Store,
    },
    state::{
        Countdown, Hms, Interval, Mode, Phase, ReminderConfig, Session, SoundChoice, TimeUnit,
        Timer, VisibilitySettings,
    },
};

/// Flash state of a countdown's display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flash {
    #[default]
    Off,
    /// Reminder flash
    Warning,
    /// Final-warning flash
    Critical,
}

#[derive(Debug, Default)]
struct CountdownRuntime {
    tick: Option<CancelToken>,
    completion: Option<CancelToken>,
    schedule_check: Option<CancelToken>,
    /// Local time seen by the previous schedule check
    last_check: Option<NaiveTime>,
    flash: Flash,
}

/// A fired reminder's effects, copied out of the session
struct Firing {
    flash: bool,
    sound: bool,
    message: Option<String>,
    duration: u64,
}

pub struct Engine<C: Clock> {
    session: Session,
    clock: C,
    effects: ActiveEffects,
    runtimes: Vec<CountdownRuntime>,
    alerts: AlertDispatcher,
    store: Store,
}

impl<C: Clock> Engine<C> {
    /// Restore the saved session, or start a fresh one in `mode`
    pub fn restore(clock: C, store: Store, alerts: AlertDispatcher, mode: Mode) -> Self {
        let session = store
            .load(clock.now_ms())
            .unwrap_or_else(|| Session::new(mode));
        Self::with_session(clock, store, alerts, session)
    }

    /// Start from `session`, resuming whatever it has running
    pub fn with_session(clock: C, store: Store, alerts: AlertDispatcher, mut session: Session) -> Self {
        session.repair();
        let runtimes = fresh_runtimes(session.countdowns.len());
        let mut engine = Self {
            session,
            clock,
            effects: ActiveEffects::new(),
            runtimes,
            alerts,
            store,
        };
        engine.resume_restored();
        engine
    }

    fn resume_restored(&mut self) {
        for id in 0..self.session.countdowns.len() {
            match self.session.countdowns[id].phase {
                Phase::Running => {
                    info!(
                        "Resuming countdown {} with {}s left",
                        id, self.session.countdowns[id].remaining_seconds
                    );
                    self.schedule_tick(id);
                }
                Phase::Completed => self.schedule_completion(id),
                Phase::Idle | Phase::Paused => {}
            }
            if self.session.countdowns[id].scheduled_start.is_some() {
                self.arm_schedule_check(id);
            }
            self.emit_display(id, false);
        }
        self.persist();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn countdown(&self, id: usize) -> Option<&Countdown> {
        self.session.countdowns.get(id)
    }

    pub fn flash(&self, id: usize) -> Flash {
        self.runtimes.get(id).map(|r| r.flash).unwrap_or_default()
    }

    /// Number of reminder side effects still in flight
    pub fn pending_effects(&self) -> usize {
        self.effects.len()
    }

    /// Apply one command and save the result
    pub fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        debug!("Executing {:?}", command);
        let persist = !command.is_read_only() && !matches!(command, Command::ClearSavedState);

        match command {
            Command::Start { countdown } => self.start(countdown)?,
            Command::Toggle { countdown } => self.toggle(countdown)?,
            Command::Pause { countdown } => self.pause(countdown)?,
            Command::Resume { countdown } => self.resume(countdown)?,
            Command::Reset { countdown } => self.reset(countdown)?,
            Command::Schedule { countdown, at } => self.schedule(countdown, at)?,
            Command::AddTimer => self.add_timer(),
            Command::RemoveTimer { index } => self.remove_timer(index)?,
            Command::SetDuration { item, duration } => self.set_duration(item, duration)?,
            Command::AdjustTime { item, unit, delta } => self.adjust_time(item, unit, delta)?,
            Command::SetAppearance { item, appearance } => self.set_appearance(item, appearance)?,
            Command::SetBeepAt { item, beep_at } => {
                self.interval_mut(item)?.set_beep_at(beep_at);
            }
            Command::SetName { index, name } => self.timer_mut(index)?.set_name(index, &name),
            Command::SetReminders { index, reminders } => self.set_reminders(index, reminders)?,
            Command::SetTimerSound { index, sound } => self.set_timer_sound(index, sound)?,
            Command::UpdateSound(update) => self.update_sound(update),
            Command::SetSoundEnabled(enabled) => self.set_sound_enabled(enabled),
            Command::SetVisibility(visibility) => self.set_visibility(visibility),
            Command::SetMode(mode) => self.set_mode(mode),
            Command::ClearSavedState => self.clear_saved_state(),
            Command::Snapshot => {}
        }

        if persist {
            self.persist();
        }
        Ok(())
    }

    /// Deliver a wakeup from the clock. Wakeups whose token is no longer
    /// registered were cancelled and are dropped.
    pub fn handle_wakeup(&mut self, token: CancelToken, wakeup: Wakeup) {
        self.clock.release(token);
        match wakeup {
            Wakeup::Tick => match self.owner(token, |r| r.tick) {
                Some(id) => {
                    self.runtimes[id].tick = None;
                    self.on_tick(id);
                    self.persist();
                }
                None => debug!("Ignoring stale tick {:?}", token),
            },
            Wakeup::Effect => match self.effects.take(token) {
                Some(effect) => self.apply_effect(effect),
                None => debug!("Ignoring cancelled effect {:?}", token),
            },
            Wakeup::CompletionElapsed => match self.owner(token, |r| r.completion) {
                Some(id) => {
                    self.runtimes[id].completion = None;
                    if self.session.countdowns[id].phase == Phase::Completed {
                        self.to_idle(id);
                        self.persist();
                    }
                }
                None => debug!("Ignoring stale completion {:?}", token),
            },
            Wakeup::ScheduleCheck => match self.owner(token, |r| r.schedule_check) {
                Some(id) => {
                    self.runtimes[id].schedule_check = None;
                    self.on_schedule_check(id);
                }
                None => debug!("Ignoring stale schedule check {:?}", token),
            },
        }
    }

    /// Save and cancel everything scheduled. Phases are left as they are so
    /// the next start can resume them.
    pub fn shutdown(&mut self) {
        info!("Engine shutting down, saving session");
        self.persist();
        for runtime in &mut self.runtimes {
            for token in [
                runtime.tick.take(),
                runtime.completion.take(),
                runtime.schedule_check.take(),
            ]
            .into_iter()
            .flatten()
            {
                self.clock.cancel(token);
            }
        }
        self.effects.cancel_all(&mut self.clock);
    }

    // ---- run lifecycle ----

    pub fn start(&mut self, id: usize) -> Result<(), CommandError> {
        match self.countdown_ref(id)?.phase {
            Phase::Running => return Ok(()),
            Phase::Paused => return self.resume(id),
            Phase::Idle | Phase::Completed => {}
        }

        let sequence = match self.session.mode {
            Mode::Serial => build_sequence(&self.session.timers, &self.session.pauses),
            Mode::Parallel => build_single(&self.session.timers, id),
        };
        let total: u64 = sequence.iter().map(|item| item.total_seconds).sum();
        if total == 0 {
            debug!("Countdown {} has nothing to run, ignoring start", id);
            return Ok(());
        }

        self.halt(id);
        let first = sequence[0].total_seconds;
        let countdown = &mut self.session.countdowns[id];
        countdown.sequence = sequence;
        countdown.position = 0;
        countdown.total_seconds = first;
        countdown.remaining_seconds = first;
        countdown.phase = Phase::Running;
        countdown.resume_critical = false;
        info!(
            "Countdown {} started: {} items, {}s in total",
            id,
            countdown.sequence.len(),
            total
        );

        self.emit_display(id, false);
        self.schedule_tick(id);
        Ok(())
    }

    pub fn pause(&mut self, id: usize) -> Result<(), CommandError> {
        if self.countdown_ref(id)?.phase != Phase::Running {
            return Ok(());
        }
        let critical = self.runtimes[id].flash == Flash::Critical;
        self.halt(id);

        let countdown = &mut self.session.countdowns[id];
        countdown.phase = Phase::Paused;
        countdown.resume_critical = critical;
        info!("Countdown {} paused with {}s left", id, countdown.remaining_seconds);
        self.emit_display(id, false);
        Ok(())
    }

    pub fn resume(&mut self, id: usize) -> Result<(), CommandError> {
        if self.countdown_ref(id)?.phase != Phase::Paused {
            return Ok(());
        }
        let countdown = &mut self.session.countdowns[id];
        countdown.phase = Phase::Running;
        let critical = std::mem::take(&mut countdown.resume_critical);
        info!("Countdown {} resumed with {}s left", id, countdown.remaining_seconds);

        if critical {
            self.set_flash(id, Flash::Critical);
        }
        self.emit_display(id, false);
        self.schedule_tick(id);
        Ok(())
    }

    pub fn toggle(&mut self, id: usize) -> Result<(), CommandError> {
        match self.countdown_ref(id)?.phase {
            Phase::Running => self.pause(id),
            Phase::Paused => self.resume(id),
            Phase::Idle | Phase::Completed => self.start(id),
        }
    }

    pub fn reset(&mut self, id: usize) -> Result<(), CommandError> {
        self.countdown_ref(id)?;
        self.halt(id);
        self.to_idle(id);
        info!("Countdown {} reset", id);
        Ok(())
    }

    fn on_tick(&mut self, id: usize) {
        let countdown = &mut self.session.countdowns[id];
        if countdown.phase != Phase::Running {
            debug!("Tick for countdown {} that is not running", id);
            return;
        }
        // Zero-length items complete without a decrement
        if countdown.remaining_seconds == 0 {
            self.complete_item(id);
            return;
        }

        countdown.remaining_seconds -= 1;
        let remaining = countdown.remaining_seconds;
        let Some(item) = countdown.current_item().map(|i| i.item) else {
            warn!("Countdown {} lost its current item, resetting", id);
            self.halt(id);
            self.to_idle(id);
            return;
        };

        if remaining > 0 {
            self.evaluate_tick(id, item, remaining);
            self.emit_display(id, true);
            self.schedule_tick(id);
        } else {
            self.emit_display(id, true);
            if reminder::final_alert(self.session.beep_at(item)) {
                self.final_alert(id, item);
            }
            self.complete_item(id);
        }
    }

    fn evaluate_tick(&mut self, id: usize, item: ItemRef, remaining: u64) {
        let elapsed = self.session.countdowns[id].elapsed_seconds();
        let sound = self.session.sound_for(item);
        let (firings, critical, in_window, clear_flash) = {
            let decision = reminder::evaluate(&TickContext {
                remaining,
                elapsed,
                beep_at: self.session.beep_at(item),
                reminders: self.reminders_of(item),
            });
            let firings: Vec<Firing> = decision
                .fired
                .iter()
                .map(|fire| {
                    debug!("Countdown {} reminder {:?} fired at {}s", id, fire.source, remaining);
                    Firing {
                        flash: fire.effects.flash,
                        sound: fire.effects.sound,
                        message: fire.effects.message_text().map(str::to_string),
                        duration: fire.duration,
                    }
                })
                .collect();
            (firings, decision.critical, decision.in_critical_window(), decision.clear_flash)
        };

        for firing in &firings {
            self.fire_reminder(id, firing, &sound, in_window);
        }

        match critical {
            CriticalAction::Enter => {
                debug!("Countdown {} entered the final warning at {}s", id, remaining);
                self.set_flash(id, Flash::Critical);
                self.beep(id, sound, false);
            }
            CriticalAction::Beep => self.beep(id, sound, false),
            CriticalAction::None => {
                if clear_flash && self.runtimes[id].flash == Flash::Warning {
                    self.set_flash(id, Flash::Off);
                }
            }
        }
    }

    fn fire_reminder(&mut self, id: usize, firing: &Firing, sound: &SoundChoice, in_window: bool) {
        if firing.flash && self.runtimes[id].flash == Flash::Off {
            self.set_flash(id, Flash::Warning);
        }
        if let Some(text) = &firing.message {
            self.alerts.message_show(id, text);
            self.effects.schedule(
                &mut self.clock,
                firing.duration.saturating_mul(1000),
                id,
                EffectAction::MessageHide,
            );
        }
        if firing.sound {
            for second in 0..firing.duration {
                self.effects.schedule(
                    &mut self.clock,
                    second.saturating_mul(1000),
                    id,
                    EffectAction::Beep { sound: sound.clone() },
                );
            }
        }
        if firing.flash && !in_window {
            self.effects.schedule(
                &mut self.clock,
                firing.duration.saturating_mul(1000),
                id,
                EffectAction::ReminderFlashEnd,
            );
        }
    }

    fn final_alert(&mut self, id: usize, item: ItemRef) {
        info!("Countdown {} reached zero on {:?} {}", id, item.kind, item.index);
        self.beep(id, self.session.sound_for(item), true);
        self.set_flash(id, Flash::Off);
        self.set_flash(id, Flash::Critical);
        self.effects
            .schedule(&mut self.clock, FINAL_FLASH_MS, id, EffectAction::FinalFlashEnd);
    }

    /// Move to the next item, or finish the run
    fn complete_item(&mut self, id: usize) {
        let countdown = &mut self.session.countdowns[id];
        let next = countdown.position + 1;
        let Some((item, total)) = countdown
            .sequence
            .get(next)
            .map(|i| (i.item, i.total_seconds))
        else {
            self.finish(id);
            return;
        };

        countdown.position = next;
        countdown.total_seconds = total;
        countdown.remaining_seconds = total;
        info!(
            "Countdown {} moved to {:?} {} ({}s)",
            id, item.kind, item.index, total
        );
        self.emit_display(id, false);
        self.schedule_tick(id);
    }

    fn finish(&mut self, id: usize) {
        self.halt(id);
        let countdown = &mut self.session.countdowns[id];
        countdown.phase = Phase::Completed;
        countdown.remaining_seconds = 0;
        info!("Countdown {} completed", id);
        self.emit_display(id, false);
        self.schedule_completion(id);
    }

    /// Return to idle showing the configured length, keeping any scheduled start
    fn to_idle(&mut self, id: usize) {
        let total = self.session.idle_total(id);
        let countdown = &mut self.session.countdowns[id];
        let scheduled_start = countdown.scheduled_start.take();
        *countdown = Countdown::idle(total);
        countdown.scheduled_start = scheduled_start;
        self.emit_display(id, false);
    }

    /// Cancel the tick, the completion timer and every in-flight effect, and
    /// stop flashing. A message still on screen is hidden.
    fn halt(&mut self, id: usize) {
        let runtime = &mut self.runtimes[id];
        for token in [runtime.tick.take(), runtime.completion.take()]
            .into_iter()
            .flatten()
        {
            self.clock.cancel(token);
        }
        let message_showing = self.effects.has_pending(id, &EffectAction::MessageHide);
        self.effects.cancel_for(&mut self.clock, id);
        if message_showing {
            self.alerts.message_hide(id);
        }
        self.set_flash(id, Flash::Off);
    }

    fn schedule_tick(&mut self, id: usize) {
        if let Some(old) = self.runtimes[id].tick.take() {
            self.clock.cancel(old);
        }
        self.runtimes[id].tick = Some(self.clock.schedule_after(TICK_MS, Wakeup::Tick));
    }

    fn schedule_completion(&mut self, id: usize) {
        if let Some(old) = self.runtimes[id].completion.take() {
            self.clock.cancel(old);
        }
        self.runtimes[id].completion = Some(
            self.clock
                .schedule_after(COMPLETION_DISPLAY_MS, Wakeup::CompletionElapsed),
        );
    }

    fn apply_effect(&mut self, effect: Effect) {
        let id = effect.countdown;
        let Some(countdown) = self.session.countdowns.get(id) else {
            return;
        };
        let ticking = countdown.phase.is_ticking();

        match effect.action {
            EffectAction::Beep { sound } => {
                if ticking {
                    self.beep(id, sound, false);
                } else {
                    debug!("Dropping beep for countdown {} that is not running", id);
                }
            }
            EffectAction::MessageHide => self.alerts.message_hide(id),
            EffectAction::FinalFlashEnd => {
                // The next item may already be in its own final warning
                let critical = ticking
                    && countdown.current_item().is_some_and(|i| {
                        reminder::in_critical_window(
                            self.session.beep_at(i.item),
                            countdown.remaining_seconds,
                        )
                    });
                if !critical {
                    self.set_flash(id, Flash::Off);
                }
            }
            EffectAction::ReminderFlashEnd => {
                if !ticking || self.runtimes[id].flash != Flash::Warning {
                    return;
                }
                let remaining = countdown.remaining_seconds;
                let elapsed = countdown.elapsed_seconds();
                let Some(item) = countdown.current_item().map(|i| i.item) else {
                    return;
                };
                let critical = reminder::in_critical_window(self.session.beep_at(item), remaining);
                let window_open = self
                    .reminders_of(item)
                    .is_some_and(|config| reminder::any_window_active(config, remaining, elapsed));
                if !critical && !window_open {
                    self.set_flash(id, Flash::Off);
                }
            }
        }
    }

    // ---- scheduled start ----

    pub fn schedule(&mut self, id: usize, at: Option<NaiveTime>) -> Result<(), CommandError> {
        self.countdown_ref(id)?;
        self.session.countdowns[id].scheduled_start = at;
        match at {
            Some(at) => {
                info!("Countdown {} scheduled to start at {}", id, at);
                self.arm_schedule_check(id);
            }
            None => {
                info!("Countdown {} schedule cleared", id);
                self.cancel_schedule_check(id);
            }
        }
        Ok(())
    }

    fn arm_schedule_check(&mut self, id: usize) {
        self.cancel_schedule_check(id);
        let runtime = &mut self.runtimes[id];
        runtime.last_check = Some(self.clock.local_time());
        runtime.schedule_check = Some(self.clock.schedule_after(TICK_MS, Wakeup::ScheduleCheck));
    }

    fn cancel_schedule_check(&mut self, id: usize) {
        let runtime = &mut self.runtimes[id];
        runtime.last_check = None;
        if let Some(token) = runtime.schedule_check.take() {
            self.clock.cancel(token);
        }
    }

    fn on_schedule_check(&mut self, id: usize) {
        let Some(at) = self.session.countdowns[id].scheduled_start else {
            return;
        };
        let now = self.clock.local_time();
        let previous = self.runtimes[id].last_check.replace(now).unwrap_or(now);

        if !crossed(previous, now, at) {
            self.runtimes[id].schedule_check =
                Some(self.clock.schedule_after(TICK_MS, Wakeup::ScheduleCheck));
            return;
        }

        info!("Scheduled start time {} reached for countdown {}", at, id);
        self.session.countdowns[id].scheduled_start = None;
        self.runtimes[id].last_check = None;
        if !self.session.countdowns[id].phase.is_running() {
            if let Err(e) = self.start(id) {
                warn!("Scheduled start of countdown {} failed: {}", id, e);
            } else if self.session.countdowns[id].phase == Phase::Running {
                let sound = self.session.sound.sound.clone();
                for beep in 0..3 {
                    self.effects.schedule(
                        &mut self.clock,
                        beep * SCHEDULED_START_BEEP_MS,
                        id,
                        EffectAction::Beep { sound: sound.clone() },
                    );
                }
            }
        }
        self.persist();
    }

    // ---- configuration ----

    pub fn add_timer(&mut self) {
        let index = self.session.timers.len();
        self.session.timers.push(Timer::new(index));
        if self.session.mode == Mode::Parallel {
            self.session.countdowns.push(Countdown::idle(0));
            self.runtimes.push(CountdownRuntime::default());
            self.emit_display(index, false);
        }
        info!("Added timer {}", index + 1);
    }

    /// Remove a timer and the pause that follows it. The first timer and the
    /// only remaining timer are kept.
    pub fn remove_timer(&mut self, index: usize) -> Result<(), CommandError> {
        let count = self.session.timers.len();
        if index >= count {
            return Err(CommandError::UnknownTimer(index));
        }
        if index == 0 || count <= 1 {
            debug!("Refusing to remove timer {}", index);
            return Ok(());
        }

        match self.session.mode {
            Mode::Serial => {
                // Item indices of a running sequence no longer line up
                if self.session.countdowns[0].phase != Phase::Idle {
                    self.halt(0);
                    self.to_idle(0);
                }
            }
            Mode::Parallel => {
                self.halt(index);
                self.cancel_schedule_check(index);
                self.session.countdowns.remove(index);
                self.runtimes.remove(index);
                self.effects.shift_after(index);
                for countdown in &mut self.session.countdowns[index..] {
                    for step in &mut countdown.sequence {
                        if step.item.index > index {
                            step.item.index -= 1;
                        }
                    }
                }
            }
        }

        self.session.timers.remove(index);
        if index < self.session.pauses.len() {
            self.session.pauses.remove(index);
        }
        self.session.refresh_idle_countdowns();
        self.emit_idle_displays();
        info!("Removed timer {}", index + 1);
        Ok(())
    }

    pub fn set_duration(&mut self, item: ItemRef, duration: Hms) -> Result<(), CommandError> {
        if !self.session.set_duration(item, duration) {
            return Err(CommandError::UnknownTimer(item.index));
        }
        self.emit_idle_displays();
        Ok(())
    }

    pub fn adjust_time(&mut self, item: ItemRef, unit: TimeUnit, delta: i64) -> Result<(), CommandError> {
        if !self.session.adjust_time(item, unit, delta) {
            return Err(CommandError::UnknownTimer(item.index));
        }
        self.emit_idle_displays();
        Ok(())
    }

    pub fn set_appearance(&mut self, item: ItemRef, appearance: Appearance) -> Result<(), CommandError> {
        let interval = self.interval_mut(item)?;
        if let Some(color) = appearance.color.filter(|c| !c.trim().is_empty()) {
            interval.color = color;
        }
        if let Some(alpha) = appearance.alpha {
            interval.set_alpha(alpha);
        }
        if let Some(direction) = appearance.direction {
            interval.direction = direction;
        }
        self.emit_idle_displays();
        Ok(())
    }

    pub fn set_reminders(&mut self, index: usize, reminders: ReminderConfig) -> Result<(), CommandError> {
        let reminders = reminders.normalized();
        debug!(
            "Timer {} now has {} custom reminders, every {}s",
            index + 1,
            reminders.custom.len(),
            reminders.every.period()
        );
        self.timer_mut(index)?.reminders = reminders;
        Ok(())
    }

    pub fn set_timer_sound(&mut self, index: usize, sound: Option<SoundChoice>) -> Result<(), CommandError> {
        self.timer_mut(index)?.sound = sound;
        Ok(())
    }

    pub fn update_sound(&mut self, update: SoundUpdate) {
        let mut settings = self.session.sound.clone();
        if let Some(sound) = update.sound {
            settings.sound = sound;
        }
        if let Some(volume) = update.volume {
            settings.volume = volume;
        }
        self.session.sound = settings.normalized();
        if let Some(enabled) = update.enabled {
            self.set_sound_enabled(enabled);
        }
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        info!("Sound {}", if enabled { "enabled" } else { "disabled" });
        self.session.sound_enabled = enabled;
    }

    pub fn set_visibility(&mut self, visibility: VisibilitySettings) {
        self.session.visibility = visibility;
    }

    /// Switch between serial and parallel. Everything running stops.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.session.mode == mode {
            return;
        }
        self.stop_all();
        self.session.mode = mode;
        self.session.rebuild_countdowns();
        self.runtimes = fresh_runtimes(self.session.countdowns.len());
        info!("Switched to {:?} mode", mode);
        self.emit_all_displays();
    }

    /// Drop the saved snapshot and start over with defaults in the current mode
    pub fn clear_saved_state(&mut self) {
        self.stop_all();
        self.session = Session::new(self.session.mode);
        self.runtimes = fresh_runtimes(self.session.countdowns.len());
        self.store.clear();
        info!("Saved state cleared");
        self.emit_all_displays();
    }

    fn stop_all(&mut self) {
        for id in 0..self.runtimes.len() {
            self.halt(id);
            self.cancel_schedule_check(id);
        }
    }

    // ---- helpers ----

    fn countdown_ref(&self, id: usize) -> Result<&Countdown, CommandError> {
        self.session
            .countdowns
            .get(id)
            .ok_or(CommandError::UnknownCountdown(id))
    }

    fn timer_mut(&mut self, index: usize) -> Result<&mut Timer, CommandError> {
        self.session
            .timers
            .get_mut(index)
            .ok_or(CommandError::UnknownTimer(index))
    }

    fn interval_mut(&mut self, item: ItemRef) -> Result<&mut Interval, CommandError> {
        match item.kind {
            ItemKind::Timer => Ok(&mut self.timer_mut(item.index)?.interval),
            ItemKind::Pause => self
                .session
                .pause_mut(item.index)
                .map(|pause| &mut pause.interval)
                .ok_or(CommandError::UnknownTimer(item.index)),
        }
    }

    fn reminders_of(&self, item: ItemRef) -> Option<&ReminderConfig> {
        match item.kind {
            ItemKind::Timer => self.session.timers.get(item.index).map(|t| &t.reminders),
            ItemKind::Pause => None,
        }
    }

    fn owner(&self, token: CancelToken, slot: impl Fn(&CountdownRuntime) -> Option<CancelToken>) -> Option<usize> {
        self.runtimes.iter().position(|runtime| slot(runtime) == Some(token))
    }

    fn beep(&self, id: usize, sound: SoundChoice, last: bool) {
        if self.session.sound_enabled {
            self.alerts.beep(id, sound, self.session.sound.volume, last);
        }
    }

    fn set_flash(&mut self, id: usize, next: Flash) {
        let current = self.runtimes[id].flash;
        if current == next {
            return;
        }
        if current != Flash::Off {
            self.alerts.flash_stop(id);
        }
        match next {
            Flash::Warning => self.alerts.flash_start(id, false),
            Flash::Critical => self.alerts.flash_start(id, true),
            Flash::Off => {}
        }
        self.runtimes[id].flash = next;
    }

    fn emit_display(&self, id: usize, animate: bool) {
        let Some(countdown) = self.session.countdowns.get(id) else {
            return;
        };
        let current = countdown
            .current_item()
            .filter(|_| countdown.phase != Phase::Idle);
        let (item, color, alpha, direction) = match current {
            Some(step) => (Some(step.item), step.color.clone(), step.alpha, step.direction),
            None => {
                let index = self.session.idle_timer_index(id);
                match self.session.timers.get(index) {
                    Some(timer) => (
                        Some(ItemRef::timer(index)),
                        timer.interval.color.clone(),
                        timer.interval.alpha,
                        timer.interval.direction,
                    ),
                    None => (None, String::new(), 1.0, Default::default()),
                }
            }
        };

        self.alerts.display(&DisplayUpdate {
            countdown: id,
            item,
            phase: countdown.phase,
            remaining_seconds: countdown.remaining_seconds,
            total_seconds: countdown.total_seconds,
            percentage: countdown.percentage(),
            color,
            alpha,
            direction,
            animate,
            completed: countdown.phase == Phase::Completed,
        });
    }

    fn emit_idle_displays(&self) {
        for (id, countdown) in self.session.countdowns.iter().enumerate() {
            if countdown.phase == Phase::Idle {
                self.emit_display(id, false);
            }
        }
    }

    fn emit_all_displays(&self) {
        for id in 0..self.session.countdowns.len() {
            self.emit_display(id, false);
        }
    }

    fn persist(&mut self) {
        let now = self.clock.now_ms();
        self.session.saved_at = Some(now);
        self.store.save(&self.session, now);
    }
}

impl Engine<ManualClock> {
    /// Move time forward by `ms`, delivering every wakeup that falls due
    pub fn advance(&mut self, ms: u64) {
        let target = self.clock.now_ms() + ms as i64;
        while let Some((token, wakeup)) = self.clock.pop_due(target) {
            self.handle_wakeup(token, wakeup);
        }
        self.clock.set_now(target);
    }

    pub fn clock_mut(&mut self) -> &mut ManualClock {
        &mut self.clock
    }
}

fn fresh_runtimes(count: usize) -> Vec<CountdownRuntime> {
    (0..count).map(|_| CountdownRuntime::default()).collect()
}

/// Whether `at` lies in `(previous, now]`, allowing for midnight between checks
fn crossed(previous: NaiveTime, now: NaiveTime, at: NaiveTime) -> bool {
    if previous <= now {
        previous < at && at <= now
    } else {
        at > previous || at <= now
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
