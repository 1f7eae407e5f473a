//! Session state: the persisted source of truth for timers and running countdowns

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::{
    time::{Hms, TimeUnit},
    timer::{Pause, SoundChoice, Timer},
};
use crate::engine::sequence::{ItemKind, ItemRef, SequenceItem};

/// How timers relate to each other when run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Timers run one after another, with optional pauses in between
    #[default]
    Serial,
    /// Every timer runs on its own countdown
    Parallel,
}

/// Lifecycle of a single countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    /// Finished; the completion indicator is still showing
    Completed,
}

impl Phase {
    /// Started and not yet stopped, paused or not
    pub fn is_running(&self) -> bool {
        matches!(self, Phase::Running | Phase::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Phase::Paused)
    }

    /// Actively ticking
    pub fn is_ticking(&self) -> bool {
        matches!(self, Phase::Running)
    }
}

/// Persisted state of one countdown.
///
/// Serial mode has a single countdown driving the whole sequence; parallel
/// mode has one per timer, at the timer's index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub phase: Phase,
    #[serde(default)]
    pub sequence: Vec<SequenceItem>,
    /// Position of the current item in `sequence`
    #[serde(default)]
    pub position: usize,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    /// Critical flashing was on when the countdown was paused
    #[serde(default)]
    pub resume_critical: bool,
    /// Local time of day at which the countdown starts by itself
    #[serde(default)]
    pub scheduled_start: Option<NaiveTime>,
}

impl Countdown {
    pub fn idle(total_seconds: u64) -> Self {
        Self {
            total_seconds,
            remaining_seconds: total_seconds,
            ..Default::default()
        }
    }

    pub fn current_item(&self) -> Option<&SequenceItem> {
        self.sequence.get(self.position)
    }

    /// Progress through the current item, in percent
    pub fn percentage(&self) -> f64 {
        if self.total_seconds == 0 {
            return if self.phase.is_running() { 100.0 } else { 0.0 };
        }
        let done = 1.0 - self.remaining_seconds as f64 / self.total_seconds as f64;
        (done * 100.0).clamp(0.0, 100.0)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.total_seconds.saturating_sub(self.remaining_seconds)
    }
}

/// Global sound preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundSettings {
    pub sound: SoundChoice,
    pub volume: f64,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            sound: SoundChoice::DoubleBeep,
            volume: 0.7,
        }
    }
}

impl SoundSettings {
    pub fn normalized(mut self) -> Self {
        self.volume = if self.volume.is_finite() { self.volume.clamp(0.0, 1.0) } else { 0.7 };
        self
    }
}

/// Which parts of the surrounding UI are shown. Only stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibilitySettings {
    pub show_main_title: bool,
    pub show_header: bool,
    pub show_time_setter: bool,
    pub show_countdown: bool,
    pub show_timer_info: bool,
    pub show_start_btn: bool,
    pub show_notes: bool,
    pub show_progress_bar: bool,
    pub show_presets: bool,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            show_main_title: true,
            show_header: true,
            show_time_setter: true,
            show_countdown: true,
            show_timer_info: true,
            show_start_btn: true,
            show_notes: true,
            show_progress_bar: true,
            show_presets: true,
        }
    }
}

/// Full session snapshot, as written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub mode: Mode,
    pub timers: Vec<Timer>,
    #[serde(default)]
    pub pauses: Vec<Pause>,
    #[serde(default)]
    pub countdowns: Vec<Countdown>,
    #[serde(default = "sound_on")]
    pub sound_enabled: bool,
    #[serde(default)]
    pub sound: SoundSettings,
    #[serde(default)]
    pub visibility: VisibilitySettings,
    /// Wall-clock milliseconds of the last save
    #[serde(default)]
    pub saved_at: Option<i64>,
}

fn sound_on() -> bool {
    true
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Mode::Serial)
    }
}

impl Session {
    /// Fresh session with a single empty timer
    pub fn new(mode: Mode) -> Self {
        let mut session = Self {
            mode,
            timers: vec![Timer::new(0)],
            pauses: Vec::new(),
            countdowns: Vec::new(),
            sound_enabled: true,
            sound: SoundSettings::default(),
            visibility: VisibilitySettings::default(),
            saved_at: None,
        };
        session.rebuild_countdowns();
        session
    }

    /// Number of countdowns the current mode calls for
    pub fn countdown_slots(&self) -> usize {
        match self.mode {
            Mode::Serial => 1,
            Mode::Parallel => self.timers.len(),
        }
    }

    /// Timer an idle countdown shows: the first one in serial mode
    pub fn idle_timer_index(&self, id: usize) -> usize {
        match self.mode {
            Mode::Serial => 0,
            Mode::Parallel => id,
        }
    }

    /// Configured length of countdown `id` when idle
    pub fn idle_total(&self, id: usize) -> u64 {
        self.timers
            .get(self.idle_timer_index(id))
            .map(Timer::total_seconds)
            .unwrap_or(0)
    }

    /// Replace every countdown with an idle one for the current mode
    pub fn rebuild_countdowns(&mut self) {
        self.countdowns = (0..self.countdown_slots())
            .map(|id| Countdown::idle(self.idle_total(id)))
            .collect();
    }

    /// Restore the idle totals of countdowns that are not running
    pub fn refresh_idle_countdowns(&mut self) {
        for id in 0..self.countdowns.len() {
            let total = self.idle_total(id);
            let countdown = &mut self.countdowns[id];
            if countdown.phase == Phase::Idle {
                countdown.total_seconds = total;
                countdown.remaining_seconds = total;
            }
        }
    }

    /// Fix up a deserialized session whose shape no longer matches its mode
    pub fn repair(&mut self) {
        if self.timers.is_empty() {
            self.timers.push(Timer::new(0));
        }
        for timer in &mut self.timers {
            timer.interval.duration = timer.interval.duration.normalized();
            timer.reminders = std::mem::take(&mut timer.reminders).normalized();
        }
        for pause in &mut self.pauses {
            pause.interval.duration = pause.interval.duration.normalized();
        }
        if self.countdowns.len() != self.countdown_slots() {
            self.rebuild_countdowns();
        }
        for countdown in &mut self.countdowns {
            if countdown.phase.is_running() && countdown.current_item().is_none() {
                *countdown = Countdown::idle(0);
            }
            countdown.remaining_seconds = countdown.remaining_seconds.min(countdown.total_seconds);
        }
        self.refresh_idle_countdowns();
    }

    /// Pause `index` follows timer `index`; the list grows on demand up to
    /// the timer count and never past it.
    pub fn pause_mut(&mut self, index: usize) -> Option<&mut Pause> {
        if index >= self.timers.len() {
            return None;
        }
        if self.pauses.len() <= index {
            self.pauses.resize_with(index + 1, Pause::default);
        }
        self.pauses.get_mut(index)
    }

    /// Duration currently configured for a timer or pause
    pub fn duration_of(&self, item: ItemRef) -> Option<Hms> {
        match item.kind {
            ItemKind::Timer => self.timers.get(item.index).map(|t| t.interval.duration),
            ItemKind::Pause => self.pauses.get(item.index).map(|p| p.interval.duration),
        }
    }

    /// Set a duration, creating the pause slot if needed. Returns false for an
    /// unknown timer or a pause with no timer before it.
    pub fn set_duration(&mut self, item: ItemRef, duration: Hms) -> bool {
        let duration = duration.normalized();
        match item.kind {
            ItemKind::Timer => match self.timers.get_mut(item.index) {
                Some(timer) => timer.interval.duration = duration,
                None => return false,
            },
            ItemKind::Pause => match self.pause_mut(item.index) {
                Some(pause) => pause.interval.duration = duration,
                None => return false,
            },
        }
        self.refresh_idle_countdowns();
        true
    }

    pub fn adjust_time(&mut self, item: ItemRef, unit: TimeUnit, delta: i64) -> bool {
        let current = self.duration_of(item).unwrap_or_default();
        self.set_duration(item, current.adjusted(unit, delta))
    }

    /// Beep threshold of a sequence item, read from the live configuration
    pub fn beep_at(&self, item: ItemRef) -> u64 {
        match item.kind {
            ItemKind::Timer => self.timers.get(item.index).map(|t| t.interval.beep_at),
            ItemKind::Pause => self.pauses.get(item.index).map(|p| p.interval.beep_at),
        }
        .unwrap_or(0)
    }

    /// Sound for beeps of a sequence item: the timer override, else global
    pub fn sound_for(&self, item: ItemRef) -> SoundChoice {
        let custom = match item.kind {
            ItemKind::Timer => self.timers.get(item.index).and_then(|t| t.sound.clone()),
            ItemKind::Pause => None,
        };
        custom.unwrap_or_else(|| self.sound.sound.clone())
    }
}
