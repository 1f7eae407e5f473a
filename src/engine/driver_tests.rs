//! Tests for the countdown driver
//!
//! Every test runs on a [`ManualClock`]; time only moves through
//! `Engine::advance`, so tick counts are exact.

use chrono::NaiveTime;

use super::*;
use crate::services::{
    alerts::{AlertKind, AlertPayload, RecordingSink},
    persistence::{KvBackend, MemoryBackend, Store, SESSION_KEY},
};
use crate::state::{
    time::MAX_HOURS, timer::MAX_REMINDER_DURATION, CustomReminder, EveryReminder, Pause,
    ReminderEffects,
};

const T0: i64 = 1_700_000_000_000;

fn timers(durations: &[u64], beep_at: u64) -> Vec<Timer> {
    durations
        .iter()
        .enumerate()
        .map(|(i, seconds)| {
            let mut timer = Timer::new(i);
            timer.interval.duration = Hms::from_seconds(*seconds);
            timer.interval.set_beep_at(beep_at);
            timer
        })
        .collect()
}

fn serial(durations: &[u64], pauses: &[u64], beep_at: u64) -> Session {
    let mut session = Session::new(Mode::Serial);
    session.timers = timers(durations, beep_at);
    session.pauses = pauses
        .iter()
        .map(|seconds| {
            let mut pause = Pause::default();
            pause.interval.duration = Hms::from_seconds(*seconds);
            pause
        })
        .collect();
    session.rebuild_countdowns();
    session
}

fn parallel(durations: &[u64]) -> Session {
    let mut session = Session::new(Mode::Parallel);
    session.timers = timers(durations, 0);
    session.rebuild_countdowns();
    session
}

fn boot_at(session: Session, now: i64, backend: &MemoryBackend) -> (Engine<ManualClock>, RecordingSink) {
    let sink = RecordingSink::new();
    let engine = Engine::with_session(
        ManualClock::new(now),
        Store::new(Box::new(backend.clone())),
        AlertDispatcher::with_sink(sink.clone()),
        session,
    );
    sink.clear();
    (engine, sink)
}

fn boot(session: Session) -> (Engine<ManualClock>, RecordingSink) {
    boot_at(session, T0, &MemoryBackend::new())
}

fn reminder_effects(flash: bool, sound: bool, message: Option<&str>) -> ReminderEffects {
    ReminderEffects {
        flash,
        sound,
        message: message.is_some(),
        message_text: message.unwrap_or_default().to_string(),
    }
}

fn current(engine: &Engine<ManualClock>, id: usize) -> (Phase, Option<ItemRef>, u64) {
    let countdown = engine.countdown(id).unwrap();
    (
        countdown.phase,
        countdown.current_item().map(|i| i.item),
        countdown.remaining_seconds,
    )
}

#[test]
fn serial_run_walks_timers_and_pauses() {
    let (mut engine, sink) = boot(serial(&[5, 3], &[2], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 5));

    engine.advance(5000);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::pause(0)), 2));

    engine.advance(2000);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(1)), 3));

    engine.advance(3000);
    let countdown = engine.countdown(0).unwrap();
    assert_eq!(countdown.phase, Phase::Completed);
    assert_eq!(countdown.remaining_seconds, 0);
    let last = sink.displays().pop().unwrap();
    assert!(last.completed);
    assert!(!last.animate);

    engine.advance(COMPLETION_DISPLAY_MS);
    assert_eq!(current(&engine, 0).0, Phase::Idle);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 5);
    assert!(!sink.displays().pop().unwrap().completed);
}

#[test]
fn item_transitions_jump_without_animation() {
    let (mut engine, sink) = boot(serial(&[2, 2], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(2000);

    let displays = sink.displays();
    let switch = displays
        .iter()
        .find(|d| d.item == Some(ItemRef::timer(1)))
        .unwrap();
    assert!(!switch.animate);
    assert_eq!(switch.remaining_seconds, 2);
    assert_eq!(switch.color, "#e67e22");
    assert!(displays.iter().any(|d| d.animate && d.remaining_seconds == 1));
}

#[test]
fn zero_length_items_complete_without_a_decrement() {
    let (mut engine, _sink) = boot(serial(&[0, 3], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 0));

    engine.advance(1000);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(1)), 3));

    engine.advance(3000);
    assert_eq!(current(&engine, 0).0, Phase::Completed);
}

#[test]
fn starting_an_empty_sequence_does_nothing() {
    let (mut engine, sink) = boot(serial(&[0, 0], &[0], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0).0, Phase::Idle);
    assert_eq!(engine.clock().pending(), 0);
    assert!(sink.notifications().is_empty());
}

#[test]
fn final_warning_beeps_every_second_then_alarms() {
    let (mut engine, sink) = boot(serial(&[10], &[], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    engine.advance(4000);
    assert_eq!(sink.count(AlertKind::Beep), 0);
    assert_eq!(engine.flash(0), Flash::Off);

    engine.advance(1000);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 5);
    assert_eq!(engine.flash(0), Flash::Critical);
    assert_eq!(sink.count(AlertKind::Beep), 1);

    engine.advance(5000);
    let beeps: Vec<_> = sink
        .alerts()
        .into_iter()
        .filter(|a| a.kind == AlertKind::Beep)
        .collect();
    assert_eq!(beeps.len(), 6);
    let last = beeps.last().unwrap();
    assert!(last.critical);
    assert_eq!(
        last.payload,
        Some(AlertPayload::Sound {
            sound: SoundChoice::Alarm,
            volume: 0.7
        })
    );
    assert_eq!(current(&engine, 0).0, Phase::Completed);
    assert_eq!(engine.flash(0), Flash::Off);
}

#[test]
fn final_flash_carries_into_the_next_item_briefly() {
    let (mut engine, _sink) = boot(serial(&[6, 10], &[], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    engine.advance(6000);
    assert_eq!(current(&engine, 0).1, Some(ItemRef::timer(1)));
    assert_eq!(engine.flash(0), Flash::Critical);

    engine.advance(FINAL_FLASH_MS);
    assert_eq!(engine.flash(0), Flash::Off);
}

#[test]
fn final_flash_end_leaves_the_next_items_warning_critical() {
    let (mut engine, _sink) = boot(serial(&[6, 6], &[], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    engine.advance(7000);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(1)), 5));
    assert_eq!(engine.flash(0), Flash::Critical);

    // Past the end of the previous item's final flash
    engine.advance(300);
    assert_eq!(engine.flash(0), Flash::Critical);

    engine.advance(4700);
    assert_eq!(current(&engine, 0).0, Phase::Completed);
    assert_eq!(engine.flash(0), Flash::Off);
}

#[test]
fn no_final_alert_without_threshold() {
    let (mut engine, sink) = boot(serial(&[3], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(3000);
    assert_eq!(sink.count(AlertKind::Beep), 0);
    assert_eq!(sink.count(AlertKind::FlashStart), 0);
}

#[test]
fn muted_sessions_still_flash() {
    let (mut engine, sink) = boot(serial(&[10], &[], 5));
    engine.execute(Command::SetSoundEnabled(false)).unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(10_000);
    assert_eq!(sink.count(AlertKind::Beep), 0);
    assert!(sink.count(AlertKind::FlashStart) >= 1);
}

#[test]
fn timer_sound_override_is_used_for_beeps() {
    let (mut engine, sink) = boot(serial(&[6], &[], 5));
    engine
        .execute(Command::SetTimerSound {
            index: 0,
            sound: Some(SoundChoice::Sample("08cowBell".into())),
        })
        .unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(6000);

    let sounds: Vec<_> = sink
        .alerts()
        .into_iter()
        .filter_map(|a| match a.payload {
            Some(AlertPayload::Sound { sound, .. }) => Some(sound),
            _ => None,
        })
        .collect();
    assert_eq!(sounds.len(), 6);
    assert!(sounds.iter().all(|s| *s == SoundChoice::Sample("08cowBell".into())));
}

#[test]
fn pause_and_resume_are_idempotent() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(3000);

    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0).0, Phase::Paused);
    engine.advance(5000);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 7);

    engine.execute(Command::Resume { countdown: 0 }).unwrap();
    engine.execute(Command::Resume { countdown: 0 }).unwrap();
    engine.advance(1000);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 6));
}

#[test]
fn toggle_cycles_start_pause_resume() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine.execute(Command::Toggle { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0).0, Phase::Running);
    engine.execute(Command::Toggle { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0).0, Phase::Paused);
    engine.execute(Command::Toggle { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0).0, Phase::Running);
    // Start while paused resumes instead of restarting
    engine.advance(2000);
    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 8));
}

#[test]
fn a_cancelled_tick_never_decrements() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(500);
    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    engine.execute(Command::Resume { countdown: 0 }).unwrap();

    // The cancelled tick was due now
    engine.advance(500);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 10);
    engine.advance(500);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 9);
}

#[test]
fn pausing_in_the_warning_window_restores_critical_flash() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(6000);
    assert_eq!(engine.flash(0), Flash::Critical);

    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    assert_eq!(engine.flash(0), Flash::Off);
    assert!(engine.countdown(0).unwrap().resume_critical);

    engine.execute(Command::Resume { countdown: 0 }).unwrap();
    assert_eq!(engine.flash(0), Flash::Critical);
    assert!(!engine.countdown(0).unwrap().resume_critical);
}

#[test]
fn custom_reminder_fires_once_with_all_effects() {
    let (mut engine, sink) = boot(serial(&[30], &[], 0));
    engine
        .execute(Command::SetReminders {
            index: 0,
            reminders: ReminderConfig {
                custom: vec![CustomReminder {
                    before_end: Hms::from_seconds(10),
                    effects: reminder_effects(true, true, Some("Wrap up")),
                }],
                every: EveryReminder::default(),
                duration: 3,
            },
        })
        .unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    engine.advance(20_000);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 10);
    assert_eq!(engine.flash(0), Flash::Warning);
    assert_eq!(sink.count(AlertKind::MessageShow), 1);
    assert_eq!(sink.count(AlertKind::Beep), 1);

    engine.advance(2000);
    assert_eq!(sink.count(AlertKind::Beep), 3);
    assert_eq!(engine.flash(0), Flash::Warning);

    engine.advance(1000);
    assert_eq!(sink.count(AlertKind::MessageHide), 1);
    assert_eq!(engine.flash(0), Flash::Off);

    engine.advance(7000);
    assert_eq!(current(&engine, 0).0, Phase::Completed);
    assert_eq!(sink.count(AlertKind::MessageShow), 1);
    assert_eq!(sink.count(AlertKind::Beep), 3);
}

#[test]
fn every_reminder_fires_on_each_period() {
    let (mut engine, sink) = boot(serial(&[60], &[], 0));
    engine
        .execute(Command::SetReminders {
            index: 0,
            reminders: ReminderConfig {
                custom: Vec::new(),
                every: EveryReminder {
                    minutes: 0,
                    seconds: 20,
                    effects: reminder_effects(false, true, None),
                },
                duration: 2,
            },
        })
        .unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    engine.advance(19_000);
    assert_eq!(sink.count(AlertKind::Beep), 0);
    engine.advance(1000);
    assert_eq!(sink.count(AlertKind::Beep), 1);
    engine.advance(40_000);
    assert_eq!(sink.count(AlertKind::Beep), 4);
    assert_eq!(sink.count(AlertKind::FlashStart), 0);
}

#[test]
fn pausing_cancels_reminder_effects_in_flight() {
    let (mut engine, sink) = boot(serial(&[30], &[], 0));
    engine
        .execute(Command::SetReminders {
            index: 0,
            reminders: ReminderConfig {
                custom: vec![CustomReminder {
                    before_end: Hms::from_seconds(20),
                    effects: reminder_effects(true, true, Some("Halfway")),
                }],
                every: EveryReminder::default(),
                duration: 5,
            },
        })
        .unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(10_000);
    assert_eq!(sink.count(AlertKind::Beep), 1);
    assert!(engine.pending_effects() > 0);

    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    assert_eq!(engine.pending_effects(), 0);
    assert_eq!(sink.count(AlertKind::MessageHide), 1);
    assert_eq!(engine.flash(0), Flash::Off);

    engine.advance(10_000);
    assert_eq!(sink.count(AlertKind::Beep), 1);
}

#[test]
fn reset_returns_to_idle_and_cancels_everything() {
    let (mut engine, _sink) = boot(serial(&[10, 5], &[3], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(7000);

    engine.execute(Command::Reset { countdown: 0 }).unwrap();
    let countdown = engine.countdown(0).unwrap();
    assert_eq!(countdown.phase, Phase::Idle);
    assert_eq!(countdown.remaining_seconds, 10);
    assert!(countdown.sequence.is_empty());
    assert_eq!(engine.pending_effects(), 0);
    assert_eq!(engine.clock().pending(), 0);
    assert_eq!(engine.flash(0), Flash::Off);
}

#[test]
fn parallel_countdowns_run_independently() {
    let (mut engine, _sink) = boot(parallel(&[5, 3]));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(1000);
    engine.execute(Command::Start { countdown: 1 }).unwrap();
    engine.advance(3000);

    assert_eq!(current(&engine, 1).0, Phase::Completed);
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 1));

    engine.execute(Command::Pause { countdown: 0 }).unwrap();
    engine.advance(COMPLETION_DISPLAY_MS);
    assert_eq!(current(&engine, 0).0, Phase::Paused);
    assert_eq!(current(&engine, 1).0, Phase::Idle);
    assert_eq!(engine.countdown(1).unwrap().remaining_seconds, 3);
}

#[test]
fn parallel_sequences_ignore_pauses() {
    let mut session = parallel(&[4]);
    session.pauses = vec![Pause::default()];
    session.pauses[0].interval.duration = Hms::from_seconds(30);
    let (mut engine, _sink) = boot(session);
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert_eq!(engine.countdown(0).unwrap().sequence.len(), 1);
    engine.advance(4000);
    assert_eq!(current(&engine, 0).0, Phase::Completed);
}

#[test]
fn removing_a_timer_keeps_later_countdowns_running() {
    let (mut engine, _sink) = boot(parallel(&[5, 5, 10]));
    engine.execute(Command::Start { countdown: 2 }).unwrap();
    engine.advance(2000);

    engine.execute(Command::RemoveTimer { index: 1 }).unwrap();
    assert_eq!(engine.session().timers.len(), 2);
    assert_eq!(engine.session().countdowns.len(), 2);
    assert_eq!(current(&engine, 1), (Phase::Running, Some(ItemRef::timer(1)), 8));

    engine.advance(1000);
    assert_eq!(engine.countdown(1).unwrap().remaining_seconds, 7);
}

#[test]
fn the_first_and_only_timers_cannot_be_removed() {
    let (mut engine, _sink) = boot(serial(&[5, 5], &[], 0));
    engine.execute(Command::RemoveTimer { index: 0 }).unwrap();
    assert_eq!(engine.session().timers.len(), 2);
    assert_eq!(
        engine.execute(Command::RemoveTimer { index: 7 }),
        Err(CommandError::UnknownTimer(7))
    );

    engine.execute(Command::RemoveTimer { index: 1 }).unwrap();
    assert_eq!(engine.session().timers.len(), 1);
    engine.execute(Command::RemoveTimer { index: 0 }).unwrap();
    assert_eq!(engine.session().timers.len(), 1);
}

#[test]
fn adding_a_timer_in_parallel_adds_a_countdown() {
    let (mut engine, _sink) = boot(parallel(&[5]));
    engine.execute(Command::AddTimer).unwrap();
    let session = engine.session();
    assert_eq!(session.timers.len(), 2);
    assert_eq!(session.timers[1].name, "Timer 2");
    assert_eq!(session.timers[1].interval.beep_at, 5);
    assert_eq!(session.countdowns.len(), 2);
}

#[test]
fn edits_while_running_do_not_touch_the_frozen_sequence() {
    let (mut engine, sink) = boot(serial(&[10], &[], 0));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    sink.clear();
    engine
        .execute(Command::SetDuration {
            item: ItemRef::timer(0),
            duration: Hms::new(0, 5, 0),
        })
        .unwrap();
    assert_eq!(engine.countdown(0).unwrap().total_seconds, 10);
    assert!(sink.displays().is_empty());

    engine.execute(Command::Reset { countdown: 0 }).unwrap();
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 300);
}

#[test]
fn appearance_and_beep_threshold_setters() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine
        .execute(Command::SetAppearance {
            item: ItemRef::pause(0),
            appearance: Appearance {
                color: Some("#123456".into()),
                alpha: Some(3.0),
                direction: Some(crate::state::Direction::Left),
            },
        })
        .unwrap();
    engine
        .execute(Command::SetBeepAt {
            item: ItemRef::timer(0),
            beep_at: 7,
        })
        .unwrap();
    engine
        .execute(Command::SetName {
            index: 0,
            name: "  ".into(),
        })
        .unwrap();

    let session = engine.session();
    assert_eq!(session.pauses[0].interval.color, "#123456");
    assert_eq!(session.pauses[0].interval.alpha, 1.0);
    assert_eq!(session.timers[0].interval.beep_at, 5);
    assert_eq!(session.timers[0].name, "Timer 1");
    assert_eq!(
        engine.execute(Command::SetName {
            index: 3,
            name: "x".into()
        }),
        Err(CommandError::UnknownTimer(3))
    );
}

#[test]
fn unknown_countdowns_are_rejected() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    assert_eq!(
        engine.execute(Command::Start { countdown: 1 }),
        Err(CommandError::UnknownCountdown(1))
    );
}

#[test]
fn switching_mode_stops_everything() {
    let (mut engine, _sink) = boot(serial(&[10, 20, 30], &[], 5));
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(6000);

    engine.execute(Command::SetMode(Mode::Parallel)).unwrap();
    let session = engine.session();
    assert_eq!(session.countdowns.len(), 3);
    assert!(session.countdowns.iter().all(|c| c.phase == Phase::Idle));
    assert_eq!(session.countdowns[2].remaining_seconds, 30);
    assert_eq!(engine.clock().pending(), 0);
    assert_eq!(engine.pending_effects(), 0);
}

#[test]
fn clearing_saved_state_starts_over() {
    let backend = MemoryBackend::new();
    let (mut engine, _sink) = boot_at(serial(&[10, 20], &[5], 0), T0, &backend);
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    assert!(backend.get(SESSION_KEY).unwrap().is_some());

    engine.execute(Command::ClearSavedState).unwrap();
    assert!(backend.get(SESSION_KEY).unwrap().is_none());
    assert_eq!(engine.session().timers.len(), 1);
    assert_eq!(current(&engine, 0).0, Phase::Idle);
}

#[test]
fn running_countdowns_resume_after_restart() {
    let backend = MemoryBackend::new();
    let (mut engine, _sink) = boot_at(serial(&[100], &[], 0), T0, &backend);
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(10_000);
    drop(engine);

    let sink = RecordingSink::new();
    let mut engine = Engine::restore(
        ManualClock::new(T0 + 40_000),
        Store::new(Box::new(backend.clone())),
        AlertDispatcher::with_sink(sink.clone()),
        Mode::Serial,
    );
    assert_eq!(current(&engine, 0), (Phase::Running, Some(ItemRef::timer(0)), 60));
    engine.advance(1000);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 59);
}

#[test]
fn countdowns_that_finished_while_away_show_completion() {
    let backend = MemoryBackend::new();
    let (mut engine, _sink) = boot_at(serial(&[10], &[], 0), T0, &backend);
    engine.execute(Command::Start { countdown: 0 }).unwrap();
    drop(engine);

    let sink = RecordingSink::new();
    let mut engine = Engine::restore(
        ManualClock::new(T0 + 60_000),
        Store::new(Box::new(backend.clone())),
        AlertDispatcher::with_sink(sink.clone()),
        Mode::Serial,
    );
    assert_eq!(current(&engine, 0).0, Phase::Completed);
    assert!(sink.displays().iter().any(|d| d.completed));

    engine.advance(COMPLETION_DISPLAY_MS);
    assert_eq!(current(&engine, 0).0, Phase::Idle);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 10);
}

#[test]
fn nothing_saved_means_a_fresh_session() {
    let engine = Engine::restore(
        ManualClock::new(T0),
        Store::memory(),
        AlertDispatcher::with_sink(RecordingSink::new()),
        Mode::Parallel,
    );
    assert_eq!(engine.session().mode, Mode::Parallel);
    assert_eq!(engine.session().timers.len(), 1);
    assert_eq!(engine.session().countdowns.len(), 1);
}

#[test]
fn scheduled_start_fires_once_with_three_beeps() {
    let (mut engine, sink) = boot_at(serial(&[30], &[], 0), 0, &MemoryBackend::new());
    let at = NaiveTime::from_hms_opt(0, 0, 3).unwrap();
    engine
        .execute(Command::Schedule {
            countdown: 0,
            at: Some(at),
        })
        .unwrap();

    engine.advance(2000);
    assert_eq!(current(&engine, 0).0, Phase::Idle);

    engine.advance(1000);
    assert_eq!(current(&engine, 0).0, Phase::Running);
    assert_eq!(engine.countdown(0).unwrap().scheduled_start, None);

    engine.advance(2 * SCHEDULED_START_BEEP_MS);
    assert_eq!(sink.count(AlertKind::Beep), 3);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 30);

    engine.advance(60_000);
    assert_eq!(sink.count(AlertKind::Beep), 3);
}

#[test]
fn clearing_a_schedule_disarms_it() {
    let (mut engine, _sink) = boot_at(serial(&[30], &[], 0), 0, &MemoryBackend::new());
    let at = NaiveTime::from_hms_opt(0, 0, 3).unwrap();
    engine
        .execute(Command::Schedule {
            countdown: 0,
            at: Some(at),
        })
        .unwrap();
    engine
        .execute(Command::Schedule {
            countdown: 0,
            at: None,
        })
        .unwrap();
    engine.advance(10_000);
    assert_eq!(current(&engine, 0).0, Phase::Idle);
    assert_eq!(engine.clock().pending(), 0);
}

#[test]
fn scheduled_start_across_midnight() {
    let day = 86_400_000;
    let (mut engine, _sink) = boot_at(serial(&[30], &[], 0), day - 2000, &MemoryBackend::new());
    engine
        .execute(Command::Schedule {
            countdown: 0,
            at: Some(NaiveTime::MIN),
        })
        .unwrap();
    engine.advance(1000);
    assert_eq!(current(&engine, 0).0, Phase::Idle);
    engine.advance(1000);
    assert_eq!(current(&engine, 0).0, Phase::Running);
}

#[test]
fn crossing_detection() {
    let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();
    assert!(crossed(t(9, 59, 59), t(10, 0, 0), t(10, 0, 0)));
    assert!(crossed(t(9, 59, 58), t(10, 0, 5), t(10, 0, 0)));
    assert!(!crossed(t(10, 0, 0), t(10, 0, 1), t(10, 0, 0)));
    assert!(crossed(t(23, 59, 59), t(0, 0, 1), t(0, 0, 0)));
    assert!(!crossed(t(23, 59, 59), t(0, 0, 1), t(12, 0, 0)));
}

#[test]
fn pauses_without_a_timer_before_them_are_rejected() {
    let (mut engine, _sink) = boot(serial(&[10, 10], &[], 0));
    for index in [2, 1_000_000_000, usize::MAX] {
        let item = ItemRef::pause(index);
        assert_eq!(
            engine.execute(Command::SetDuration { item, duration: Hms::new(0, 0, 30) }),
            Err(CommandError::UnknownTimer(index))
        );
        assert_eq!(
            engine.execute(Command::AdjustTime { item, unit: TimeUnit::Seconds, delta: 5 }),
            Err(CommandError::UnknownTimer(index))
        );
        assert_eq!(
            engine.execute(Command::SetAppearance { item, appearance: Appearance::default() }),
            Err(CommandError::UnknownTimer(index))
        );
    }

    engine
        .execute(Command::SetDuration { item: ItemRef::pause(1), duration: Hms::new(0, 0, 30) })
        .unwrap();
    assert_eq!(engine.session().pauses.len(), 2);
}

#[test]
fn oversized_reminder_durations_are_capped() {
    let (mut engine, _sink) = boot(serial(&[60], &[], 0));
    engine
        .execute(Command::SetReminders {
            index: 0,
            reminders: ReminderConfig {
                custom: vec![CustomReminder {
                    before_end: Hms::from_seconds(58),
                    effects: reminder_effects(true, false, None),
                }],
                every: EveryReminder::default(),
                duration: u64::MAX / 2,
            },
        })
        .unwrap();
    assert_eq!(engine.session().timers[0].reminders.duration, MAX_REMINDER_DURATION);

    engine.execute(Command::Start { countdown: 0 }).unwrap();
    engine.advance(2000);
    assert_eq!(engine.flash(0), Flash::Warning);
    assert_eq!(engine.pending_effects(), 1);
}

#[test]
fn restored_sessions_are_clamped() {
    let backend = MemoryBackend::new();
    let mut session = serial(&[60], &[], 0);
    session.timers[0].reminders.duration = u64::MAX;
    session.timers[0].interval.duration = Hms::new(u64::MAX, 75, 0);
    let mut store = Store::new(Box::new(backend.clone()));
    store.save(&session, T0);

    let engine = Engine::restore(
        ManualClock::new(T0),
        Store::new(Box::new(backend)),
        AlertDispatcher::with_sink(RecordingSink::new()),
        Mode::Serial,
    );
    let capped = Hms::new(MAX_HOURS, 59, 0);
    let timer = &engine.session().timers[0];
    assert_eq!(timer.reminders.duration, MAX_REMINDER_DURATION);
    assert_eq!(timer.interval.duration, capped);
    assert_eq!(engine.countdown(0).unwrap().total_seconds, capped.to_seconds());
}

#[test]
fn huge_durations_are_capped() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine
        .execute(Command::SetDuration {
            item: ItemRef::timer(0),
            duration: Hms::clamped(i64::MAX, 0, 0),
        })
        .unwrap();
    assert_eq!(engine.countdown(0).unwrap().total_seconds, MAX_HOURS * 3600);

    engine
        .execute(Command::SetDuration {
            item: ItemRef::timer(0),
            duration: Hms::new(u64::MAX, 0, 0),
        })
        .unwrap();
    engine
        .execute(Command::AdjustTime {
            item: ItemRef::timer(0),
            unit: TimeUnit::Hours,
            delta: i64::MAX,
        })
        .unwrap();
    assert_eq!(engine.session().timers[0].interval.duration.hours, MAX_HOURS);
}

#[test]
fn reminder_flash_holds_while_an_overlapping_window_is_open() {
    let (mut engine, sink) = boot(serial(&[60], &[], 0));
    engine
        .execute(Command::SetReminders {
            index: 0,
            reminders: ReminderConfig {
                custom: vec![CustomReminder {
                    before_end: Hms::from_seconds(41),
                    effects: reminder_effects(true, false, None),
                }],
                every: EveryReminder {
                    minutes: 0,
                    seconds: 20,
                    effects: reminder_effects(true, false, None),
                },
                duration: 3,
            },
        })
        .unwrap();
    engine.execute(Command::Start { countdown: 0 }).unwrap();

    // Custom reminder at 41s left, every-20s reminder one second later
    engine.advance(19_000);
    assert_eq!(engine.flash(0), Flash::Warning);

    // Custom window has closed, the every window has not
    engine.advance(3000);
    assert_eq!(engine.countdown(0).unwrap().remaining_seconds, 38);
    assert_eq!(engine.flash(0), Flash::Warning);
    assert_eq!(sink.count(AlertKind::FlashStop), 0);

    engine.advance(1000);
    assert_eq!(engine.flash(0), Flash::Off);
    assert_eq!(sink.count(AlertKind::FlashStart), 1);
    assert_eq!(sink.count(AlertKind::FlashStop), 1);
}

#[test]
fn sound_updates_merge_into_current_settings() {
    let (mut engine, _sink) = boot(serial(&[10], &[], 0));
    engine
        .execute(Command::UpdateSound(SoundUpdate {
            sound: Some(SoundChoice::Sample("08cowBell".into())),
            ..Default::default()
        }))
        .unwrap();
    engine
        .execute(Command::UpdateSound(SoundUpdate {
            volume: Some(0.3),
            ..Default::default()
        }))
        .unwrap();
    engine
        .execute(Command::UpdateSound(SoundUpdate {
            enabled: Some(false),
            ..Default::default()
        }))
        .unwrap();

    let session = engine.session();
    assert_eq!(session.sound.sound, SoundChoice::Sample("08cowBell".into()));
    assert_eq!(session.sound.volume, 0.3);
    assert!(!session.sound_enabled);
}
