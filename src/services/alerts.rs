//! Alert dispatching: flash, beep and message events plus per-tick display updates
//!
//! The engine decides when something should be seen or heard; sinks own the
//! actual output. Sink failures are logged here and never reach the tick loop.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    engine::sequence::ItemRef,
    state::{Direction, Phase, SoundChoice},
};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert output unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    FlashStart,
    FlashStop,
    Beep,
    MessageShow,
    MessageHide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AlertPayload {
    Sound { sound: SoundChoice, volume: f64 },
    Message { text: String },
}

/// A discrete, fire-and-forget alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub countdown: usize,
    pub kind: AlertKind,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<AlertPayload>,
}

/// What the countdown display should show right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    pub countdown: usize,
    pub item: Option<ItemRef>,
    pub phase: Phase,
    pub remaining_seconds: u64,
    pub total_seconds: u64,
    pub percentage: f64,
    pub color: String,
    pub alpha: f64,
    pub direction: Direction,
    /// False when the progress bar must jump without a transition
    pub animate: bool,
    /// Show the completion indicator
    pub completed: bool,
}

/// Everything the engine publishes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Notification {
    Alert(AlertEvent),
    Display(DisplayUpdate),
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::Alert(_) => "alert",
            Notification::Display(_) => "display",
        }
    }

    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub trait AlertSink: Send {
    fn alert(&self, event: &AlertEvent) -> Result<(), AlertError>;
}

pub trait DisplaySink: Send {
    fn display(&self, update: &DisplayUpdate);
}

/// Publishes notifications on a broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: broadcast::Sender<Notification>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelSink {
    fn alert(&self, event: &AlertEvent) -> Result<(), AlertError> {
        // No subscribers is not a failure; nobody is listening right now
        let _ = self.tx.send(Notification::Alert(event.clone()));
        Ok(())
    }
}

impl DisplaySink for ChannelSink {
    fn display(&self, update: &DisplayUpdate) {
        let _ = self.tx.send(Notification::Display(update.clone()));
    }
}

/// Keeps every notification in memory; used by tests and tooling
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Alert(event) => Some(event),
                Notification::Display(_) => None,
            })
            .collect()
    }

    pub fn displays(&self) -> Vec<DisplayUpdate> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Display(update) => Some(update),
                Notification::Alert(_) => None,
            })
            .collect()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts().iter().filter(|a| a.kind == kind).count()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    fn push(&self, notification: Notification) -> Result<(), AlertError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| AlertError::Unavailable("recording log poisoned".to_string()))?;
        log.push(notification);
        Ok(())
    }
}

impl AlertSink for RecordingSink {
    fn alert(&self, event: &AlertEvent) -> Result<(), AlertError> {
        self.push(Notification::Alert(event.clone()))
    }
}

impl DisplaySink for RecordingSink {
    fn display(&self, update: &DisplayUpdate) {
        if let Err(e) = self.push(Notification::Display(update.clone())) {
            warn!("Dropping display update: {}", e);
        }
    }
}

/// Turns engine decisions into alert events and hands them to the sinks
pub struct AlertDispatcher {
    alerts: Box<dyn AlertSink>,
    display: Box<dyn DisplaySink>,
}

impl AlertDispatcher {
    pub fn new(alerts: Box<dyn AlertSink>, display: Box<dyn DisplaySink>) -> Self {
        Self { alerts, display }
    }

    /// One sink serving both alerts and display updates
    pub fn with_sink<S>(sink: S) -> Self
    where
        S: AlertSink + DisplaySink + Clone + 'static,
    {
        Self::new(Box::new(sink.clone()), Box::new(sink))
    }

    pub fn flash_start(&self, countdown: usize, critical: bool) {
        self.send(AlertEvent {
            countdown,
            kind: AlertKind::FlashStart,
            critical,
            payload: None,
        });
    }

    pub fn flash_stop(&self, countdown: usize) {
        self.send(AlertEvent {
            countdown,
            kind: AlertKind::FlashStop,
            critical: false,
            payload: None,
        });
    }

    /// Beep with `sound`. The final alert swaps the default double beep for
    /// the longer alarm.
    pub fn beep(&self, countdown: usize, sound: SoundChoice, volume: f64, last: bool) {
        let sound = match sound {
            SoundChoice::DoubleBeep if last => SoundChoice::Alarm,
            other => other,
        };
        self.send(AlertEvent {
            countdown,
            kind: AlertKind::Beep,
            critical: last,
            payload: Some(AlertPayload::Sound { sound, volume }),
        });
    }

    pub fn message_show(&self, countdown: usize, text: &str) {
        self.send(AlertEvent {
            countdown,
            kind: AlertKind::MessageShow,
            critical: false,
            payload: Some(AlertPayload::Message { text: text.to_string() }),
        });
    }

    pub fn message_hide(&self, countdown: usize) {
        self.send(AlertEvent {
            countdown,
            kind: AlertKind::MessageHide,
            critical: false,
            payload: None,
        });
    }

    pub fn display(&self, update: &DisplayUpdate) {
        self.display.display(update);
    }

    fn send(&self, event: AlertEvent) {
        debug!("Alert for countdown {}: {:?}", event.countdown, event.kind);
        if let Err(e) = self.alerts.alert(&event) {
            warn!("Failed to deliver {:?} alert: {}", event.kind, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSpeaker;

    impl AlertSink for BrokenSpeaker {
        fn alert(&self, _event: &AlertEvent) -> Result<(), AlertError> {
            Err(AlertError::Unavailable("no audio device".into()))
        }
    }

    #[test]
    fn final_beep_upgrades_default_sound() {
        let sink = RecordingSink::new();
        let dispatcher = AlertDispatcher::with_sink(sink.clone());
        dispatcher.beep(0, SoundChoice::DoubleBeep, 0.7, true);
        dispatcher.beep(0, SoundChoice::Sample("08cowBell".into()), 0.5, true);
        dispatcher.beep(0, SoundChoice::DoubleBeep, 0.7, false);

        let sounds: Vec<SoundChoice> = sink
            .alerts()
            .into_iter()
            .filter_map(|a| match a.payload {
                Some(AlertPayload::Sound { sound, .. }) => Some(sound),
                _ => None,
            })
            .collect();
        assert_eq!(
            sounds,
            vec![
                SoundChoice::Alarm,
                SoundChoice::Sample("08cowBell".into()),
                SoundChoice::DoubleBeep
            ]
        );
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let display = RecordingSink::new();
        let dispatcher = AlertDispatcher::new(Box::new(BrokenSpeaker), Box::new(display));
        dispatcher.flash_start(0, true);
        dispatcher.beep(0, SoundChoice::DoubleBeep, 0.7, false);
    }

    #[test]
    fn channel_sink_tolerates_missing_subscribers() {
        let (tx, _) = broadcast::channel(4);
        let sink = ChannelSink::new(tx.clone());
        assert!(sink.alert(&AlertEvent {
            countdown: 0,
            kind: AlertKind::FlashStop,
            critical: false,
            payload: None,
        })
        .is_ok());

        let mut rx = tx.subscribe();
        sink.alert(&AlertEvent {
            countdown: 1,
            kind: AlertKind::MessageHide,
            critical: false,
            payload: None,
        })
        .unwrap();
        assert!(matches!(
            rx.try_recv(),
            Ok(Notification::Alert(AlertEvent { countdown: 1, .. }))
        ));
    }

    #[test]
    fn poisoned_recording_log_reports_unavailable() {
        let sink = RecordingSink::new();
        let log = Arc::clone(&sink.log);
        let _ = std::thread::spawn(move || {
            let _guard = log.lock().unwrap();
            panic!("recorder crashed");
        })
        .join();

        let result = sink.alert(&AlertEvent {
            countdown: 0,
            kind: AlertKind::Beep,
            critical: false,
            payload: None,
        });
        assert!(matches!(result, Err(AlertError::Unavailable(_))));
    }
}
