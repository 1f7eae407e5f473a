//! Expansion of timers and pauses into an ordered run sequence

use serde::{Deserialize, Serialize};

use crate::state::{Direction, Pause, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Timer,
    Pause,
}

/// Reference back into the timer or pause list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub index: usize,
}

impl ItemRef {
    pub fn timer(index: usize) -> Self {
        Self { kind: ItemKind::Timer, index }
    }

    pub fn pause(index: usize) -> Self {
        Self { kind: ItemKind::Pause, index }
    }
}

/// One countdown step of a run, frozen at start time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceItem {
    #[serde(flatten)]
    pub item: ItemRef,
    pub total_seconds: u64,
    pub color: String,
    pub direction: Direction,
    pub alpha: f64,
}

impl SequenceItem {
    fn from_timer(index: usize, timer: &Timer) -> Self {
        Self {
            item: ItemRef::timer(index),
            total_seconds: timer.total_seconds(),
            color: timer.interval.color.clone(),
            direction: timer.interval.direction,
            alpha: timer.interval.alpha,
        }
    }

    fn from_pause(index: usize, pause: &Pause) -> Self {
        Self {
            item: ItemRef::pause(index),
            total_seconds: pause.total_seconds(),
            color: pause.interval.color.clone(),
            direction: pause.interval.direction,
            alpha: pause.interval.alpha,
        }
    }
}

/// Serial expansion: every timer, each followed by its pause when that pause
/// has a non-zero length. Pauses past the last timer are ignored.
pub fn build_sequence(timers: &[Timer], pauses: &[Pause]) -> Vec<SequenceItem> {
    let mut sequence = Vec::with_capacity(timers.len() * 2);
    for (index, timer) in timers.iter().enumerate() {
        sequence.push(SequenceItem::from_timer(index, timer));
        if let Some(pause) = pauses.get(index).filter(|p| p.total_seconds() > 0) {
            sequence.push(SequenceItem::from_pause(index, pause));
        }
    }
    sequence
}

/// Parallel expansion: timer `index` on its own, with no chained pause
pub fn build_single(timers: &[Timer], index: usize) -> Vec<SequenceItem> {
    timers
        .get(index)
        .map(|timer| vec![SequenceItem::from_timer(index, timer)])
        .unwrap_or_default()
}
