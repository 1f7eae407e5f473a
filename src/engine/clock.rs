//! Scheduling abstraction for delayed engine wakeups
//!
//! The engine never sleeps. It asks a [`Clock`] to deliver a [`Wakeup`]
//! after a delay and gets back a [`CancelToken`]. The tokio clock posts the
//! wakeup into the engine's event queue; the manual clock keeps it in a
//! queue that tests drain synchronously.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use chrono::{DateTime, Local, NaiveTime, Utc};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::trace;

use super::EngineEvent;

/// Handle to a scheduled wakeup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CancelToken(u64);

/// What a scheduled wakeup is for. The owning countdown is found by token,
/// so wakeups stay valid when countdowns are renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Next one-second tick of a countdown
    Tick,
    /// A reminder side effect registered in the active effects registry
    Effect,
    /// The completion indicator of a finished countdown has been shown long enough
    CompletionElapsed,
    /// Check whether a scheduled start time has been reached
    ScheduleCheck,
}

pub trait Clock {
    /// Wall-clock time in milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;

    fn schedule_after(&mut self, delay_ms: u64, wakeup: Wakeup) -> CancelToken;

    fn cancel(&mut self, token: CancelToken);

    /// Forget bookkeeping for a wakeup that has been delivered
    fn release(&mut self, _token: CancelToken) {}

    /// Local time of day, used for scheduled starts
    fn local_time(&self) -> NaiveTime {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms())
            .map(|utc| utc.with_timezone(&Local).time())
            .unwrap_or_default()
    }
}

/// Clock backed by tokio timers; wakeups arrive on the engine queue
#[derive(Debug)]
pub struct TokioClock {
    events: mpsc::UnboundedSender<EngineEvent>,
    pending: HashMap<CancelToken, JoinHandle<()>>,
    next_token: u64,
}

impl TokioClock {
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            events,
            pending: HashMap::new(),
            next_token: 0,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn schedule_after(&mut self, delay_ms: u64, wakeup: Wakeup) -> CancelToken {
        self.next_token += 1;
        let token = CancelToken(self.next_token);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(delay_ms)).await;
            // Queue closed means the engine has shut down
            let _ = events.send(EngineEvent::Wakeup { token, wakeup });
        });
        self.pending.insert(token, handle);
        token
    }

    fn cancel(&mut self, token: CancelToken) {
        if let Some(handle) = self.pending.remove(&token) {
            handle.abort();
        }
    }

    fn release(&mut self, token: CancelToken) {
        self.pending.remove(&token);
    }
}

/// Deterministic clock for tests. Time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: i64,
    local_offset_ms: i64,
    next_token: u64,
    queue: BTreeMap<(i64, CancelToken), Wakeup>,
    due_at: HashMap<CancelToken, i64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms,
            ..Default::default()
        }
    }

    /// Pretend local time is UTC shifted by `offset_ms`
    pub fn with_local_offset(mut self, offset_ms: i64) -> Self {
        self.local_offset_ms = offset_ms;
        self
    }

    /// Jump the wall clock without delivering anything
    pub fn set_now(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }

    /// Take the earliest wakeup due at or before `until_ms`, moving time to it
    pub fn pop_due(&mut self, until_ms: i64) -> Option<(CancelToken, Wakeup)> {
        let (&(due, token), _) = self.queue.iter().next()?;
        if due > until_ms {
            return None;
        }
        let wakeup = self.queue.remove(&(due, token))?;
        self.due_at.remove(&token);
        self.now_ms = self.now_ms.max(due);
        trace!(?token, ?wakeup, due, "manual clock delivering wakeup");
        Some((token, wakeup))
    }

    /// Number of wakeups still queued
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn schedule_after(&mut self, delay_ms: u64, wakeup: Wakeup) -> CancelToken {
        self.next_token += 1;
        let token = CancelToken(self.next_token);
        let due = self.now_ms.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX));
        self.queue.insert((due, token), wakeup);
        self.due_at.insert(token, due);
        token
    }

    fn cancel(&mut self, token: CancelToken) {
        if let Some(due) = self.due_at.remove(&token) {
            self.queue.remove(&(due, token));
        }
    }

    fn local_time(&self) -> NaiveTime {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms + self.local_offset_ms)
            .map(|utc| utc.time())
            .unwrap_or_default()
    }
}
