//! Session persistence with elapsed-time correction on restore

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::{Countdown, Phase, Session};

/// Key the session snapshot is stored under
pub const SESSION_KEY: &str = "countdown-session";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to parse saved session: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("storage backend poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable string key-value storage
pub trait KvBackend: Send {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&mut self, key: &str) -> StoreResult<()>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a half-written snapshot
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory backend. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Saves and restores the session. Never fails towards the caller: every
/// backend or format error is logged and treated as "nothing saved".
pub struct Store {
    backend: Box<dyn KvBackend>,
    key: String,
}

impl Store {
    pub fn new(backend: Box<dyn KvBackend>) -> Self {
        Self {
            backend,
            key: SESSION_KEY.to_string(),
        }
    }

    pub fn memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Write a snapshot stamped with `now_ms`
    pub fn save(&mut self, session: &Session, now_ms: i64) {
        if let Err(e) = self.try_save(session, now_ms) {
            warn!("Failed to save session: {}", e);
        }
    }

    fn try_save(&mut self, session: &Session, now_ms: i64) -> StoreResult<()> {
        let mut snapshot = session.clone();
        snapshot.saved_at = Some(now_ms);
        let json = serde_json::to_string(&snapshot).map_err(StoreError::Serialize)?;
        self.backend.set(&self.key, &json)
    }

    /// Read the last snapshot and correct running countdowns for the time
    /// spent away
    pub fn load(&self, now_ms: i64) -> Option<Session> {
        match self.try_load() {
            Ok(Some(mut session)) => {
                restore_elapsed(&mut session, now_ms);
                session.repair();
                info!(
                    "Restored session with {} timers and {} countdowns",
                    session.timers.len(),
                    session.countdowns.len()
                );
                Some(session)
            }
            Ok(None) => {
                debug!("No saved session found");
                None
            }
            Err(e) => {
                warn!("Failed to load saved session, starting fresh: {}", e);
                None
            }
        }
    }

    fn try_load(&self) -> StoreResult<Option<Session>> {
        let Some(json) = self.backend.get(&self.key)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(StoreError::Deserialize)
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.backend.remove(&self.key) {
            warn!("Failed to clear saved session: {}", e);
        }
    }
}

/// Subtract wall-clock time since the snapshot from ticking countdowns.
/// Paused countdowns keep their exact remaining time.
pub fn restore_elapsed(session: &mut Session, now_ms: i64) {
    let saved_at = session.saved_at;
    for (id, countdown) in session.countdowns.iter_mut().enumerate() {
        if countdown.phase != Phase::Running {
            continue;
        }
        let Some(saved_at) = saved_at else {
            // No timestamp to correct against; do not resume blindly
            *countdown = Countdown::idle(countdown.total_seconds);
            continue;
        };
        let away = (now_ms.saturating_sub(saved_at).max(0) / 1000) as u64;
        countdown.remaining_seconds = countdown.remaining_seconds.saturating_sub(away);
        if countdown.remaining_seconds == 0 {
            info!("Countdown {} finished while away ({}s)", id, away);
            countdown.phase = Phase::Completed;
        } else {
            debug!(
                "Countdown {} resumes with {}s left after {}s away",
                id, countdown.remaining_seconds, away
            );
        }
    }
}
