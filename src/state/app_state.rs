//! Main application state shared by the HTTP handlers

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use super::Session;
use crate::{
    engine::{Command, CommandError, EngineEvent},
    services::alerts::Notification,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Rejected(#[from] CommandError),

    #[error("engine is not running")]
    EngineStopped,
}

/// Handle to the running engine plus server metadata
#[derive(Debug)]
pub struct AppState {
    /// Queue into the engine task
    pub events: mpsc::UnboundedSender<EngineEvent>,
    /// Latest session published by the engine task
    pub session_rx: watch::Receiver<Session>,
    /// Alerts and display updates, for streaming to clients
    pub notifications: broadcast::Sender<Notification>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(
        port: u16,
        host: String,
        events: mpsc::UnboundedSender<EngineEvent>,
        session_rx: watch::Receiver<Session>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            events,
            session_rx,
            notifications,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Send a command to the engine and wait for the resulting session
    pub async fn dispatch(&self, action: &str, command: Command) -> Result<Session, DispatchError> {
        info!("Dispatching {}", action);
        let (reply, response) = oneshot::channel();
        self.events
            .send(EngineEvent::Command { command, reply })
            .map_err(|_| DispatchError::EngineStopped)?;
        let session = response.await.map_err(|_| DispatchError::EngineStopped)??;

        // Update last action tracking
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
        Ok(session)
    }

    /// Latest published session, without going through the engine
    pub fn snapshot(&self) -> Session {
        self.session_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Ask the engine to save and stop, then wait for it
    pub async fn shutdown_engine(&self) {
        let (done, finished) = oneshot::channel();
        if self.events.send(EngineEvent::Shutdown { done }).is_err() {
            warn!("Engine already stopped");
            return;
        }
        if finished.await.is_err() {
            warn!("Engine stopped before confirming shutdown");
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
