//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Hms, Mode, Session, SoundChoice, TimeUnit};

/// API response structure for endpoints that change the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session: Session,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, session: Session) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            session,
        }
    }

    pub fn ok(message: String, session: Session) -> Self {
        Self::new("ok".to_string(), message, session)
    }
}

/// Status response with server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session: Session,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Local time of day, `HH:MM` or `HH:MM:SS`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub at: String,
}

/// Signed fields so out-of-range input is clamped rather than rejected
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DurationRequest {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl DurationRequest {
    pub fn to_hms(&self) -> Hms {
        Hms::clamped(self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub unit: TimeUnit,
    pub delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeepAtRequest {
    pub beep_at: u64,
}

/// `null` or missing sound clears the override
#[derive(Debug, Clone, Deserialize)]
pub struct TimerSoundRequest {
    #[serde(default)]
    pub sound: Option<SoundChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}
