//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/countdowns/:id/start", post(start_handler))
        .route("/countdowns/:id/toggle", post(toggle_handler))
        .route("/countdowns/:id/pause", post(pause_handler))
        .route("/countdowns/:id/resume", post(resume_handler))
        .route("/countdowns/:id/reset", post(reset_handler))
        .route(
            "/countdowns/:id/schedule",
            put(schedule_handler).delete(unschedule_handler),
        )
        .route("/timers", post(add_timer_handler))
        .route("/timers/:index", delete(remove_timer_handler))
        .route("/timers/:index/duration", put(timer_duration_handler))
        .route("/timers/:index/adjust", post(timer_adjust_handler))
        .route("/timers/:index/appearance", put(timer_appearance_handler))
        .route("/timers/:index/beep-at", put(beep_at_handler))
        .route("/timers/:index/name", put(name_handler))
        .route("/timers/:index/reminders", put(reminders_handler))
        .route("/timers/:index/sound", put(timer_sound_handler))
        .route("/pauses/:index/duration", put(pause_duration_handler))
        .route("/pauses/:index/adjust", post(pause_adjust_handler))
        .route("/pauses/:index/appearance", put(pause_appearance_handler))
        .route("/sound", put(sound_handler))
        .route("/mode", put(mode_handler))
        .route("/visibility", put(visibility_handler))
        .route("/state", delete(clear_state_handler))
        .route("/events", get(events_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
