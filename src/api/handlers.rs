//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use chrono::NaiveTime;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    engine::{
        command::{Appearance, SoundUpdate},
        Command, ItemRef,
    },
    state::{format_remaining, AppState, DispatchError, ReminderConfig, Session, VisibilitySettings},
};
use super::responses::{
    AdjustRequest, ApiResponse, BeepAtRequest, DurationRequest, HealthResponse, ModeRequest,
    NameRequest, ScheduleRequest, StatusResponse, TimerSoundRequest,
};

type ApiResult = Result<Json<ApiResponse>, StatusCode>;

/// Dispatch a command and wrap the resulting session
async fn run(state: &AppState, action: &str, message: String, command: Command) -> ApiResult {
    match state.dispatch(action, command).await {
        Ok(session) => Ok(Json(ApiResponse::ok(message, session))),
        Err(DispatchError::Rejected(e)) => {
            warn!("{} rejected: {}", action, e);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!("Failed to {}: {}", action, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn remaining_of(session: &Session, id: usize) -> String {
    session
        .countdowns
        .get(id)
        .map(|c| format_remaining(c.remaining_seconds))
        .unwrap_or_default()
}

/// Handle POST /countdowns/:id/start
pub async fn start_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    let response = run(&state, "start", format!("Countdown {} started", id), Command::Start { countdown: id }).await?;
    info!("Countdown {} running with {} left", id, remaining_of(&response.session, id));
    Ok(response)
}

/// Handle POST /countdowns/:id/toggle
pub async fn toggle_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    run(&state, "toggle", format!("Countdown {} toggled", id), Command::Toggle { countdown: id }).await
}

/// Handle POST /countdowns/:id/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    let response = run(&state, "pause", format!("Countdown {} paused", id), Command::Pause { countdown: id }).await?;
    info!("Countdown {} paused with {} left", id, remaining_of(&response.session, id));
    Ok(response)
}

/// Handle POST /countdowns/:id/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    run(&state, "resume", format!("Countdown {} resumed", id), Command::Resume { countdown: id }).await
}

/// Handle POST /countdowns/:id/reset
pub async fn reset_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    run(&state, "reset", format!("Countdown {} reset", id), Command::Reset { countdown: id }).await
}

/// Handle PUT /countdowns/:id/schedule
pub async fn schedule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
    Json(request): Json<ScheduleRequest>,
) -> ApiResult {
    let at = parse_time_of_day(&request.at).ok_or_else(|| {
        warn!("Invalid schedule time: {}", request.at);
        StatusCode::BAD_REQUEST
    })?;
    run(
        &state,
        "schedule",
        format!("Countdown {} scheduled for {}", id, at),
        Command::Schedule { countdown: id, at: Some(at) },
    )
    .await
}

/// Handle DELETE /countdowns/:id/schedule
pub async fn unschedule_handler(State(state): State<Arc<AppState>>, Path(id): Path<usize>) -> ApiResult {
    run(
        &state,
        "unschedule",
        format!("Countdown {} schedule cleared", id),
        Command::Schedule { countdown: id, at: None },
    )
    .await
}

fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .ok()
}

/// Handle POST /timers
pub async fn add_timer_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, "add-timer", "Timer added".to_string(), Command::AddTimer).await
}

/// Handle DELETE /timers/:index
pub async fn remove_timer_handler(State(state): State<Arc<AppState>>, Path(index): Path<usize>) -> ApiResult {
    run(&state, "remove-timer", format!("Timer {} removed", index + 1), Command::RemoveTimer { index }).await
}

/// Handle PUT /timers/:index/duration
pub async fn timer_duration_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<DurationRequest>,
) -> ApiResult {
    set_duration(&state, ItemRef::timer(index), request).await
}

/// Handle PUT /pauses/:index/duration
pub async fn pause_duration_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<DurationRequest>,
) -> ApiResult {
    set_duration(&state, ItemRef::pause(index), request).await
}

async fn set_duration(state: &AppState, item: ItemRef, request: DurationRequest) -> ApiResult {
    let duration = request.to_hms();
    run(
        state,
        "set-duration",
        format!("{:?} {} set to {}", item.kind, item.index, format_remaining(duration.to_seconds())),
        Command::SetDuration { item, duration },
    )
    .await
}

/// Handle POST /timers/:index/adjust
pub async fn timer_adjust_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<AdjustRequest>,
) -> ApiResult {
    adjust_time(&state, ItemRef::timer(index), request).await
}

/// Handle POST /pauses/:index/adjust
pub async fn pause_adjust_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<AdjustRequest>,
) -> ApiResult {
    adjust_time(&state, ItemRef::pause(index), request).await
}

async fn adjust_time(state: &AppState, item: ItemRef, request: AdjustRequest) -> ApiResult {
    run(
        state,
        "adjust-time",
        format!("{:?} {} adjusted", item.kind, item.index),
        Command::AdjustTime {
            item,
            unit: request.unit,
            delta: request.delta,
        },
    )
    .await
}

/// Handle PUT /timers/:index/appearance
pub async fn timer_appearance_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(appearance): Json<Appearance>,
) -> ApiResult {
    let item = ItemRef::timer(index);
    run(&state, "set-appearance", format!("Timer {} appearance updated", index + 1), Command::SetAppearance { item, appearance }).await
}

/// Handle PUT /pauses/:index/appearance
pub async fn pause_appearance_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(appearance): Json<Appearance>,
) -> ApiResult {
    let item = ItemRef::pause(index);
    run(&state, "set-appearance", format!("Pause {} appearance updated", index + 1), Command::SetAppearance { item, appearance }).await
}

/// Handle PUT /timers/:index/beep-at
pub async fn beep_at_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<BeepAtRequest>,
) -> ApiResult {
    run(
        &state,
        "set-beep-at",
        format!("Timer {} warning threshold updated", index + 1),
        Command::SetBeepAt {
            item: ItemRef::timer(index),
            beep_at: request.beep_at,
        },
    )
    .await
}

/// Handle PUT /timers/:index/name
pub async fn name_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<NameRequest>,
) -> ApiResult {
    run(&state, "set-name", format!("Timer {} renamed", index + 1), Command::SetName { index, name: request.name }).await
}

/// Handle PUT /timers/:index/reminders
pub async fn reminders_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(reminders): Json<ReminderConfig>,
) -> ApiResult {
    run(&state, "set-reminders", format!("Timer {} reminders updated", index + 1), Command::SetReminders { index, reminders }).await
}

/// Handle PUT /timers/:index/sound
pub async fn timer_sound_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<TimerSoundRequest>,
) -> ApiResult {
    run(&state, "set-timer-sound", format!("Timer {} sound updated", index + 1), Command::SetTimerSound { index, sound: request.sound }).await
}

/// Handle PUT /sound - Update any of enabled, sound and volume
pub async fn sound_handler(State(state): State<Arc<AppState>>, Json(update): Json<SoundUpdate>) -> ApiResult {
    let message = match update.enabled {
        Some(true) => "Sound enabled",
        Some(false) => "Sound disabled",
        None => "Sound updated",
    };
    run(&state, "set-sound", message.to_string(), Command::UpdateSound(update)).await
}

/// Handle PUT /mode
pub async fn mode_handler(State(state): State<Arc<AppState>>, Json(request): Json<ModeRequest>) -> ApiResult {
    run(&state, "set-mode", format!("Switched to {:?} mode", request.mode), Command::SetMode(request.mode)).await
}

/// Handle PUT /visibility
pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Json(visibility): Json<VisibilitySettings>,
) -> ApiResult {
    run(&state, "set-visibility", "Visibility updated".to_string(), Command::SetVisibility(visibility)).await
}

/// Handle DELETE /state - Forget the saved session
pub async fn clear_state_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, "clear-state", "Saved state cleared".to_string(), Command::ClearSavedState).await
}

/// Handle GET /status - Return the current session and server metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        session: state.snapshot(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /events - Stream alerts and display updates
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Event stream client connected");
    let events = stream::unfold(state.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    let event = Event::default()
                        .event(notification.event_name())
                        .data(notification.to_sse_data());
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagging, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
