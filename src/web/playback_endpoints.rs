use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{pages, ConsoleError, ConsoleResult, SharedState};
use crate::session::{spawn_session, SessionHandle, TransportCommand};

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub value: usize,
}

async fn session_for(state: &SharedState, event: &str) -> ConsoleResult<SessionHandle> {
    state
        .sessions
        .get(event)
        .await
        .ok_or_else(|| ConsoleError::NoSession(event.to_string()))
}

/// Playback page; opens the event's session if it is not running yet
pub async fn play_page(
    Path(event): Path<String>,
    State(state): State<SharedState>,
) -> ConsoleResult<impl IntoResponse> {
    let frames = state.frames.load(&event).await?;
    let period = state.config.frame_interval();
    let depth = state.config.command_queue_depth;

    let session = state
        .sessions
        .get_or_open(&event, || spawn_session(frames, period, depth))
        .await;

    info!("📼 Playback page for event {} ({} frames)", event, session.frames().len());
    Ok(Html(pages::generate_player_html(&session.snapshot())))
}

/// Frame bytes. While a session is open the frame list it was started with is
/// used, so indices keep pointing at the frames the player shows.
pub async fn get_frame(
    Path((event, index)): Path<(String, usize)>,
    State(state): State<SharedState>,
) -> ConsoleResult<impl IntoResponse> {
    let (bytes, content_type) = match state.sessions.get(&event).await {
        Some(session) => session.frames().read(index).await?,
        None => state.frames.read_frame(&event, index).await?,
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

pub async fn list_sessions(State(state): State<SharedState>) -> impl IntoResponse {
    let sessions: Vec<_> = state
        .sessions
        .list()
        .await
        .into_iter()
        .map(|(event, opened_at)| json!({ "event": event, "opened_at": opened_at.to_rfc3339() }))
        .collect();

    Json(json!({
        "code": 200,
        "message": "OK",
        "data": {
            "sessions": sessions,
            "count": sessions.len()
        }
    }))
}

pub async fn get_snapshot(
    Path(event): Path<String>,
    State(state): State<SharedState>,
) -> ConsoleResult<impl IntoResponse> {
    let session = session_for(&state, &event).await?;
    Ok(Json(session.snapshot()))
}

pub async fn transport(
    Path((event, action)): Path<(String, String)>,
    State(state): State<SharedState>,
) -> ConsoleResult<impl IntoResponse> {
    let command =
        TransportCommand::from_action(&action).ok_or_else(|| ConsoleError::UnknownAction(action.clone()))?;

    if command == TransportCommand::Dispose {
        if !state.sessions.close(&event).await {
            return Err(ConsoleError::NoSession(event));
        }
    } else {
        let session = session_for(&state, &event).await?;
        if !session.send(command).await {
            return Err(ConsoleError::NoSession(event));
        }
    }

    Ok(Json(json!({
        "code": 200,
        "message": "OK",
        "data": { "event": event, "action": action }
    })))
}

pub async fn seek(
    Path(event): Path<String>,
    State(state): State<SharedState>,
    Json(request): Json<SeekRequest>,
) -> ConsoleResult<impl IntoResponse> {
    let session = session_for(&state, &event).await?;

    let max = session.snapshot().num_frames;
    if request.value < 1 || request.value > max {
        return Err(ConsoleError::SeekOutOfRange {
            value: request.value,
            max,
        });
    }

    if !session.send(TransportCommand::Seek(request.value)).await {
        return Err(ConsoleError::NoSession(event));
    }

    Ok(Json(json!({
        "code": 200,
        "message": "OK",
        "data": { "event": event, "value": request.value }
    })))
}
