use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::backend::{BackendError, CameraBackend};
use crate::camera_form::FormError;
use crate::config::AppConfig;
use crate::frames::{FrameStore, FrameStoreError};
use crate::session::PlaybackSessions;

mod camera_endpoints;
mod pages;
mod playback_endpoints;

pub struct ConsoleState {
    pub sessions: PlaybackSessions,
    pub frames: FrameStore,
    pub backend: Arc<dyn CameraBackend>,
    pub config: AppConfig,
}

pub type SharedState = Arc<ConsoleState>;

/// Everything a console handler can fail with, mapped onto an HTTP answer
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Frames(#[from] FrameStoreError),

    #[error("no playback session for event {0}")]
    NoSession(String),

    #[error("unknown transport action {0:?}")]
    UnknownAction(String),

    #[error("slider value {value} is outside 1..={max}")]
    SeekOutOfRange { value: usize, max: usize },

    #[error("unknown camera command {0:?}")]
    UnknownCommand(String),
}

impl ConsoleError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Form(_)
            | Self::UnknownAction(_)
            | Self::SeekOutOfRange { .. }
            | Self::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Frames(FrameStoreError::InvalidEvent(_)) => StatusCode::BAD_REQUEST,
            Self::Frames(FrameStoreError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Frames(_) | Self::NoSession(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("⚠️ {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Create the console router with all endpoints
pub fn create_console_router(state: ConsoleState) -> Router {
    Router::new()
        .route("/", get(pages::index_handler))
        .route("/static/style.css", get(pages::serve_css))
        .route("/events/:event/play", get(playback_endpoints::play_page))
        .route("/frames/:event/:index", get(playback_endpoints::get_frame))
        .route("/api/playback", get(playback_endpoints::list_sessions))
        .route("/api/playback/:event", get(playback_endpoints::get_snapshot))
        .route("/api/playback/:event/seek", post(playback_endpoints::seek))
        .route("/api/playback/:event/transport/:action", post(playback_endpoints::transport))
        .route("/camera/add", post(camera_endpoints::add_camera))
        .route("/camera/edit", post(camera_endpoints::edit_camera))
        .route("/camera/delete", post(camera_endpoints::delete_camera))
        .route("/camera/trigger", get(camera_endpoints::trigger_camera))
        .route("/events/delete", post(camera_endpoints::delete_event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

pub async fn start_console_server(state: ConsoleState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", state.config.web_port);
    let app = create_console_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Console listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
