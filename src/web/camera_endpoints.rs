use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use tracing::info;

use super::{ConsoleError, ConsoleResult, SharedState};
use crate::camera_form::{CameraForm, CameraRequest};

#[derive(Debug, Deserialize)]
pub struct EditCameraForm {
    pub camera: String,
    pub cmd: String,
    #[serde(flatten)]
    pub fields: CameraForm,
}

#[derive(Debug, Deserialize)]
pub struct CameraKey {
    pub camera: String,
}

#[derive(Debug, Deserialize)]
pub struct EventKey {
    pub event: String,
}

async fn submit(state: &SharedState, form: &CameraForm) -> ConsoleResult<String> {
    let reply = match form.validate()? {
        CameraRequest::Add(settings) => {
            info!("📷 Adding camera {}", settings.name);
            state.backend.add_camera(&settings).await?
        }
        CameraRequest::Save { key, settings } => {
            info!("📷 Saving camera {} ({})", key, settings.name);
            state.backend.save_camera(&key, &settings).await?
        }
    };
    Ok(reply)
}

/// Camera dialog "Save": adds, or saves when the dialog carries a key
pub async fn add_camera(
    State(state): State<SharedState>,
    Form(form): Form<CameraForm>,
) -> ConsoleResult<String> {
    submit(&state, &form).await
}

pub async fn edit_camera(
    State(state): State<SharedState>,
    Form(form): Form<EditCameraForm>,
) -> ConsoleResult<Response> {
    match form.cmd.as_str() {
        "get" => {
            let record = state.backend.get_camera(&form.camera).await?;
            Ok(Json(record).into_response())
        }
        "save" => {
            let fields = CameraForm {
                key: form.camera,
                ..form.fields
            };
            Ok(submit(&state, &fields).await?.into_response())
        }
        other => Err(ConsoleError::UnknownCommand(other.to_string())),
    }
}

pub async fn delete_camera(
    State(state): State<SharedState>,
    Form(form): Form<CameraKey>,
) -> ConsoleResult<String> {
    info!("🗑️ Deleting camera {}", form.camera);
    Ok(state.backend.delete_camera(&form.camera).await?)
}

pub async fn trigger_camera(
    State(state): State<SharedState>,
    Query(query): Query<CameraKey>,
) -> ConsoleResult<String> {
    info!("🚨 Triggering camera {}", query.camera);
    Ok(state.backend.trigger_camera(&query.camera).await?)
}

/// Deletes an event, stopping its playback first
pub async fn delete_event(
    State(state): State<SharedState>,
    Form(form): Form<EventKey>,
) -> ConsoleResult<String> {
    state.sessions.close(&form.event).await;
    info!("🗑️ Deleting event {}", form.event);
    Ok(state.backend.delete_event(&form.event).await?)
}
