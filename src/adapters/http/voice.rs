//! Voice command endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::domain::models::ParsedCommand;
use crate::services::VoiceCommandResponse;

/// Body of the voice endpoints.
#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    /// Transcribed command.
    #[serde(default)]
    pub text: Option<String>,
}

impl VoiceRequest {
    fn into_text(self) -> ApiResult<String> {
        match self.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ApiError::bad_request("text is required")),
        }
    }
}

/// `POST /voice/parse`: classify only.
pub async fn parse_command(
    State(state): State<AppState>,
    payload: Result<Json<VoiceRequest>, JsonRejection>,
) -> ApiResult<Json<ParsedCommand>> {
    let Json(req) = payload?;
    let text = req.into_text()?;
    Ok(Json(state.voice.parse(&text)))
}

/// `POST /voice/command`: classify and act.
pub async fn run_command(
    State(state): State<AppState>,
    payload: Result<Json<VoiceRequest>, JsonRejection>,
) -> ApiResult<Json<VoiceCommandResponse>> {
    let Json(req) = payload?;
    let text = req.into_text()?;
    Ok(Json(state.voice.handle(&text).await?))
}
