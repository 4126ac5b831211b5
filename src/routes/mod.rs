//! API routes
//!
//! The presentation shell talks to the pipeline through these endpoints
//! and never mutates pipeline state directly: it posts sends and reads
//! back the transcript, the in-flight flag and the speaking signal.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::conversation::{Attachment, Turn};
use crate::exchange::{ExchangeCoordinator, SendError};
use crate::playback::Reaction;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ExchangeCoordinator>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub turn: Turn,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub turns: Vec<Turn>,
    pub in_flight: bool,
    pub speaking: bool,
    /// Raised for ~100ms after each assistant turn; the shell picks the
    /// matching reaction animation.
    pub reaction: Option<Reaction>,
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        match self {
            // Empty submissions are a silent no-op at the boundary.
            SendError::EmptyInput => StatusCode::NO_CONTENT.into_response(),
            SendError::Busy => {
                (StatusCode::CONFLICT, "Eine Anfrage läuft bereits").into_response()
            }
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, SendError> {
    let turn = state
        .coordinator
        .send(&request.content, request.attachment)
        .await?;
    Ok(Json(SendResponse { turn }))
}

async fn transcript(State(state): State<AppState>) -> Json<TranscriptResponse> {
    let speaking = *state.coordinator.speaking().borrow();
    let reaction = *state.coordinator.reaction().borrow();
    Json(TranscriptResponse {
        turns: state.coordinator.turns(),
        in_flight: state.coordinator.in_flight(),
        speaking,
        reaction,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(send))
        .route("/v1/transcript", get(transcript))
}
