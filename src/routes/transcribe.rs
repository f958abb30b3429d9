// Transcription routes
// Endpoint: POST /v1/transcribe

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::llm::TRANSCRIPTION_PROMPT;
use crate::AppState;

/// Recorded clips are small, but larger than axum's 2 MB default
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(Deserialize)]
pub struct TranscribeQuery {
    #[serde(default)]
    pub existing_text: String,
}

#[derive(Serialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    /// Text to show for confirmation before extracting
    pub text: String,
}

/// Append a transcript to text the user already typed
pub fn merge_transcript(existing: &str, transcript: &str) -> String {
    if transcript.is_empty() {
        return existing.to_string();
    }
    if existing.trim().is_empty() {
        return transcript.to_string();
    }
    format!("{} \n{}", existing, transcript).trim().to_string()
}

/// POST /v1/transcribe - Speech-to-text for a recorded clip
async fn transcribe(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<TranscribeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::invalid("audio", "Please record audio first"));
    }

    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/wav");
    tracing::info!("Transcribing {} bytes of {}", body.len(), mime_type);

    let transcript = state
        .llm
        .transcribe(&body, mime_type, None, Some(TRANSCRIPTION_PROMPT))
        .await?;

    if transcript.is_empty() {
        tracing::warn!("No transcription returned");
    }

    Ok(Json(TranscribeResponse {
        text: merge_transcript(&query.existing_text, &transcript),
        transcript,
    }))
}

pub fn transcribe_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/transcribe", post(transcribe))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_transcript() {
        assert_eq!(merge_transcript("", "bus 20"), "bus 20");
        assert_eq!(merge_transcript("   ", "bus 20"), "bus 20");
        assert_eq!(merge_transcript("lunch 150", "bus 20"), "lunch 150 \nbus 20");
        assert_eq!(merge_transcript("lunch 150", ""), "lunch 150");
    }
}
