// Health routes
// Endpoints: GET /health, GET /v1/status

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::llm::{provider_status, LlmProvider};
use crate::models::AiSettings;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub app_title: String,
    pub app_icon: String,
    pub store: StoreStatus,
    pub providers: Vec<LlmProvider>,
    pub ai_settings: AiSettings,
    pub debug_mode: bool,
}

/// GET /health - Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /v1/status - Branding, store connectivity and provider configuration
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let store = match state.store.ping().await {
        Ok(()) => StoreStatus {
            connected: true,
            error: None,
        },
        Err(e) => {
            tracing::warn!("Document store ping failed: {}", e);
            StoreStatus {
                connected: false,
                error: Some(e.to_string()),
            }
        }
    };

    Json(StatusResponse {
        app_title: state.config.app_title.clone(),
        app_icon: state.config.app_icon.clone(),
        store,
        providers: provider_status(&state.config, state.llm.as_ref()),
        ai_settings: state.ai_settings.read().await.clone(),
        debug_mode: state.config.debug_mode,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/status", get(status))
}
