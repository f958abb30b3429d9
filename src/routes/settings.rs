// AI settings routes
// Endpoints: GET /v1/settings, PATCH /v1/settings

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::auth::{AdminUser, Viewer};
use crate::config::Config;
use crate::error::AppError;
use crate::llm::available_providers;
use crate::models::{AiSettings, ProviderModels, UpdateSettingsRequest};
use crate::AppState;

#[derive(Serialize)]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub current: AiSettings,
    pub available_providers: ProviderModels,
}

/// Apply a settings change, keeping the model consistent with the provider.
///
/// Switching provider without naming a model keeps the current model when
/// the new provider offers it, otherwise picks the provider's first model.
pub fn apply_settings_update(
    config: &Config,
    current: &AiSettings,
    request: &UpdateSettingsRequest,
) -> Result<AiSettings, AppError> {
    let provider = request.provider.unwrap_or(current.provider);
    let models = config.models_for(provider);

    let model = match request.model.as_deref().map(str::trim) {
        Some(model) => model.to_string(),
        None if models.contains(&current.model) => current.model.clone(),
        None => models.first().cloned().ok_or_else(|| {
            AppError::NotConfigured(format!("No models configured for {}", provider))
        })?,
    };

    if !models.contains(&model) {
        return Err(AppError::invalid(
            "model",
            format!("Model '{}' is not available for {}", model, provider),
        ));
    }

    Ok(AiSettings {
        provider,
        model,
        updated_at: Utc::now(),
    })
}

/// GET /v1/settings - Current provider/model and the selectable models
async fn get_settings(State(state): State<AppState>, _viewer: Viewer) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        current: state.ai_settings.read().await.clone(),
        available_providers: available_providers(&state.config),
    })
}

/// PATCH /v1/settings - Switch extraction provider and/or model
async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    let mut settings = state.ai_settings.write().await;
    let updated = apply_settings_update(&state.config, &settings, &request)?;
    tracing::info!("AI settings updated: {}/{}", updated.provider, updated.model);
    *settings = updated.clone();

    Ok(Json(SettingsResponse {
        current: updated,
        available_providers: available_providers(&state.config),
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/v1/settings", get(get_settings).patch(update_settings))
}
