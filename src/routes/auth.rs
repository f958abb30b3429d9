// Auth routes
// Endpoints: POST /v1/auth/login, POST /v1/auth/guest, GET /v1/auth/me

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{verify_admin_password, Role, SessionToken, Viewer};
use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub role: Role,
    pub can_edit: bool,
}

/// POST /v1/auth/login - Exchange the admin password for an admin session
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionToken>, AppError> {
    if !verify_admin_password(&state.config, &request.password) {
        tracing::warn!("Admin login rejected");
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    tracing::info!("Admin session issued");
    Ok(Json(state.session.issue(Role::Admin)?))
}

/// POST /v1/auth/guest - Read-only session, no password
async fn guest(State(state): State<AppState>) -> Result<Json<SessionToken>, AppError> {
    tracing::info!("Guest session issued");
    Ok(Json(state.session.issue(Role::Guest)?))
}

/// GET /v1/auth/me - Role of the current session
async fn me(viewer: Viewer) -> Json<MeResponse> {
    Json(MeResponse {
        role: viewer.role,
        can_edit: viewer.role.is_admin(),
    })
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/guest", post(guest))
        .route("/v1/auth/me", get(me))
}
