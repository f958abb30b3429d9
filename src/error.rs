// Error types shared by services, the document store and HTTP handlers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{name}' already exists")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("{0}")]
    BusinessRule(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    NotConfigured(String),

    #[error("LLM service error: {0}")]
    Llm(String),

    #[error("Document store error: {0}")]
    Store(String),

    #[error("HTTP request error: {0}")]
    Http(reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

// Request URLs can carry credentials, so they never reach error text
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Http(err.without_url())
    }
}

impl AppError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: &'static str, name: impl Into<String>) -> Self {
        AppError::AlreadyExists {
            entity,
            name: name.into(),
        }
    }

    /// Stable machine-readable code returned alongside the message
    pub fn code(&self) -> String {
        match self {
            AppError::NotFound { entity, .. } => {
                format!("{}_NOT_FOUND", entity.to_uppercase())
            }
            AppError::AlreadyExists { entity, .. } => {
                format!("{}_ALREADY_EXISTS", entity.to_uppercase())
            }
            AppError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            AppError::BusinessRule(_) => "BUSINESS_LOGIC_ERROR".to_string(),
            AppError::Unauthorized(_) => "UNAUTHORIZED".to_string(),
            AppError::Forbidden => "FORBIDDEN".to_string(),
            AppError::NotConfigured(_) => "NOT_CONFIGURED".to_string(),
            AppError::Llm(_) => "LLM_ERROR".to_string(),
            AppError::Store(_) => "DATABASE_ERROR".to_string(),
            AppError::Http(_) => "HTTP_ERROR".to_string(),
            AppError::Serialization(_) => "SERIALIZATION_ERROR".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AlreadyExists { .. } | AppError::BusinessRule(_) => StatusCode::CONFLICT,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Llm(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}
