// Routes module

pub mod auth;
pub mod categories;
pub mod expenses;
pub mod health;
pub mod settings;
pub mod transcribe;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::session_extension;
use crate::AppState;

pub use auth::auth_routes;
pub use categories::categories_routes;
pub use expenses::expenses_routes;
pub use health::health_routes;
pub use settings::settings_routes;
pub use transcribe::transcribe_routes;

/// Full application router with CORS, tracing and the session verifier
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let session = state.session.clone();

    Router::new()
        .merge(health_routes())
        .merge(auth_routes())
        .merge(expenses_routes())
        .merge(transcribe_routes())
        .merge(categories_routes())
        .merge(settings_routes())
        .with_state(state)
        .layer(session_extension(session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
