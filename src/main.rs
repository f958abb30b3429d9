// Expense Tracker Backend - Rust
// Natural-language and voice expense capture backed by Firestore

use std::fmt::Write as FmtWrite;
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod error;
mod llm;
mod models;
mod routes;
mod services;
mod utils;

use auth::SessionAuth;
use config::Config;
use llm::{LanguageModel, LlmClient};
use models::{AiSettings, ProviderName};
use routes::build_router;
use services::{CategoryService, DocumentStore, FirestoreService};

/// Custom time formatter: [HH:mm:ss] [backend]
#[derive(Clone)]
struct BackendTimer;

impl FormatTime for BackendTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [backend]", now.format("%H:%M:%S"))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub llm: Arc<dyn LanguageModel>,
    pub session: Arc<SessionAuth>,
    /// Provider/model used for extraction, switchable at runtime
    pub ai_settings: Arc<RwLock<AiSettings>>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() {
    // Load environment variables before reading LOG_FILE / LOG_LEVEL
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Log file is optional; stdout logging still works without it
    let (file_writer, _guard) = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(LineWriter::new(file));
            (Some(writer), Some(guard))
        }
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", config.log_file, e);
            (None, None)
        }
    };

    // Format: [HH:mm:ss] [backend] message
    let default_filter = format!("expense_tracker_backend={},tower_http=info", config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        // Stdout layer
        .with(
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(config.debug_mode)
                .with_ansi(true),
        )
        // File layer (same format, no ANSI colors)
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(config.debug_mode)
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let store: Arc<dyn DocumentStore> = match FirestoreService::new(&config).await {
        Ok(fs) => Arc::new(fs),
        Err(e) => {
            tracing::error!("Failed to initialize Firestore: {}", e);
            std::process::exit(1);
        }
    };

    let llm: Arc<dyn LanguageModel> = match LlmClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize LLM client: {}", e);
            std::process::exit(1);
        }
    };

    // Seed default categories on first run
    match CategoryService::new(store.clone()).seed_default_categories().await {
        Ok(created) if !created.is_empty() => {
            tracing::info!("Seeded {} default categories", created.len())
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to seed default categories: {}", e),
    }

    // validate() has already rejected unknown providers
    let provider = config
        .default_ai_provider
        .parse()
        .unwrap_or(ProviderName::OpenAi);
    let ai_settings = AiSettings {
        provider,
        model: config.default_ai_model.clone(),
        updated_at: Utc::now(),
    };

    let state = AppState {
        store,
        llm,
        session: Arc::new(SessionAuth::from_config(&config)),
        ai_settings: Arc::new(RwLock::new(ai_settings)),
        config: Arc::new(config.clone()),
    };

    let app = build_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting {} backend on {}", config.app_title, addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
