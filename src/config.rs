// Configuration - Environment variables
// Values may also come from a local .env file (loaded by dotenvy in main)

use std::env;

use crate::models::ProviderName;

const DEFAULT_OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-5-mini",
];

const DEFAULT_GEMINI_MODELS: &[&str] = &[
    "gemini-pro",
    "gemini-pro-vision",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
];

pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 200_000;

/// Application configuration loaded from environment
#[derive(Clone, Debug)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// OpenAI API key for extraction calls
    pub openai_api_key: Option<String>,
    /// Google API key for Gemini extraction and transcription
    pub google_api_key: Option<String>,
    /// Firebase/GCP project holding the Firestore database
    pub firebase_project_id: Option<String>,
    /// Google Application Credentials path for Firestore
    pub google_application_credentials: Option<String>,
    /// host:port of a local Firestore emulator
    pub firestore_emulator_host: Option<String>,
    pub default_ai_provider: String,
    pub default_ai_model: String,
    pub openai_models: Vec<String>,
    pub gemini_models: Vec<String>,
    /// Gemini model used for speech-to-text
    pub transcription_model: String,
    pub app_title: String,
    pub app_icon: String,
    pub log_level: String,
    pub log_file: String,
    pub debug_mode: bool,
    /// PBKDF2-SHA256 hash of the admin password (hex)
    pub admin_password_hash: Option<String>,
    /// Salt used for the admin password hash (hex)
    pub admin_password_salt: Option<String>,
    pub admin_password_iterations: u32,
    /// Plaintext fallback, only used when hash and salt are absent
    pub admin_password: Option<String>,
    /// Signing key for session tokens
    pub session_secret: Option<String>,
    pub session_ttl_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            openai_api_key: None,
            google_api_key: None,
            firebase_project_id: None,
            google_application_credentials: None,
            firestore_emulator_host: None,
            default_ai_provider: "openai".to_string(),
            default_ai_model: "gpt-5-mini".to_string(),
            openai_models: DEFAULT_OPENAI_MODELS.iter().map(|m| m.to_string()).collect(),
            gemini_models: DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
            transcription_model: "gemini-1.5-flash".to_string(),
            app_title: "Expense Tracker".to_string(),
            app_icon: "💰".to_string(),
            log_level: "info".to_string(),
            log_file: "/tmp/expense-tracker.log".to_string(),
            debug_mode: false,
            admin_password_hash: None,
            admin_password_salt: None,
            admin_password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            admin_password: None,
            session_secret: None,
            session_ttl_hours: 12,
        }
    }
}

/// Read a variable, treating blank values as unset
fn read_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a comma-separated list, dropping empty items
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: read_var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            openai_api_key: read_var("OPENAI_API_KEY"),
            google_api_key: read_var("GOOGLE_API_KEY").or_else(|| read_var("GEMINI_API_KEY")),
            firebase_project_id: read_var("FIREBASE_PROJECT_ID")
                .or_else(|| read_var("GCP_PROJECT_ID")),
            google_application_credentials: read_var("GOOGLE_APPLICATION_CREDENTIALS"),
            firestore_emulator_host: read_var("FIRESTORE_EMULATOR_HOST"),
            default_ai_provider: read_var("DEFAULT_AI_PROVIDER")
                .map(|p| p.to_lowercase())
                .unwrap_or(defaults.default_ai_provider),
            default_ai_model: read_var("DEFAULT_AI_MODEL").unwrap_or(defaults.default_ai_model),
            openai_models: read_var("OPENAI_MODELS")
                .map(|v| parse_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.openai_models),
            gemini_models: read_var("GEMINI_MODELS")
                .map(|v| parse_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.gemini_models),
            transcription_model: read_var("TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.transcription_model),
            app_title: read_var("APP_TITLE").unwrap_or(defaults.app_title),
            app_icon: read_var("APP_ICON").unwrap_or(defaults.app_icon),
            log_level: read_var("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
            log_file: read_var("LOG_FILE").unwrap_or(defaults.log_file),
            debug_mode: read_var("DEBUG_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            admin_password_hash: read_var("ADMIN_PASSWORD_HASH"),
            admin_password_salt: read_var("ADMIN_PASSWORD_SALT"),
            admin_password_iterations: read_var("ADMIN_PASSWORD_ITERATIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PASSWORD_ITERATIONS),
            admin_password: read_var("ADMIN_PASSWORD"),
            session_secret: read_var("SESSION_SECRET"),
            session_ttl_hours: read_var("SESSION_TTL_HOURS")
                .and_then(|v| v.parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(defaults.session_ttl_hours),
        }
    }

    /// Models offered for a provider
    pub fn models_for(&self, provider: ProviderName) -> &[String] {
        match provider {
            ProviderName::OpenAi => &self.openai_models,
            ProviderName::Gemini => &self.gemini_models,
        }
    }

    /// Validate that required configuration is present
    pub fn validate(&self) -> Result<(), String> {
        let provider: ProviderName = self
            .default_ai_provider
            .parse()
            .map_err(|_| format!("Unsupported DEFAULT_AI_PROVIDER: {}", self.default_ai_provider))?;

        if !self.models_for(provider).contains(&self.default_ai_model) {
            tracing::warn!(
                "DEFAULT_AI_MODEL {} is not in the {} model list",
                self.default_ai_model,
                provider
            );
        }
        if self.firebase_project_id.is_none() {
            tracing::warn!("FIREBASE_PROJECT_ID not set - expenses cannot be stored");
        }
        if self.google_application_credentials.is_none() && self.firestore_emulator_host.is_none() {
            tracing::warn!("GOOGLE_APPLICATION_CREDENTIALS not set - Firestore will use default credentials");
        }
        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set - OpenAI extraction will fail");
        }
        if self.google_api_key.is_none() {
            tracing::warn!("GOOGLE_API_KEY not set - Gemini extraction and transcription will fail");
        }
        let has_hash = self.admin_password_hash.is_some() && self.admin_password_salt.is_some();
        if !has_hash && self.admin_password.is_none() {
            tracing::warn!("No admin password configured - only guest (read-only) access is possible");
        }
        if self.session_secret.is_none() {
            tracing::warn!("SESSION_SECRET not set - sessions will not survive a restart");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" gpt-4o, ,gpt-4o-mini ,"),
            vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]
        );
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_defaults_match_provider_lists() {
        let config = Config::default();
        assert_eq!(config.default_ai_provider, "openai");
        assert!(config.models_for(ProviderName::OpenAi).contains(&config.default_ai_model));
        assert!(config
            .models_for(ProviderName::Gemini)
            .contains(&"gemini-1.5-flash".to_string()));
        assert_eq!(config.admin_password_iterations, 200_000);
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let config = Config {
            default_ai_provider: "anthropic".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }
}
