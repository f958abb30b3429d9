// AI provider settings selected at runtime

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// LLM vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    OpenAi,
    Gemini,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::OpenAi, ProviderName::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "openai",
            ProviderName::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderName::OpenAi),
            "gemini" => Ok(ProviderName::Gemini),
            other => Err(format!("Unsupported provider: {}", other)),
        }
    }
}

/// Provider and model used for extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiSettings {
    pub provider: ProviderName,
    pub model: String,
    pub updated_at: DateTime<Utc>,
}

/// Models offered per provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderModels {
    pub openai: Vec<String>,
    pub gemini: Vec<String>,
}

/// Request body for PATCH /v1/settings
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsRequest {
    pub provider: Option<ProviderName>,
    pub model: Option<String>,
}
