// LLM module

pub mod client;
pub mod prompts;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::models::{ProviderModels, ProviderName};

pub use client::LlmClient;
pub use prompts::*;

/// Text completion and speech-to-text, implemented over vendor REST APIs
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-turn completion of `prompt`
    async fn complete(&self, provider: ProviderName, model: &str, prompt: &str) -> Result<String>;

    /// Transcribe audio with Gemini. Returns "" when the model produced no text.
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        model: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<String>;

    /// Whether an API key is present for the provider
    fn is_configured(&self, provider: ProviderName) -> bool;
}

/// Provider with its selectable models
#[derive(Debug, Clone, Serialize)]
pub struct LlmProvider {
    pub name: ProviderName,
    pub models: Vec<String>,
    pub configured: bool,
}

/// Providers and supported models for selection
pub fn available_providers(config: &Config) -> ProviderModels {
    ProviderModels {
        openai: config.openai_models.clone(),
        gemini: config.gemini_models.clone(),
    }
}

/// Providers annotated with whether their key is configured
pub fn provider_status(config: &Config, llm: &dyn LanguageModel) -> Vec<LlmProvider> {
    ProviderName::ALL
        .iter()
        .map(|&name| LlmProvider {
            name,
            models: config.models_for(name).to_vec(),
            configured: llm.is_configured(name),
        })
        .collect()
}
