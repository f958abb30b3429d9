// LLM Client - OpenAI and Gemini REST APIs
// Chat completions for extraction, Gemini generateContent for speech-to-text

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{LanguageModel, TRANSCRIPTION_PROMPT};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::ProviderName;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// All text of the first candidate, concatenated
    fn first_candidate_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }

    /// First non-empty text part across all candidates
    fn first_text_part(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .find(|t| !t.trim().is_empty())
    }
}

/// Models that reject an explicit temperature and only run with the default
fn supports_temperature(model: &str) -> bool {
    let model = model.to_lowercase();
    !(model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4"))
}

/// Browsers record opus in webm/ogg containers without saying so
fn normalize_audio_mime(mime_type: &str) -> String {
    let trimmed = mime_type.trim();
    match trimmed.to_lowercase().as_str() {
        "" => "audio/wav".to_string(),
        "audio/webm" => "audio/webm;codecs=opus".to_string(),
        "audio/ogg" => "audio/ogg;codecs=opus".to_string(),
        _ => trimmed.to_string(),
    }
}

/// REST client for the supported LLM vendors
pub struct LlmClient {
    client: Client,
    openai_api_key: Option<String>,
    google_api_key: Option<String>,
    transcription_model: String,
    gemini_base: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            openai_api_key: config.openai_api_key.clone(),
            google_api_key: config.google_api_key.clone(),
            transcription_model: config.transcription_model.clone(),
            gemini_base: GEMINI_API_BASE.to_string(),
        })
    }

    fn openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("OPENAI_API_KEY not configured.".to_string()))
    }

    fn google_key(&self) -> Result<&str> {
        self.google_api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("GOOGLE_API_KEY not configured.".to_string()))
    }

    async fn call_openai(&self, model: &str, prompt: &str) -> Result<String> {
        let api_key = self.openai_key()?;

        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: supports_temperature(model).then_some(0.0),
        };

        tracing::info!("Calling OpenAI chat completion with model: {}", model);

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_BASE))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI API error {}: {}", status, error_text);
            return Err(AppError::Llm(format!(
                "OpenAI API error {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("No completion choices returned".to_string()))?;

        tracing::info!("OpenAI completion returned {} characters", content.len());
        Ok(content)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> Result<GenerateContentResponse> {
        let api_key = self.google_key()?;

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.gemini_base, model))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error {}: {}", status, error_text);
            return Err(AppError::Llm(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    async fn call_gemini(&self, model: &str, prompt: &str) -> Result<String> {
        tracing::info!("Calling Gemini generateContent with model: {}", model);

        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.0}
        });

        let response = self.generate_content(model, &body).await?;
        let content = response
            .first_candidate_text()
            .ok_or_else(|| AppError::Llm("No candidates returned".to_string()))?;

        tracing::info!("Gemini completion returned {} characters", content.len());
        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, provider: ProviderName, model: &str, prompt: &str) -> Result<String> {
        match provider {
            ProviderName::OpenAi => self.call_openai(model, prompt).await,
            ProviderName::Gemini => self.call_gemini(model, prompt).await,
        }
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        model: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<String> {
        let model = model.unwrap_or(self.transcription_model.as_str());
        let mime_type = normalize_audio_mime(mime_type);
        let prompt = prompt.unwrap_or(TRANSCRIPTION_PROMPT);

        tracing::info!(
            "Transcribing {} bytes of {} audio with {}",
            audio.len(),
            mime_type,
            model
        );

        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime_type, "data": encoded}},
                    {"text": prompt}
                ]
            }]
        });

        let response = self.generate_content(model, &body).await?;
        Ok(response
            .first_text_part()
            .map(|t| t.trim().to_string())
            .unwrap_or_default())
    }

    fn is_configured(&self, provider: ProviderName) -> bool {
        match provider {
            ProviderName::OpenAi => self.openai_api_key.is_some(),
            ProviderName::Gemini => self.google_api_key.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_audio_mime() {
        assert_eq!(normalize_audio_mime("audio/webm"), "audio/webm;codecs=opus");
        assert_eq!(normalize_audio_mime("audio/ogg"), "audio/ogg;codecs=opus");
        assert_eq!(normalize_audio_mime(""), "audio/wav");
        assert_eq!(normalize_audio_mime("audio/mpeg"), "audio/mpeg");
        assert_eq!(
            normalize_audio_mime("audio/webm;codecs=opus"),
            "audio/webm;codecs=opus"
        );
    }

    #[test]
    fn test_temperature_is_omitted_for_default_only_models() {
        assert!(supports_temperature("gpt-4o-mini"));
        assert!(!supports_temperature("gpt-5-mini"));
        assert!(!supports_temperature("o3-mini"));

        let request = ChatCompletionRequest {
            model: "gpt-5-mini",
            messages: vec![],
            temperature: supports_temperature("gpt-5-mini").then_some(0.0),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_gemini_response_text_extraction() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "  "}, {"text": " 20 rupiya chai "}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(response.first_text_part(), Some(" 20 rupiya chai "));
        assert_eq!(
            response.first_candidate_text().as_deref(),
            Some("   20 rupiya chai ")
        );

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.first_text_part().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = LlmClient::new(&Config::default()).unwrap();
        assert!(!client.is_configured(ProviderName::OpenAi));

        let err = client
            .complete(ProviderName::OpenAi, "gpt-4o", "hi")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_API_KEY not configured.");

        let err = client.transcribe(b"abc", "audio/wav", None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_gemini_failure_does_not_expose_api_key() {
        let config = Config {
            google_api_key: Some("gemini-secret-key-123".to_string()),
            ..Config::default()
        };
        let mut client = LlmClient::new(&config).unwrap();
        // Nothing listens on the discard port
        client.gemini_base = "http://127.0.0.1:9/v1beta".to_string();

        let err = client
            .complete(ProviderName::Gemini, "gemini-1.5-flash", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
        assert!(!err.to_string().contains("gemini-secret-key-123"));
        assert!(!err.to_string().contains("127.0.0.1:9"));

        let err = client
            .transcribe(b"abc", "audio/wav", None, None)
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("gemini-secret-key-123"));
    }
}
