// Extraction pipeline: prompt -> LLM -> JSON -> validation -> IST/UTC -> persistence

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::store::DocumentStore;
use crate::error::Result;
use crate::llm::{
    build_extraction_prompt, format_categories_block, LanguageModel, FALLBACK_CATEGORIES_BLOCK,
};
use crate::models::{ExtractionLog, ExtractionResult, ProviderName};
use crate::utils::datetime::{now_ist_iso, parse_to_utc};
use crate::utils::validation::redact_sensitive_data;

const REQUIRED_FIELDS: [&str; 4] = ["amount", "category", "subcategory", "description"];

/// Result of one extract-and-save call. Ids are empty when nothing was written.
#[derive(Debug, Clone)]
pub struct SavedExtraction {
    pub result: ExtractionResult,
    pub expense_id: String,
    pub log_id: String,
}

/// Truthiness of a JSON value the way a loosely-typed model output means it
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strip a surrounding markdown code fence (``` or ```json) if present
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the language tag on the opening line
    match rest.find('\n') {
        Some(idx) if !rest[..idx].trim().contains('{') => rest[idx + 1..].trim(),
        _ => rest.trim(),
    }
}

/// Parse model output into a JSON object, falling back to an invalid result
pub fn parse_model_output(raw_text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(strip_code_fence(raw_text)) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::warn!("Model returned invalid JSON ({} chars)", raw_text.len());
            let fallback = json!({
                "valid": false,
                "missing_fields": ["amount"],
                "error": "Invalid JSON from model",
                "raw": raw_text,
            });
            match fallback {
                Value::Object(map) => map,
                _ => Map::new(),
            }
        }
    }
}

fn amount_from(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn string_from(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map parsed model output onto an ExtractionResult
pub fn result_from_output(
    raw: &Map<String, Value>,
    provider: ProviderName,
    model: &str,
) -> ExtractionResult {
    let datetime = match raw.get("datetime") {
        Some(Value::String(s)) if !s.trim().is_empty() => parse_to_utc(s),
        _ => Utc::now(),
    };

    let missing_fields = raw
        .get("missing_fields")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    ExtractionResult {
        valid: raw.get("valid").map(truthy).unwrap_or(true),
        amount: amount_from(raw.get("amount")),
        category: string_from(raw.get("category")),
        subcategory: string_from(raw.get("subcategory")),
        description: string_from(raw.get("description")),
        datetime: Some(datetime),
        missing_fields,
        provider: Some(provider.to_string()),
        model: Some(model.to_string()),
        raw_response: Some(Value::Object(raw.clone())),
        error: raw.get("error").and_then(|e| e.as_str()).map(|s| s.to_string()),
    }
}

/// A result that claims validity must carry every required field
pub fn enforce_required_fields(result: &mut ExtractionResult) {
    if !result.valid {
        return;
    }

    let blank = |s: &Option<String>| s.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true);
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| match *field {
            "amount" => !result.amount.map(|a| a > 0.0).unwrap_or(false),
            "category" => blank(&result.category),
            "subcategory" => blank(&result.subcategory),
            _ => blank(&result.description),
        })
        .collect();

    if missing.is_empty() {
        return;
    }

    result.valid = false;
    for field in missing {
        if !result.missing_fields.iter().any(|f| f == field) {
            result.missing_fields.push(field.to_string());
        }
    }
}

pub struct ExtractionService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LanguageModel>,
}

impl ExtractionService {
    pub fn new(store: Arc<dyn DocumentStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }

    /// Active categories as prompt lines, or the static list when unavailable
    async fn categories_block(&self) -> String {
        match self.store.list_categories(false).await {
            Ok(categories) if !categories.is_empty() => format_categories_block(&categories),
            Ok(_) => FALLBACK_CATEGORIES_BLOCK.to_string(),
            Err(e) => {
                tracing::warn!("Failed to load categories for prompt, using fallback: {}", e);
                FALLBACK_CATEGORIES_BLOCK.to_string()
            }
        }
    }

    /// One LLM call; returns the result and debug info {prompt_output, parsed}
    pub async fn run_extraction(
        &self,
        provider: ProviderName,
        model: &str,
        text: &str,
    ) -> Result<(ExtractionResult, Value)> {
        let categories_block = self.categories_block().await;
        let prompt = build_extraction_prompt(text, &now_ist_iso(), &categories_block);

        let raw_text = self.llm.complete(provider, model, &prompt).await?;
        let parsed = parse_model_output(&raw_text);

        let mut result = result_from_output(&parsed, provider, model);
        enforce_required_fields(&mut result);

        tracing::info!(
            "Extraction with {}/{}: valid={}, missing={:?}",
            provider,
            model,
            result.valid,
            result.missing_fields
        );

        let debug = json!({
            "prompt_output": raw_text,
            "parsed": Value::Object(parsed),
        });
        Ok((result, debug))
    }

    /// Run the extraction, always log the attempt, and save the expense when valid
    pub async fn extract_and_save(
        &self,
        original_query: &str,
        provider: ProviderName,
        model: &str,
        settings_snapshot: &Map<String, Value>,
    ) -> Result<SavedExtraction> {
        let (mut result, debug) = match self.run_extraction(provider, model, original_query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Extraction call failed: {}", e);
                (
                    ExtractionResult::failed(provider.as_str(), model, e.to_string()),
                    Value::Null,
                )
            }
        };

        let log = ExtractionLog {
            original_query: original_query.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            created_at: Utc::now(),
            settings_snapshot: redact_sensitive_data(settings_snapshot),
            extraction: result.clone(),
        };
        let log_id = self.store.insert_log(&log).await?;

        let expense_id = match result.to_new_expense(original_query) {
            Some(expense) => self.store.insert_expense(&expense).await?,
            None => String::new(),
        };

        if !debug.is_null() {
            let mut raw = match result.raw_response.take() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            raw.insert("debug".to_string(), debug);
            result.raw_response = Some(Value::Object(raw));
        }

        Ok(SavedExtraction {
            result,
            expense_id,
            log_id,
        })
    }
}
