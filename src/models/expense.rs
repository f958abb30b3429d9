// Expense models - extraction results, stored expenses and extraction logs
// Collections: expenses/{expense_id}, extraction_logs/{log_id}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured fields pulled out of a free-form expense description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Whether the model judged the text to be a complete expense
    #[serde(default = "default_true")]
    pub valid: bool,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Original text exactly as written
    pub description: Option<String>,
    /// When the expense happened (UTC)
    pub datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Parsed model output plus debug extras
    pub raw_response: Option<Value>,
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ExtractionResult {
    /// Result reported when the pipeline itself failed (LLM or store error)
    pub fn failed(provider: &str, model: &str, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            amount: None,
            category: None,
            subcategory: None,
            description: None,
            datetime: None,
            missing_fields: vec![],
            provider: Some(provider.to_string()),
            model: Some(model.to_string()),
            raw_response: None,
            error: Some(error.into()),
        }
    }

    /// Expense to persist, if the result is valid and complete
    pub fn to_new_expense(&self, original_query: &str) -> Option<NewExpense> {
        if !self.valid {
            return None;
        }
        let amount = self.amount.filter(|a| *a > 0.0)?;
        let category = self.category.clone().filter(|c| !c.trim().is_empty())?;
        let subcategory = self.subcategory.clone().filter(|s| !s.trim().is_empty())?;
        let description = self.description.clone().filter(|d| !d.trim().is_empty())?;

        Some(NewExpense {
            amount,
            category,
            subcategory,
            description,
            datetime: self.datetime.unwrap_or_else(Utc::now),
            provider: self.provider.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
            original_query: original_query.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Expense about to be inserted
#[derive(Debug, Clone, Serialize)]
pub struct NewExpense {
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub datetime: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub original_query: String,
    pub created_at: DateTime<Utc>,
}

/// Expense stored in Firestore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseDB {
    /// Document ID
    pub id: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    /// When the expense happened (UTC)
    pub datetime: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    /// Text the expense was extracted from
    pub original_query: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for editing an expense
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    /// ISO-8601; values without an offset are taken as IST
    pub datetime: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub original_query: Option<String>,
}

impl UpdateExpenseRequest {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.description.is_none()
            && self.datetime.is_none()
            && self.provider.is_none()
            && self.model.is_none()
            && self.original_query.is_none()
    }
}

/// Validated field changes applied to a stored expense
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseUpdate {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub datetime: Option<DateTime<Utc>>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub original_query: Option<String>,
}

/// Filters for listing expenses
#[derive(Debug, Clone)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Inclusive UTC range on `datetime`
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: usize,
}

impl Default for ExpenseFilter {
    fn default() -> Self {
        Self {
            category: None,
            subcategory: None,
            range: None,
            limit: 100,
        }
    }
}

/// Record of every extraction attempt, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionLog {
    pub original_query: String,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    /// Settings at the time of the call, secrets redacted before insert
    pub settings_snapshot: Map<String, Value>,
    pub extraction: ExtractionResult,
}
