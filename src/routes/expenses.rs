// Expenses routes
// Endpoints: POST /v1/expenses/extract, GET /v1/expenses, GET/PATCH/DELETE /v1/expenses/:id

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::auth::{AdminUser, Viewer};
use crate::error::AppError;
use crate::models::{ExpenseDB, ExpenseFilter, ExtractionResult, UpdateExpenseRequest};
use crate::services::expenses::DEFAULT_RECENT_LIMIT;
use crate::services::{ExpenseService, ExtractionService, SavedExtraction};
use crate::utils::datetime::{format_ist, parse_user_datetime};
use crate::AppState;

#[derive(Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub expense_id: String,
    pub log_id: String,
    /// Expense time rendered in IST for display
    pub datetime_ist: Option<String>,
}

#[derive(Deserialize)]
pub struct ListExpensesQuery {
    pub limit: Option<usize>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Serialize)]
pub struct ExpenseResponse {
    #[serde(flatten)]
    pub expense: ExpenseDB,
    pub datetime_ist: String,
}

impl From<ExpenseDB> for ExpenseResponse {
    fn from(expense: ExpenseDB) -> Self {
        let datetime_ist = format_ist(&expense.datetime);
        Self {
            expense,
            datetime_ist,
        }
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /v1/expenses/extract - Extract an expense from free text and save it
async fn extract_expense(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::invalid("text", "Please enter an expense description"));
    }

    let settings = state.ai_settings.read().await.clone();
    tracing::info!(
        "Extracting expense with {}/{} ({} chars)",
        settings.provider,
        settings.model,
        request.text.len()
    );

    let mut snapshot = Map::new();
    snapshot.insert("provider".to_string(), json!(settings.provider));
    snapshot.insert("model".to_string(), json!(settings.model));

    let service = ExtractionService::new(state.store.clone(), state.llm.clone());
    let saved = match service
        .extract_and_save(&request.text, settings.provider, &settings.model, &snapshot)
        .await
    {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!("Extraction pipeline failed: {}", e);
            let mut result =
                ExtractionResult::failed(settings.provider.as_str(), &settings.model, e.to_string());
            result.missing_fields = vec!["amount".to_string()];
            SavedExtraction {
                result,
                expense_id: String::new(),
                log_id: String::new(),
            }
        }
    };

    let SavedExtraction {
        mut result,
        expense_id,
        log_id,
    } = saved;
    if !state.config.debug_mode {
        result.raw_response = None;
    }
    let datetime_ist = result.datetime.as_ref().map(format_ist);

    Ok(Json(ExtractResponse {
        result,
        expense_id,
        log_id,
        datetime_ist,
    }))
}

/// GET /v1/expenses - Recent expenses, or a filtered listing when filters are given
async fn list_expenses(
    State(state): State<AppState>,
    _viewer: Viewer,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<Vec<ExpenseResponse>>, AppError> {
    let category = non_blank(query.category);
    let subcategory = non_blank(query.subcategory);
    let start = non_blank(query.start)
        .map(|s| parse_user_datetime(&s))
        .transpose()?;
    let end = non_blank(query.end)
        .map(|s| parse_user_datetime(&s))
        .transpose()?;

    let service = ExpenseService::new(state.store.clone());

    let expenses = if category.is_none() && subcategory.is_none() && start.is_none() && end.is_none() {
        let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        tracing::info!("Listing {} recent expenses", limit);
        service.list_recent(limit).await?
    } else {
        let range = match (start, end) {
            (None, None) => None,
            (start, end) => Some((
                start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                end.unwrap_or_else(Utc::now),
            )),
        };
        let filter = ExpenseFilter {
            category,
            subcategory,
            range,
            limit: query.limit.unwrap_or(ExpenseFilter::default().limit),
        };
        tracing::info!(
            "Listing expenses category={:?} subcategory={:?} range={:?}",
            filter.category,
            filter.subcategory,
            filter.range
        );
        service.list_expenses(filter).await?
    };

    Ok(Json(expenses.into_iter().map(ExpenseResponse::from).collect()))
}

/// GET /v1/expenses/:id
async fn get_expense(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path(expense_id): Path<String>,
) -> Result<Json<ExpenseResponse>, AppError> {
    let expense = ExpenseService::new(state.store.clone())
        .get_expense(&expense_id)
        .await?;
    Ok(Json(expense.into()))
}

/// PATCH /v1/expenses/:id - Edit fields of a saved expense
async fn update_expense(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(expense_id): Path<String>,
    Json(request): Json<UpdateExpenseRequest>,
) -> Result<Json<ExpenseResponse>, AppError> {
    tracing::info!("Updating expense {}", expense_id);

    let expense = ExpenseService::new(state.store.clone())
        .update_expense(&expense_id, &request)
        .await?;
    Ok(Json(expense.into()))
}

/// DELETE /v1/expenses/:id
async fn delete_expense(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(expense_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    tracing::info!("Deleting expense {}", expense_id);

    let deleted = ExpenseService::new(state.store.clone())
        .delete_expense(&expense_id)
        .await?;
    if !deleted {
        return Err(AppError::not_found("expense", expense_id));
    }
    Ok(Json(DeleteResponse { deleted }))
}

pub fn expenses_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/expenses/extract", post(extract_expense))
        .route("/v1/expenses", get(list_expenses))
        .route(
            "/v1/expenses/:id",
            get(get_expense).patch(update_expense).delete(delete_expense),
        )
}
