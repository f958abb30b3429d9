// Expense queries and edits

use std::sync::Arc;

use super::store::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{ExpenseDB, ExpenseFilter, ExpenseUpdate, UpdateExpenseRequest};
use crate::utils::datetime::parse_user_datetime;
use crate::utils::validation::validate_document_id;

pub const DEFAULT_RECENT_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 500;
const MIN_AMOUNT: f64 = 0.01;

fn clamp_limit(limit: usize, default: usize) -> usize {
    match limit {
        0 => default,
        n => n.min(MAX_LIST_LIMIT),
    }
}

fn non_blank(field: &str, value: &Option<String>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(AppError::invalid(field, "Value cannot be empty")),
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}

/// Validate an edit request into typed changes
pub fn resolve_update(request: &UpdateExpenseRequest) -> Result<ExpenseUpdate> {
    if request.is_empty() {
        return Err(AppError::invalid("update", "No fields to update"));
    }

    if let Some(amount) = request.amount {
        if !amount.is_finite() || amount < MIN_AMOUNT {
            return Err(AppError::invalid("amount", "Amount must be at least 0.01"));
        }
    }

    let datetime = request
        .datetime
        .as_deref()
        .map(parse_user_datetime)
        .transpose()?;

    Ok(ExpenseUpdate {
        amount: request.amount,
        category: non_blank("category", &request.category)?,
        subcategory: non_blank("subcategory", &request.subcategory)?,
        description: non_blank("description", &request.description)?,
        datetime,
        provider: request.provider.clone(),
        model: request.model.clone(),
        original_query: request.original_query.clone(),
    })
}

pub struct ExpenseService {
    store: Arc<dyn DocumentStore>,
}

impl ExpenseService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Most recently created expenses
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ExpenseDB>> {
        self.store
            .list_recent_expenses(clamp_limit(limit, DEFAULT_RECENT_LIMIT))
            .await
    }

    /// Filtered listing, newest `datetime` first
    pub async fn list_expenses(&self, mut filter: ExpenseFilter) -> Result<Vec<ExpenseDB>> {
        if let Some((start, end)) = filter.range {
            if start > end {
                return Err(AppError::invalid("start", "Start must not be after end"));
            }
        }
        filter.limit = clamp_limit(filter.limit, ExpenseFilter::default().limit);
        self.store.list_expenses(&filter).await
    }

    pub async fn get_expense(&self, id: &str) -> Result<ExpenseDB> {
        let id = validate_document_id("expense_id", id)?;
        self.store
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::not_found("expense", id))
    }

    pub async fn update_expense(&self, id: &str, request: &UpdateExpenseRequest) -> Result<ExpenseDB> {
        let id = validate_document_id("expense_id", id)?;
        let update = resolve_update(request)?;
        let updated = self
            .store
            .update_expense(id, &update)
            .await?
            .ok_or_else(|| AppError::not_found("expense", id))?;

        tracing::info!("Expense {} updated", id);
        Ok(updated)
    }

    /// False when no expense had this id
    pub async fn delete_expense(&self, id: &str) -> Result<bool> {
        let id = validate_document_id("expense_id", id)?;
        let deleted = self.store.delete_expense(id).await?;
        if deleted {
            tracing::info!("Expense {} deleted", id);
        } else {
            tracing::warn!("Expense {} not found for delete", id);
        }
        Ok(deleted)
    }
}
