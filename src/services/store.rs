// Document store port - expenses, extraction logs and categories

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CategoryDB, ExpenseDB, ExpenseFilter, ExpenseUpdate, ExtractionLog, NewExpense};

pub const EXPENSES_COLLECTION: &str = "expenses";
pub const EXTRACTION_LOGS_COLLECTION: &str = "extraction_logs";
pub const CATEGORIES_COLLECTION: &str = "categories";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip to the backend, used by the status endpoint
    async fn ping(&self) -> Result<()>;

    // Expenses

    /// Insert and return the new document id
    async fn insert_expense(&self, expense: &NewExpense) -> Result<String>;

    /// Insert an extraction log; the caller redacts the settings snapshot
    async fn insert_log(&self, log: &ExtractionLog) -> Result<String>;

    /// Most recent first by `created_at`
    async fn list_recent_expenses(&self, limit: usize) -> Result<Vec<ExpenseDB>>;

    /// Filtered, most recent first by `datetime`
    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseDB>>;

    async fn get_expense(&self, id: &str) -> Result<Option<ExpenseDB>>;

    /// Apply the given fields and stamp `updated_at`. None when the expense does not exist.
    async fn update_expense(&self, id: &str, update: &ExpenseUpdate) -> Result<Option<ExpenseDB>>;

    /// False when nothing was deleted
    async fn delete_expense(&self, id: &str) -> Result<bool>;

    // Categories

    /// Ordered by `sort_order`
    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<CategoryDB>>;

    async fn get_category(&self, id: &str) -> Result<Option<CategoryDB>>;

    /// Case-insensitive match on the name
    async fn find_category_by_name(&self, name: &str) -> Result<Option<CategoryDB>>;

    /// Fails with AlreadyExists when `category.id` is taken
    async fn create_category(&self, category: &CategoryDB) -> Result<()>;

    /// Overwrite an existing category. Fails with NotFound when it is missing.
    async fn save_category(&self, category: &CategoryDB) -> Result<()>;

    /// Permanently remove. False when nothing was deleted.
    async fn delete_category(&self, id: &str) -> Result<bool>;

    async fn count_categories(&self) -> Result<u64>;
}
