//! In-memory store and scripted model for tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::store::DocumentStore;
use crate::error::{AppError, Result};
use crate::llm::LanguageModel;
use crate::models::{
    CategoryDB, ExpenseDB, ExpenseFilter, ExpenseUpdate, ExtractionLog, NewExpense, ProviderName,
};

/// Mock document store backed by hash maps
#[derive(Clone, Default)]
pub struct MockStore {
    expenses: Arc<Mutex<HashMap<String, ExpenseDB>>>,
    logs: Arc<Mutex<Vec<ExtractionLog>>>,
    categories: Arc<Mutex<HashMap<String, CategoryDB>>>,
    fail_category_reads: Arc<AtomicBool>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the default categories
    pub async fn with_default_categories() -> Self {
        let store = Self::new();
        let service = super::categories::CategoryService::new(Arc::new(store.clone()));
        service
            .seed_default_categories()
            .await
            .expect("seeding an empty mock store");
        store
    }

    pub fn fail_category_reads(&self, fail: bool) {
        self.fail_category_reads.store(fail, Ordering::SeqCst);
    }

    pub fn expense(&self, id: &str) -> Option<ExpenseDB> {
        self.expenses.lock().unwrap().get(id).cloned()
    }

    pub fn expense_count(&self) -> usize {
        self.expenses.lock().unwrap().len()
    }

    pub fn logs(&self) -> Vec<ExtractionLog> {
        self.logs.lock().unwrap().clone()
    }

    /// Insert an expense directly, bypassing extraction
    pub fn put_expense(&self, expense: ExpenseDB) {
        self.expenses
            .lock()
            .unwrap()
            .insert(expense.id.clone(), expense);
    }

    fn check_category_reads(&self) -> Result<()> {
        if self.fail_category_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store("mock store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn ping(&self) -> Result<()> {
        self.check_category_reads()
    }

    async fn insert_expense(&self, expense: &NewExpense) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = ExpenseDB {
            id: id.clone(),
            amount: expense.amount,
            category: expense.category.clone(),
            subcategory: expense.subcategory.clone(),
            description: expense.description.clone(),
            datetime: expense.datetime,
            provider: expense.provider.clone(),
            model: expense.model.clone(),
            original_query: expense.original_query.clone(),
            created_at: expense.created_at,
            updated_at: None,
        };
        self.put_expense(stored);
        Ok(id)
    }

    async fn insert_log(&self, log: &ExtractionLog) -> Result<String> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn list_recent_expenses(&self, limit: usize) -> Result<Vec<ExpenseDB>> {
        let mut list: Vec<_> = self.expenses.lock().unwrap().values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseDB>> {
        let mut list: Vec<_> = self
            .expenses
            .lock()
            .unwrap()
            .values()
            .filter(|e| filter.category.as_ref().map_or(true, |c| &e.category == c))
            .filter(|e| filter.subcategory.as_ref().map_or(true, |s| &e.subcategory == s))
            .filter(|e| {
                filter
                    .range
                    .map_or(true, |(start, end)| e.datetime >= start && e.datetime <= end)
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        list.truncate(filter.limit);
        Ok(list)
    }

    async fn get_expense(&self, id: &str) -> Result<Option<ExpenseDB>> {
        Ok(self.expense(id))
    }

    async fn update_expense(&self, id: &str, update: &ExpenseUpdate) -> Result<Option<ExpenseDB>> {
        let mut expenses = self.expenses.lock().unwrap();
        let Some(expense) = expenses.get_mut(id) else {
            return Ok(None);
        };

        if let Some(amount) = update.amount {
            expense.amount = amount;
        }
        if let Some(v) = &update.category {
            expense.category = v.clone();
        }
        if let Some(v) = &update.subcategory {
            expense.subcategory = v.clone();
        }
        if let Some(v) = &update.description {
            expense.description = v.clone();
        }
        if let Some(dt) = update.datetime {
            expense.datetime = dt;
        }
        if let Some(v) = &update.provider {
            expense.provider = v.clone();
        }
        if let Some(v) = &update.model {
            expense.model = v.clone();
        }
        if let Some(v) = &update.original_query {
            expense.original_query = v.clone();
        }
        expense.updated_at = Some(Utc::now());
        Ok(Some(expense.clone()))
    }

    async fn delete_expense(&self, id: &str) -> Result<bool> {
        Ok(self.expenses.lock().unwrap().remove(id).is_some())
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<CategoryDB>> {
        self.check_category_reads()?;
        let mut list: Vec<_> = self
            .categories
            .lock()
            .unwrap()
            .values()
            .filter(|c| include_inactive || c.is_active)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.sort_order);
        Ok(list)
    }

    async fn get_category(&self, id: &str) -> Result<Option<CategoryDB>> {
        self.check_category_reads()?;
        Ok(self.categories.lock().unwrap().get(id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<CategoryDB>> {
        self.check_category_reads()?;
        let wanted = name.trim().to_lowercase();
        Ok(self
            .categories
            .lock()
            .unwrap()
            .values()
            .find(|c| c.name.to_lowercase() == wanted)
            .cloned())
    }

    async fn create_category(&self, category: &CategoryDB) -> Result<()> {
        let mut categories = self.categories.lock().unwrap();
        if categories.contains_key(&category.id) {
            return Err(AppError::already_exists("category", category.name.clone()));
        }
        categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn save_category(&self, category: &CategoryDB) -> Result<()> {
        let mut categories = self.categories.lock().unwrap();
        match categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(())
            }
            None => Err(AppError::not_found("category", category.id.clone())),
        }
    }

    async fn delete_category(&self, id: &str) -> Result<bool> {
        Ok(self.categories.lock().unwrap().remove(id).is_some())
    }

    async fn count_categories(&self) -> Result<u64> {
        self.check_category_reads()?;
        Ok(self.categories.lock().unwrap().len() as u64)
    }
}

/// Scripted language model that records the prompts it receives
#[derive(Clone)]
pub struct MockModel {
    replies: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    /// Returned once the scripted replies run out
    default_reply: std::result::Result<String, String>,
    transcript: String,
    prompts: Arc<Mutex<Vec<String>>>,
    audio: Arc<Mutex<Vec<(usize, String)>>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            default_reply: Ok(reply.to_string()),
            transcript: String::new(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            audio: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            default_reply: Err(error.to_string()),
            ..Self::replying("")
        }
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = transcript.to_string();
        self
    }

    pub fn then_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// (byte count, mime type) of each transcription request
    pub fn audio_requests(&self) -> Vec<(usize, String)> {
        self.audio.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, _provider: ProviderName, _model: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        reply.map_err(AppError::Llm)
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        _model: Option<&str>,
        _prompt: Option<&str>,
    ) -> Result<String> {
        self.audio
            .lock()
            .unwrap()
            .push((audio.len(), mime_type.to_string()));
        Ok(self.transcript.clone())
    }

    fn is_configured(&self, _provider: ProviderName) -> bool {
        self.default_reply.is_ok()
    }
}
