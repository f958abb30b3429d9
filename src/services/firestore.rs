// Firestore service - expenses, extraction logs and categories
// Uses Firestore REST API for simplicity and compatibility

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::firestore_codec::{
    category_fields, expense_fields, expense_update_fields, log_fields, parse_category,
    parse_expense, string_value, timestamp_value,
};
use super::store::{
    DocumentStore, CATEGORIES_COLLECTION, EXPENSES_COLLECTION, EXTRACTION_LOGS_COLLECTION,
};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CategoryDB, ExpenseDB, ExpenseFilter, ExpenseUpdate, ExtractionLog, NewExpense};
use crate::utils::validation::validate_document_id;

/// Service account credentials from JSON file
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

/// JWT claims for Google OAuth2
#[derive(Debug, Serialize)]
struct GoogleJwtClaims {
    iss: String,      // Service account email
    scope: String,    // OAuth scopes
    aud: String,      // Token endpoint
    iat: i64,         // Issued at
    exp: i64,         // Expiration
}

/// Cached access token with expiration
struct CachedToken {
    token: String,
    expires_at: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Generate a document ID from a seed string using SHA256 hash
pub fn document_id_from_seed(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..10]) // First 20 hex chars (10 bytes)
}

fn store_err(context: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::Store(format!("{}: {}", context, detail))
}

/// Combine filters into a single where clause
fn where_clause(mut filters: Vec<Value>) -> Option<Value> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({
            "compositeFilter": {
                "op": "AND",
                "filters": filters
            }
        })),
    }
}

fn field_filter(path: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": {"fieldPath": path},
            "op": op,
            "value": value
        }
    })
}

/// Firestore REST API client
pub struct FirestoreService {
    client: Client,
    project_id: String,
    /// host:port of the local emulator, which needs no OAuth token
    emulator_host: Option<String>,
    credentials: Option<ServiceAccountCredentials>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl FirestoreService {
    /// Create a new Firestore service
    pub async fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let project_id = match &config.firebase_project_id {
            Some(id) => id.clone(),
            None => {
                tracing::warn!("No FIREBASE_PROJECT_ID set - using placeholder project");
                "expense-tracker".to_string()
            }
        };

        let credentials = if config.firestore_emulator_host.is_some() {
            None
        } else {
            Self::load_credentials(config.google_application_credentials.as_deref())?
        };

        let service = Self {
            client,
            project_id,
            emulator_host: config.firestore_emulator_host.clone(),
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
        };

        // Pre-fetch an access token
        if service.emulator_host.is_none() {
            if let Err(e) = service.get_access_token().await {
                tracing::warn!("Failed to get initial access token: {}", e);
            }
        }

        Ok(service)
    }

    /// Load service account credentials from JSON file
    fn load_credentials(path: Option<&str>) -> Result<Option<ServiceAccountCredentials>> {
        let creds_path = match path {
            Some(path) => path.to_string(),
            None => {
                // Try default location in current directory
                if std::path::Path::new("google-credentials.json").exists() {
                    "google-credentials.json".to_string()
                } else {
                    tracing::warn!("No GOOGLE_APPLICATION_CREDENTIALS set and no google-credentials.json found");
                    return Ok(None);
                }
            }
        };

        tracing::info!("Loading service account credentials from: {}", creds_path);

        let creds_json = std::fs::read_to_string(&creds_path)
            .map_err(|e| store_err(&format!("Failed to read credentials file {}", creds_path), e))?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&creds_json)
            .map_err(|e| store_err("Failed to parse credentials JSON", e))?;

        tracing::info!("Loaded credentials for service account: {}", credentials.client_email);

        Ok(Some(credentials))
    }

    /// Get access token, using cache if valid or refreshing if needed
    async fn get_access_token(&self) -> Result<String> {
        // Check cached token
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Utc::now().timestamp();
                // Use token if it has at least 60 seconds left
                if cached.expires_at > now + 60 {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.fetch_new_access_token().await?;

        // Tokens are valid for 1 hour, refresh after 55 minutes
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at: Utc::now().timestamp() + 3300,
            });
        }

        Ok(token)
    }

    /// Fetch a new access token from Google OAuth
    async fn fetch_new_access_token(&self) -> Result<String> {
        if let Some(creds) = &self.credentials {
            let token = self.get_token_from_service_account(creds).await?;
            tracing::info!("Got access token from service account");
            return Ok(token);
        }

        // Fall back to metadata server (Cloud Run / GCE without credentials file)
        if let Ok(token) = self.try_metadata_server().await {
            tracing::info!("Got access token from GCP metadata server");
            return Ok(token);
        }

        Err(AppError::Store(
            "No valid authentication method available. Set GOOGLE_APPLICATION_CREDENTIALS or run on GCP."
                .to_string(),
        ))
    }

    /// Try to get token from GCP metadata server
    async fn try_metadata_server(&self) -> Result<String> {
        let metadata_url =
            "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

        let response = self
            .client
            .get(metadata_url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(2))
            .send()
            .await?;

        if response.status().is_success() {
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        Err(AppError::Store("Metadata server not available".to_string()))
    }

    /// Get access token using service account credentials (OAuth2 JWT flow)
    async fn get_token_from_service_account(
        &self,
        creds: &ServiceAccountCredentials,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let token_uri = creds
            .token_uri
            .as_deref()
            .unwrap_or("https://oauth2.googleapis.com/token");

        let claims = GoogleJwtClaims {
            iss: creds.client_email.clone(),
            scope: "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/cloud-platform".to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        // Sign JWT with service account private key (RS256)
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())
            .map_err(|e| store_err("Failed to parse private key", e))?;

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| store_err("Failed to encode JWT", e))?;

        // Exchange JWT for access token
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(store_err("Token exchange failed", error_text));
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response.access_token)
    }

    /// Build Firestore REST API base URL
    fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!(
                "http://{}/v1/projects/{}/databases/(default)/documents",
                host, self.project_id
            ),
            None => format!(
                "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
                self.project_id
            ),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<String> {
        let id = validate_document_id("id", id)?;
        Ok(format!("{}/{}/{}", self.base_url(), collection, id))
    }

    /// Build request with auth header
    async fn build_request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let req = self.client.request(method, url);
        let token = match self.emulator_host {
            // The emulator accepts this fixed admin token
            Some(_) => "owner".to_string(),
            None => self.get_access_token().await?,
        };
        Ok(req.bearer_auth(token))
    }

    /// Turn a non-success response into a store error
    async fn ensure_success(response: Response, context: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("{} ({}): {}", context, status, error_text);
        Err(store_err(context, format!("{} {}", status, error_text)))
    }

    /// Run a structured query against the documents root
    async fn run_query(&self, structured_query: Value) -> Result<Vec<Value>> {
        let query = json!({ "structuredQuery": structured_query });

        tracing::debug!("Firestore query: {}", query);

        let response = self
            .build_request(reqwest::Method::POST, &format!("{}:runQuery", self.base_url()))
            .await?
            .json(&query)
            .send()
            .await?;
        let response = Self::ensure_success(response, "Firestore query failed").await?;

        // Entries without a "document" only carry readTime
        let results: Vec<Value> = response.json().await?;
        Ok(results
            .into_iter()
            .filter_map(|mut entry| entry.get_mut("document").map(Value::take))
            .collect())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let response = self
            .build_request(reqwest::Method::GET, &self.document_url(collection, id)?)
            .await?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response, "Firestore get failed").await?;
        Ok(Some(response.json().await?))
    }

    /// Write a whole document, with an existence precondition
    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        must_exist: bool,
    ) -> Result<Response> {
        let url = format!(
            "{}?currentDocument.exists={}",
            self.document_url(collection, id)?,
            must_exist
        );

        let response = self
            .build_request(reqwest::Method::PATCH, &url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        Ok(response)
    }

    /// Delete a document. False when it did not exist.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let url = format!(
            "{}?currentDocument.exists=true",
            self.document_url(collection, id)?
        );

        let response = self
            .build_request(reqwest::Method::DELETE, &url)
            .await?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(response, "Firestore delete failed").await?;
        Ok(true)
    }

    async fn insert_new(&self, collection: &str, fields: Value) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let response = self.write_document(collection, &id, fields, false).await?;
        Self::ensure_success(response, "Firestore create failed").await?;
        Ok(id)
    }

    fn parse_expenses(docs: Vec<Value>) -> Vec<ExpenseDB> {
        docs.iter()
            .filter_map(|doc| match parse_expense(doc) {
                Ok(expense) => Some(expense),
                Err(e) => {
                    tracing::warn!("Failed to parse expense: {}", e);
                    None
                }
            })
            .collect()
    }

    fn parse_categories(docs: Vec<Value>) -> Vec<CategoryDB> {
        docs.iter()
            .filter_map(|doc| match parse_category(doc) {
                Ok(category) => Some(category),
                Err(e) => {
                    tracing::warn!("Failed to parse category: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FirestoreService {
    async fn ping(&self) -> Result<()> {
        self.count_categories().await.map(|_| ())
    }

    async fn insert_expense(&self, expense: &NewExpense) -> Result<String> {
        let id = self
            .insert_new(EXPENSES_COLLECTION, expense_fields(expense))
            .await?;
        tracing::info!("Inserted expense {} ({} {})", id, expense.amount, expense.category);
        Ok(id)
    }

    async fn insert_log(&self, log: &ExtractionLog) -> Result<String> {
        let id = self
            .insert_new(EXTRACTION_LOGS_COLLECTION, log_fields(log)?)
            .await?;
        tracing::info!("Inserted extraction log {}", id);
        Ok(id)
    }

    async fn list_recent_expenses(&self, limit: usize) -> Result<Vec<ExpenseDB>> {
        let docs = self
            .run_query(json!({
                "from": [{"collectionId": EXPENSES_COLLECTION}],
                "orderBy": [{"field": {"fieldPath": "created_at"}, "direction": "DESCENDING"}],
                "limit": limit
            }))
            .await?;

        let expenses = Self::parse_expenses(docs);
        tracing::info!("Retrieved {} recent expenses", expenses.len());
        Ok(expenses)
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseDB>> {
        let mut filters = Vec::new();
        if let Some(category) = &filter.category {
            filters.push(field_filter("category", "EQUAL", string_value(category)));
        }
        if let Some(subcategory) = &filter.subcategory {
            filters.push(field_filter("subcategory", "EQUAL", string_value(subcategory)));
        }
        if let Some((start, end)) = &filter.range {
            filters.push(field_filter(
                "datetime",
                "GREATER_THAN_OR_EQUAL",
                timestamp_value(start),
            ));
            filters.push(field_filter(
                "datetime",
                "LESS_THAN_OR_EQUAL",
                timestamp_value(end),
            ));
        }

        let mut structured_query = json!({
            "from": [{"collectionId": EXPENSES_COLLECTION}],
            "orderBy": [{"field": {"fieldPath": "datetime"}, "direction": "DESCENDING"}],
            "limit": filter.limit
        });
        if let Some(where_filter) = where_clause(filters) {
            structured_query["where"] = where_filter;
        }

        let expenses = Self::parse_expenses(self.run_query(structured_query).await?);
        tracing::info!(
            "Retrieved {} expenses (category={:?}, subcategory={:?})",
            expenses.len(),
            filter.category,
            filter.subcategory
        );
        Ok(expenses)
    }

    async fn get_expense(&self, id: &str) -> Result<Option<ExpenseDB>> {
        match self.get_document(EXPENSES_COLLECTION, id).await? {
            Some(doc) => Ok(Some(parse_expense(&doc)?)),
            None => Ok(None),
        }
    }

    async fn update_expense(&self, id: &str, update: &ExpenseUpdate) -> Result<Option<ExpenseDB>> {
        let (paths, fields) = expense_update_fields(update, &Utc::now());

        let update_mask = paths
            .iter()
            .map(|p| format!("updateMask.fieldPaths={}", p))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!(
            "{}?{}&currentDocument.exists=true",
            self.document_url(EXPENSES_COLLECTION, id)?,
            update_mask
        );

        let response = self
            .build_request(reqwest::Method::PATCH, &url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response, "Firestore update failed").await?;

        let updated_doc: Value = response.json().await?;
        let expense = parse_expense(&updated_doc)?;

        tracing::info!("Updated expense {} ({} fields)", id, paths.len() - 1);
        Ok(Some(expense))
    }

    async fn delete_expense(&self, id: &str) -> Result<bool> {
        let deleted = self.delete_document(EXPENSES_COLLECTION, id).await?;
        tracing::info!("Delete expense {}: deleted={}", id, deleted);
        Ok(deleted)
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<CategoryDB>> {
        let mut structured_query = json!({
            "from": [{"collectionId": CATEGORIES_COLLECTION}],
            "orderBy": [{"field": {"fieldPath": "sort_order"}, "direction": "ASCENDING"}]
        });
        if !include_inactive {
            structured_query["where"] =
                field_filter("is_active", "EQUAL", json!({"booleanValue": true}));
        }

        Ok(Self::parse_categories(self.run_query(structured_query).await?))
    }

    async fn get_category(&self, id: &str) -> Result<Option<CategoryDB>> {
        match self.get_document(CATEGORIES_COLLECTION, id).await? {
            Some(doc) => Ok(Some(parse_category(&doc)?)),
            None => Ok(None),
        }
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<CategoryDB>> {
        let docs = self
            .run_query(json!({
                "from": [{"collectionId": CATEGORIES_COLLECTION}],
                "where": field_filter(
                    "name_lower",
                    "EQUAL",
                    string_value(&name.trim().to_lowercase())
                ),
                "limit": 1
            }))
            .await?;

        Ok(Self::parse_categories(docs).into_iter().next())
    }

    async fn create_category(&self, category: &CategoryDB) -> Result<()> {
        let response = self
            .write_document(
                CATEGORIES_COLLECTION,
                &category.id,
                category_fields(category),
                false,
            )
            .await?;

        // A failed exists=false precondition reports ALREADY_EXISTS
        if response.status() == StatusCode::CONFLICT {
            return Err(AppError::already_exists("category", category.name.clone()));
        }
        Self::ensure_success(response, "Firestore create failed").await?;

        tracing::info!("Created category {} ({})", category.id, category.name);
        Ok(())
    }

    async fn save_category(&self, category: &CategoryDB) -> Result<()> {
        let response = self
            .write_document(
                CATEGORIES_COLLECTION,
                &category.id,
                category_fields(category),
                true,
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::not_found("category", category.id.clone()));
        }
        Self::ensure_success(response, "Firestore update failed").await?;

        tracing::info!("Saved category {} ({})", category.id, category.name);
        Ok(())
    }

    async fn delete_category(&self, id: &str) -> Result<bool> {
        self.delete_document(CATEGORIES_COLLECTION, id).await
    }

    async fn count_categories(&self) -> Result<u64> {
        let query = json!({
            "structuredAggregationQuery": {
                "structuredQuery": {
                    "from": [{"collectionId": CATEGORIES_COLLECTION}]
                },
                "aggregations": [{
                    "alias": "count",
                    "count": {}
                }]
            }
        });

        let response = self
            .build_request(
                reqwest::Method::POST,
                &format!("{}:runAggregationQuery", self.base_url()),
            )
            .await?
            .json(&query)
            .send()
            .await?;
        let response = Self::ensure_success(response, "Firestore aggregation query failed").await?;

        let results: Vec<Value> = response.json().await?;

        // Response format: [{"result": {"aggregateFields": {"count": {"integerValue": "123"}}}}]
        let count = results
            .first()
            .and_then(|r| r.get("result"))
            .and_then(|r| r.get("aggregateFields"))
            .and_then(|f| f.get("count"))
            .and_then(|c| c.get("integerValue"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_from_seed() {
        let id = document_id_from_seed("food & dining");
        assert_eq!(id.len(), 20);
        assert_eq!(id, document_id_from_seed("food & dining"));
        assert_ne!(id, document_id_from_seed("transportation"));
    }

    #[test]
    fn test_where_clause_shapes() {
        assert!(where_clause(vec![]).is_none());

        let single = where_clause(vec![field_filter("category", "EQUAL", string_value("Food"))])
            .unwrap();
        assert_eq!(single["fieldFilter"]["field"]["fieldPath"], "category");

        let composite = where_clause(vec![
            field_filter("category", "EQUAL", string_value("Food")),
            field_filter("subcategory", "EQUAL", string_value("Snacks")),
        ])
        .unwrap();
        assert_eq!(composite["compositeFilter"]["op"], "AND");
        assert_eq!(composite["compositeFilter"]["filters"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_emulator_urls_skip_oauth() {
        let config = Config {
            firebase_project_id: Some("demo-expenses".to_string()),
            firestore_emulator_host: Some("localhost:8081".to_string()),
            ..Config::default()
        };
        let service = FirestoreService::new(&config).await.unwrap();

        assert_eq!(
            service.document_url(EXPENSES_COLLECTION, "abc").unwrap(),
            "http://localhost:8081/v1/projects/demo-expenses/databases/(default)/documents/expenses/abc"
        );
        assert!(service
            .document_url(EXPENSES_COLLECTION, "../categories/abc")
            .is_err());
        assert!(service.credentials.is_none());
    }
}
