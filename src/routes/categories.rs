// Categories routes
// Endpoints: GET/POST /v1/categories, GET/PATCH/DELETE /v1/categories/:id,
// POST /v1/categories/:id/subcategories, PATCH/DELETE /v1/categories/:id/subcategories/:name,
// POST /v1/categories/seed

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AdminUser, Viewer};
use crate::error::AppError;
use crate::models::{CategoryCreate, CategoryDB, CategoryUpdate, SubcategoryCreate, SubcategoryUpdate};
use crate::services::CategoryService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct DeleteCategoryQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct SeedResponse {
    pub created: usize,
    pub categories: Vec<CategoryDB>,
}

fn service(state: &AppState) -> CategoryService {
    CategoryService::new(state.store.clone())
}

/// GET /v1/categories - Categories ordered by sort_order
async fn list_categories(
    State(state): State<AppState>,
    _viewer: Viewer,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<Vec<CategoryDB>>, AppError> {
    tracing::info!("Listing categories (include_inactive={})", query.include_inactive);
    Ok(Json(service(&state).get_all_categories(query.include_inactive).await?))
}

/// POST /v1/categories - Create a category with optional subcategories
async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CategoryCreate>,
) -> Result<(StatusCode, Json<CategoryDB>), AppError> {
    tracing::info!("Creating category '{}'", request.name);
    let category = service(&state).create_category(&request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /v1/categories/:id
async fn get_category(
    State(state): State<AppState>,
    _viewer: Viewer,
    Path(category_id): Path<String>,
) -> Result<Json<CategoryDB>, AppError> {
    Ok(Json(service(&state).get_category_by_id(&category_id).await?))
}

/// PATCH /v1/categories/:id
async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
    Json(request): Json<CategoryUpdate>,
) -> Result<Json<CategoryDB>, AppError> {
    tracing::info!("Updating category {}", category_id);
    Ok(Json(service(&state).update_category(&category_id, &request).await?))
}

/// DELETE /v1/categories/:id?hard=true - Soft delete by default
async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
    Query(query): Query<DeleteCategoryQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    tracing::info!("Deleting category {} (hard={})", category_id, query.hard);
    let deleted = service(&state)
        .delete_category(&category_id, query.hard)
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// POST /v1/categories/:id/subcategories
async fn add_subcategory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(category_id): Path<String>,
    Json(request): Json<SubcategoryCreate>,
) -> Result<(StatusCode, Json<CategoryDB>), AppError> {
    tracing::info!("Adding subcategory '{}' to {}", request.name, category_id);
    let category = service(&state).add_subcategory(&category_id, &request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PATCH /v1/categories/:id/subcategories/:name
async fn update_subcategory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((category_id, name)): Path<(String, String)>,
    Json(request): Json<SubcategoryUpdate>,
) -> Result<Json<CategoryDB>, AppError> {
    tracing::info!("Updating subcategory '{}' in {}", name, category_id);
    Ok(Json(
        service(&state)
            .update_subcategory(&category_id, &name, &request)
            .await?,
    ))
}

/// DELETE /v1/categories/:id/subcategories/:name
async fn remove_subcategory(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((category_id, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, AppError> {
    tracing::info!("Removing subcategory '{}' from {}", name, category_id);
    let deleted = service(&state).remove_subcategory(&category_id, &name).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// POST /v1/categories/seed - Create the defaults if no categories exist
async fn seed_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SeedResponse>, AppError> {
    let categories = service(&state).seed_default_categories().await?;
    Ok(Json(SeedResponse {
        created: categories.len(),
        categories,
    }))
}

pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/categories", get(list_categories).post(create_category))
        .route("/v1/categories/seed", post(seed_categories))
        .route(
            "/v1/categories/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/v1/categories/:id/subcategories", post(add_subcategory))
        .route(
            "/v1/categories/:id/subcategories/:name",
            patch(update_subcategory).delete(remove_subcategory),
        )
}
