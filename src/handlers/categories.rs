use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{created, ok, ok_with_message, TenantContext};
use crate::{
    entities::category,
    errors::ServiceError,
    services::{
        categories::{CategoryNode, CreateCategory, EffectiveSettings, ReorderEntry, UpdateCategory},
        sku::SkuPreview,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ReorderRequest {
    pub entries: Vec<ReorderEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams)]
pub struct DescendantQuery {
    /// Category that may sit below the path category
    pub target_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneratedSku {
    pub sku: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ResetSequenceRequest {
    pub value: i64,
}

/// Category tree of the store, siblings in sort order
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Category tree", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "categories"
)]
pub async fn category_tree(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> ApiResult<Vec<CategoryNode>> {
    let tree = state.services.categories.tree(tenant.store_id).await?;
    Ok(ok(tree))
}

/// Create a category, appended after its siblings
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Parent not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid name or SKU format", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateCategory>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    let category = state
        .services
        .categories
        .create(tenant.store_id, payload)
        .await?;
    Ok(created(category))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<category::Model> {
    let category = state.services.categories.get(tenant.store_id, id).await?;
    Ok(ok(category))
}

/// Rename, move or re-configure a category
#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    request_body = UpdateCategory,
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Move would create a cycle, or settings on a parent", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategory>,
) -> ApiResult<category::Model> {
    let category = state
        .services
        .categories
        .update(tenant.store_id, id, payload)
        .await?;
    Ok(ok(category))
}

/// Delete a childless category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Category has children", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state
        .services
        .categories
        .delete(tenant.store_id, id)
        .await?;
    Ok(ok_with_message(id, "Category deleted"))
}

/// Apply a batch of moves and sort orders in one go
#[utoipa::path(
    post,
    path = "/api/v1/categories/reorder",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Updated tree", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "A move would create a cycle", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn reorder_categories(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<Vec<CategoryNode>> {
    let tree = state
        .services
        .categories
        .reorder(tenant.store_id, payload.entries)
        .await?;
    Ok(ok(tree))
}

/// Settings resolved through the ancestor chain
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/effective-settings",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Effective settings", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn effective_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<EffectiveSettings> {
    let settings = state
        .services
        .categories
        .effective_settings(tenant.store_id, id)
        .await?;
    Ok(ok(settings))
}

/// Whether `target_id` sits somewhere below the category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/descendants",
    params(("id" = Uuid, Path, description = "Category ID"), DescendantQuery),
    responses(
        (status = 200, description = "Descendant check", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "categories"
)]
pub async fn is_descendant(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DescendantQuery>,
) -> ApiResult<bool> {
    let found = state
        .services
        .categories
        .is_descendant(tenant.store_id, id, query.target_id)
        .await?;
    Ok(ok(found))
}

/// Next SKU for a leaf category, without consuming the sequence
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/sku/preview",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "SKU preview", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Not a leaf category", body = crate::errors::ErrorResponse)
    ),
    tag = "sku"
)]
pub async fn preview_sku(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<SkuPreview> {
    let preview = state.services.sku.preview(tenant.store_id, id).await?;
    Ok(ok(preview))
}

/// Render a SKU and advance the category's sequence
#[utoipa::path(
    post,
    path = "/api/v1/categories/{id}/sku/generate",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 201, description = "SKU generated", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Sequence advanced concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not a leaf category", body = crate::errors::ErrorResponse)
    ),
    tag = "sku"
)]
pub async fn generate_sku(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<GeneratedSku>>), ServiceError> {
    let sku = state.services.sku.generate(tenant.store_id, id).await?;
    Ok(created(GeneratedSku { sku }))
}

/// Set the number the next generated SKU will carry
#[utoipa::path(
    post,
    path = "/api/v1/categories/{id}/sku/reset",
    request_body = ResetSequenceRequest,
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Sequence reset", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Value below 1 or not a leaf category", body = crate::errors::ErrorResponse)
    ),
    tag = "sku"
)]
pub async fn reset_sku_sequence(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResetSequenceRequest>,
) -> ApiResult<SkuPreview> {
    let preview = state
        .services
        .sku
        .reset_to(tenant.store_id, id, payload.value)
        .await?;
    Ok(ok(preview))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(category_tree).post(create_category))
        .route("/reorder", post(reorder_categories))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/:id/effective-settings", get(effective_settings))
        .route("/:id/descendants", get(is_descendant))
        .route("/:id/sku/preview", get(preview_sku))
        .route("/:id/sku/generate", post(generate_sku))
        .route("/:id/sku/reset", post(reset_sku_sequence))
}
