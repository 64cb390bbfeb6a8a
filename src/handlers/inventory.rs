use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{created, ok, TenantContext};
use crate::{
    entities::{inventory, inventory_adjustment},
    errors::ServiceError,
    services::inventory_ledger::{
        AdjustQuantity, LedgerAudit, StockVariantInput, UpdateInventorySettings,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockedVariant {
    pub inventory: inventory::Model,
    /// Present when the variant was stocked with an opening quantity
    pub adjustment: Option<inventory_adjustment::Model>,
}

/// Start tracking a variant in a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = StockVariantInput,
    responses(
        (status = 201, description = "Variant stocked", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Variant or warehouse not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Variant already stocked in this warehouse", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn stock_variant(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<StockVariantInput>,
) -> Result<(StatusCode, Json<ApiResponse<StockedVariant>>), ServiceError> {
    let (inventory, adjustment) = state
        .services
        .inventory
        .stock_variant(tenant.store_id, tenant.user_id, payload)
        .await?;
    info!(inventory_id = %inventory.id, "variant stocked");
    Ok(created(StockedVariant {
        inventory,
        adjustment,
    }))
}

/// Inventory rows at or below their reorder point
#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses(
        (status = 200, description = "Low stock rows", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "inventory"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> ApiResult<Vec<inventory::Model>> {
    let rows = state.services.inventory.low_stock(tenant.store_id).await?;
    Ok(ok(rows))
}

/// Get an inventory row
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory ID")),
    responses(
        (status = 200, description = "Inventory row", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Inventory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<inventory::Model> {
    let row = state.services.inventory.get(tenant.store_id, id).await?;
    Ok(ok(row))
}

/// Update reorder point and bin location
#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}",
    request_body = UpdateInventorySettings,
    params(("id" = Uuid, Path, description = "Inventory ID")),
    responses(
        (status = 200, description = "Settings updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Inventory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn update_inventory(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInventorySettings>,
) -> ApiResult<inventory::Model> {
    let row = state
        .services
        .inventory
        .update_settings(tenant.store_id, id, payload)
        .await?;
    Ok(ok(row))
}

/// Book a quantity change against the ledger
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/adjust",
    request_body = AdjustQuantity,
    params(("id" = Uuid, Path, description = "Inventory ID")),
    responses(
        (status = 200, description = "Adjustment recorded", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Quantity changed concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Adjustment would make stock negative", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<AdjustQuantity>,
) -> ApiResult<inventory_adjustment::Model> {
    payload.user_id = payload.user_id.or(Some(tenant.user_id));
    let adjustment = state
        .services
        .inventory
        .adjust_quantity(tenant.store_id, id, payload)
        .await?;
    Ok(ok(adjustment))
}

/// Ledger entries for an inventory row, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/adjustments",
    params(("id" = Uuid, Path, description = "Inventory ID")),
    responses(
        (status = 200, description = "Adjustments", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Inventory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_adjustments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<inventory_adjustment::Model>> {
    let rows = state
        .services
        .inventory
        .list_adjustments(tenant.store_id, id)
        .await?;
    Ok(ok(rows))
}

/// Replay the ledger and compare it with the stored quantity
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/audit",
    params(("id" = Uuid, Path, description = "Inventory ID")),
    responses(
        (status = 200, description = "Ledger audit", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Inventory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn audit_inventory(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<LedgerAudit> {
    let audit = state.services.inventory.audit(tenant.store_id, id).await?;
    Ok(ok(audit))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(stock_variant))
        .route("/low-stock", get(low_stock))
        .route("/:id", get(get_inventory).put(update_inventory))
        .route("/:id/adjust", post(adjust_inventory))
        .route("/:id/adjustments", get(list_adjustments))
        .route("/:id/audit", get(audit_inventory))
}
