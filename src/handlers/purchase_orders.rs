use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{created, ok, ok_with_message, ReasonRequest, TenantContext};
use crate::{
    entities::purchase_order::{self, PurchaseOrderStatus},
    errors::ServiceError,
    services::purchase_orders::{
        CreatePurchaseOrder, PurchaseOrderDetail, PurchaseOrderProgress, ReceiptDetail,
        ReceiveInput, ReceiveOutcome, UpdatePurchaseOrder,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PurchaseOrderQuery {
    pub status: Option<PurchaseOrderStatus>,
    #[serde(default = "first_page")]
    pub page: u64,
    pub per_page: Option<u64>,
}

fn first_page() -> u64 {
    1
}

/// Create a draft purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrder,
    responses(
        (status = 201, description = "Purchase order created", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Vendor, warehouse or variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreatePurchaseOrder>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseOrderDetail>>), ServiceError> {
    let detail = state
        .services
        .purchase_orders
        .create(tenant.store_id, tenant.user_id, payload)
        .await?;
    Ok(created(detail))
}

/// List purchase orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PurchaseOrderQuery),
    responses(
        (status = 200, description = "Purchase orders", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<PurchaseOrderQuery>,
) -> ApiResult<PaginatedResponse<purchase_order::Model>> {
    let page = query.page.max(1);
    let limit = state.config.page_size(query.per_page);
    let (items, total) = state
        .services
        .purchase_orders
        .list(tenant.store_id, query.status, page, limit)
        .await?;
    Ok(ok(PaginatedResponse::new(items, total, page, limit)))
}

/// Get a purchase order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrderDetail> {
    let detail = state
        .services
        .purchase_orders
        .get(tenant.store_id, id)
        .await?;
    Ok(ok(detail))
}

/// Edit a draft purchase order
#[utoipa::path(
    put,
    path = "/api/v1/purchase-orders/{id}",
    request_body = UpdatePurchaseOrder,
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Modified concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not a draft", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn update_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseOrder>,
) -> ApiResult<PurchaseOrderDetail> {
    let detail = state
        .services
        .purchase_orders
        .update(tenant.store_id, id, payload)
        .await?;
    Ok(ok(detail))
}

/// Delete a draft purchase order
#[utoipa::path(
    delete,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Not a draft", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state
        .services
        .purchase_orders
        .delete(tenant.store_id, id)
        .await?;
    Ok(ok_with_message(id, "Purchase order deleted"))
}

/// Submit a draft for approval
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/submit",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order submitted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn submit_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .submit(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(po))
}

/// Approve a submitted purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/approve",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order approved", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn approve_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .approve(tenant.store_id, tenant.user_id, id)
        .await?;
    info!(purchase_order_id = %po.id, approver = %tenant.user_id, "purchase order approved");
    Ok(ok(po))
}

/// Cancel a purchase order that has not been received against
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<purchase_order::Model> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let po = state
        .services
        .purchase_orders
        .cancel(tenant.store_id, tenant.user_id, id, reason)
        .await?;
    Ok(ok(po))
}

/// Close a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/close",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order closed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn close_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .close(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(po))
}

/// Receive goods against an approved purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receive",
    request_body = ReceiveInput,
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Goods received", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Modified concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Nothing to receive or not receivable", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveInput>,
) -> ApiResult<ReceiveOutcome> {
    let outcome = state
        .services
        .purchase_orders
        .receive(tenant.store_id, tenant.user_id, id, payload)
        .await?;
    Ok(ok(outcome))
}

/// Receipts recorded against a purchase order
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}/receipts",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Receipts", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ReceiptDetail>> {
    let receipts = state
        .services
        .purchase_orders
        .receipts(tenant.store_id, id)
        .await?;
    Ok(ok(receipts))
}

/// Ordered, received and outstanding units
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}/progress",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Receiving progress", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn purchase_order_progress(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrderProgress> {
    let progress = state
        .services
        .purchase_orders
        .progress(tenant.store_id, id)
        .await?;
    Ok(ok(progress))
}

/// Creates the router for purchase order endpoints
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route(
            "/:id",
            get(get_purchase_order)
                .put(update_purchase_order)
                .delete(delete_purchase_order),
        )
        .route("/:id/submit", post(submit_purchase_order))
        .route("/:id/approve", post(approve_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/close", post(close_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/receipts", get(list_receipts))
        .route("/:id/progress", get(purchase_order_progress))
}
