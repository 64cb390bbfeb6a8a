use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{created, ok, ReasonRequest, TenantContext};
use crate::{
    entities::{activity_log, transaction, transaction_item},
    errors::ServiceError,
    services::{
        collaborators::{LabelKind, LabelOptions},
        transaction_workflow::{TransactionStatus, TransactionType},
        transactions::{
            CreateTransaction, NewItem, PaymentLine, ReviewItem, TransactionDetail,
            TransactionFilter,
        },
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
    #[serde(default = "first_page")]
    pub page: u64,
    pub per_page: Option<u64>,
}

fn first_page() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct TrackingRequest {
    pub tracking_number: String,
    pub carrier: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OfferRequest {
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentsRequest {
    pub payments: Vec<PaymentLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StatusChangeRequest {
    pub status: TransactionStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ShippingLabelRequest {
    pub kind: LabelKind,
    #[serde(default)]
    pub options: LabelOptions,
}

fn reason_of(payload: Option<Json<ReasonRequest>>) -> Option<String> {
    payload.and_then(|Json(body)| body.reason)
}

/// Open a buy transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = CreateTransaction,
    responses(
        (status = 201, description = "Transaction created", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateTransaction>,
) -> Result<(StatusCode, Json<ApiResponse<transaction::Model>>), ServiceError> {
    let txn = state
        .services
        .transactions
        .create(tenant.store_id, tenant.user_id, payload)
        .await?;
    Ok(created(txn))
}

/// List transactions, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transactions", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<PaginatedResponse<transaction::Model>> {
    let page = query.page.max(1);
    let limit = state.config.page_size(query.per_page);
    let filter = TransactionFilter {
        status: query.status,
        transaction_type: query.transaction_type,
    };
    let (items, total) = state
        .services
        .transactions
        .list(tenant.store_id, filter, page, limit)
        .await?;
    Ok(ok(PaginatedResponse::new(items, total, page, limit)))
}

/// Get a transaction with items, offers, payments and open actions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<TransactionDetail> {
    let detail = state.services.transactions.get(tenant.store_id, id).await?;
    Ok(ok(detail))
}

/// Add an item while the transaction still accepts items
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/items",
    request_body = NewItem,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 201, description = "Item added", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Items are locked in this status", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn add_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewItem>,
) -> Result<(StatusCode, Json<ApiResponse<transaction_item::Model>>), ServiceError> {
    let item = state
        .services
        .transactions
        .add_item(tenant.store_id, id, payload)
        .await?;
    Ok(created(item))
}

/// Record the buy price and condition of an item
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/items/{item_id}/review",
    request_body = ReviewItem,
    params(
        ("id" = Uuid, Path, description = "Transaction ID"),
        ("item_id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item reviewed", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn review_item(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewItem>,
) -> ApiResult<transaction_item::Model> {
    let item = state
        .services
        .transactions
        .review_item(tenant.store_id, tenant.user_id, id, item_id, payload)
        .await?;
    Ok(ok(item))
}

/// Confirm a mail-in kit request
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/confirm-kit",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Kit request confirmed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn confirm_kit_request(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .confirm_kit_request(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Reject a mail-in kit request
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/reject-kit",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Kit request rejected", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn reject_kit_request(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .reject_kit_request(tenant.store_id, tenant.user_id, id, reason_of(payload))
        .await?;
    Ok(ok(txn))
}

/// Put a mail-in kit request on hold
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/hold-kit",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Kit request on hold", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn hold_kit_request(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .hold_kit_request(tenant.store_id, tenant.user_id, id, reason_of(payload))
        .await?;
    Ok(ok(txn))
}

/// Record the outbound kit shipment
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/kit-sent",
    request_body = TrackingRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Kit sent", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed or tracking missing", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_kit_sent(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_kit_sent(
            tenant.store_id,
            tenant.user_id,
            id,
            payload.tracking_number,
            payload.carrier,
        )
        .await?;
    Ok(ok(txn))
}

/// Record kit delivery to the customer
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/kit-delivered",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Kit delivered", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_kit_delivered(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_kit_delivered(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Record receipt of the customer's items
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/items-received",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Items received", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_items_received(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_items_received(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Close the review once every item is priced
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/items-reviewed",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Items reviewed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Unreviewed items or transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_items_reviewed(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_items_reviewed(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Make an offer to the customer
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/offers",
    request_body = OfferRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Offer submitted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed or offer pending", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn submit_offer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<OfferRequest>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .submit_offer(tenant.store_id, tenant.user_id, id, payload.amount, payload.notes)
        .await?;
    Ok(ok(txn))
}

/// Accept the pending offer
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/offers/accept",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Offer accepted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "No pending offer", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn accept_offer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .accept_offer(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Decline the pending offer
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/offers/decline",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Offer declined", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "No pending offer", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn decline_offer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .decline_offer(tenant.store_id, tenant.user_id, id, reason_of(payload))
        .await?;
    Ok(ok(txn))
}

/// Return a declined offer to review
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/offers/reopen",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Offer reopened", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn reopen_offer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .reopen_offer(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Withdraw an offer and go back to items reviewed
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/offers/{offer_id}/reset",
    params(
        ("id" = Uuid, Path, description = "Transaction ID"),
        ("offer_id" = Uuid, Path, description = "Offer ID")
    ),
    responses(
        (status = 200, description = "Transaction reset", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn reset_offer(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((id, offer_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .reset_to_items_reviewed(tenant.store_id, tenant.user_id, id, offer_id)
        .await?;
    Ok(ok(txn))
}

/// Ask for the accepted offer to be paid
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/request-payment",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Payment requested", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn request_payment(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .request_payment(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Pay the customer, optionally split across several methods
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/payments",
    request_body = PaymentsRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Payment processed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Payments do not match the offer", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payout provider failed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn process_payments(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentsRequest>,
) -> ApiResult<transaction::Model> {
    let service = &state.services.transactions;
    let mut lines = payload.payments;
    let txn = if lines.len() == 1 {
        let line = lines.remove(0);
        service
            .process_payment(tenant.store_id, tenant.user_id, id, line)
            .await?
    } else {
        service
            .process_multiple_payments(tenant.store_id, tenant.user_id, id, lines)
            .await?
    };
    Ok(ok(txn))
}

/// Customer asked for their items back
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/request-return",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Return requested", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn request_return(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .request_return(tenant.store_id, tenant.user_id, id, reason_of(payload))
        .await?;
    Ok(ok(txn))
}

/// Record the return shipment
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/return-shipped",
    request_body = TrackingRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Return shipped", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed or tracking missing", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_return_shipped(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_return_shipped(
            tenant.store_id,
            tenant.user_id,
            id,
            payload.tracking_number,
            payload.carrier,
        )
        .await?;
    Ok(ok(txn))
}

/// Record that the customer has their items back
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/items-returned",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Items returned", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn mark_items_returned(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .mark_items_returned(tenant.store_id, tenant.user_id, id)
        .await?;
    Ok(ok(txn))
}

/// Cancel a transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/cancel",
    request_body = ReasonRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .cancel(tenant.store_id, tenant.user_id, id, reason_of(payload))
        .await?;
    Ok(ok(txn))
}

/// Move to a target status through the single action that reaches it
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{id}/status",
    request_body = StatusChangeRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Status changed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Target not reachable from the current status", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn change_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChangeRequest>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .change_status(
            tenant.store_id,
            tenant.user_id,
            id,
            payload.status,
            payload.reason,
        )
        .await?;
    Ok(ok(txn))
}

/// Buy an outbound or return label from the shipping provider
#[utoipa::path(
    post,
    path = "/api/v1/transactions/{id}/shipping-labels",
    request_body = ShippingLabelRequest,
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Label created", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Not a mail-in transaction, wrong status or provider not configured", body = crate::errors::ErrorResponse),
        (status = 502, description = "Shipping provider failed", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn create_shipping_label(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShippingLabelRequest>,
) -> ApiResult<transaction::Model> {
    let txn = state
        .services
        .transactions
        .create_shipping_label(
            tenant.store_id,
            tenant.user_id,
            id,
            payload.kind,
            payload.options,
        )
        .await?;
    Ok(ok(txn))
}

/// Download a label as PDF
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}/shipping-labels/{kind}",
    params(
        ("id" = Uuid, Path, description = "Transaction ID"),
        ("kind" = LabelKind, Path, description = "outbound or return")
    ),
    responses(
        (status = 200, description = "Label PDF", content_type = "application/pdf"),
        (status = 422, description = "No label of this kind", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn download_label(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path((id, kind)): Path<(Uuid, LabelKind)>,
) -> Result<impl IntoResponse, ServiceError> {
    let pdf = state
        .services
        .transactions
        .label_pdf(tenant.store_id, id, kind)
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf))
}

/// Audit trail of a transaction, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}/activity",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Activity log", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transactions"
)]
pub async fn transaction_activity(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<activity_log::Model>> {
    let rows = state
        .services
        .transactions
        .activity(tenant.store_id, id)
        .await?;
    Ok(ok(rows))
}

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/:id", get(get_transaction))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id/review", post(review_item))
        .route("/:id/confirm-kit", post(confirm_kit_request))
        .route("/:id/reject-kit", post(reject_kit_request))
        .route("/:id/hold-kit", post(hold_kit_request))
        .route("/:id/kit-sent", post(mark_kit_sent))
        .route("/:id/kit-delivered", post(mark_kit_delivered))
        .route("/:id/items-received", post(mark_items_received))
        .route("/:id/items-reviewed", post(mark_items_reviewed))
        .route("/:id/offers", post(submit_offer))
        .route("/:id/offers/accept", post(accept_offer))
        .route("/:id/offers/decline", post(decline_offer))
        .route("/:id/offers/reopen", post(reopen_offer))
        .route("/:id/offers/:offer_id/reset", post(reset_offer))
        .route("/:id/request-payment", post(request_payment))
        .route("/:id/payments", post(process_payments))
        .route("/:id/request-return", post(request_return))
        .route("/:id/return-shipped", post(mark_return_shipped))
        .route("/:id/items-returned", post(mark_items_returned))
        .route("/:id/cancel", post(cancel_transaction))
        .route("/:id/status", axum::routing::put(change_status))
        .route("/:id/shipping-labels", post(create_shipping_label))
        .route("/:id/shipping-labels/:kind", get(download_label))
        .route("/:id/activity", get(transaction_activity))
}
