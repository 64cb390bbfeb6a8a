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
    entities::platform_listing::{self, ListingStatus, Platform},
    errors::ServiceError,
    services::listings::{
        BulkPublishOutcome, BulkStatusOutcome, CreateListing, ListingFilter, UpdateListing,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Deserialize, Serialize, IntoParams)]
pub struct ListingQuery {
    pub product_id: Option<Uuid>,
    pub platform: Option<Platform>,
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ListingStatusRequest {
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BulkStatusRequest {
    pub ids: Vec<Uuid>,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BulkPublishRequest {
    pub ids: Vec<Uuid>,
}

/// Create a draft listing of a product on a platform
#[utoipa::path(
    post,
    path = "/api/v1/listings",
    request_body = CreateListing,
    responses(
        (status = 201, description = "Listing created", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Product already listed on this platform", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn create_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateListing>,
) -> Result<(StatusCode, Json<ApiResponse<platform_listing::Model>>), ServiceError> {
    let listing = state
        .services
        .listings
        .create(tenant.store_id, payload)
        .await?;
    Ok(created(listing))
}

#[utoipa::path(
    get,
    path = "/api/v1/listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "listings"
)]
pub async fn list_listings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Vec<platform_listing::Model>> {
    let filter = ListingFilter {
        product_id: query.product_id,
        platform: query.platform,
        status: query.status,
    };
    let listings = state
        .services
        .listings
        .list(tenant.store_id, filter)
        .await?;
    Ok(ok(listings))
}

#[utoipa::path(
    get,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Listing not found", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn get_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<platform_listing::Model> {
    let listing = state.services.listings.get(tenant.store_id, id).await?;
    Ok(ok(listing))
}

/// Change price or quantity overrides
#[utoipa::path(
    put,
    path = "/api/v1/listings/{id}",
    request_body = UpdateListing,
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Modified concurrently", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn update_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListing>,
) -> ApiResult<platform_listing::Model> {
    let listing = state
        .services
        .listings
        .update(tenant.store_id, id, payload)
        .await?;
    Ok(ok(listing))
}

/// Remove the listing from its platform and delete it
#[utoipa::path(
    delete,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 502, description = "Platform rejected the removal", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn delete_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state
        .services
        .listings
        .delete_remote(tenant.store_id, id)
        .await?;
    Ok(ok_with_message(id, "Listing deleted"))
}

/// Local status change, not sent to the platform
#[utoipa::path(
    put,
    path = "/api/v1/listings/{id}/status",
    request_body = ListingStatusRequest,
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Status changed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn change_listing_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ListingStatusRequest>,
) -> ApiResult<platform_listing::Model> {
    let listing = state
        .services
        .listings
        .transition_to(tenant.store_id, id, payload.status)
        .await?;
    Ok(ok(listing))
}

/// Push the listing to its platform
#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/publish",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing published", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Platform not configured or transition not allowed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Platform call failed", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn publish_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<platform_listing::Model> {
    let listing = state
        .services
        .listings
        .publish(tenant.store_id, id)
        .await?;
    Ok(ok(listing))
}

#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/unlist",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing ended", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Listing is not live", body = crate::errors::ErrorResponse),
        (status = 502, description = "Platform call failed", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn unlist_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<platform_listing::Model> {
    let listing = state.services.listings.unlist(tenant.store_id, id).await?;
    Ok(ok(listing))
}

#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/relist",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing relisted", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Listing has not ended", body = crate::errors::ErrorResponse),
        (status = 502, description = "Platform call failed", body = crate::errors::ErrorResponse)
    ),
    tag = "listings"
)]
pub async fn relist_listing(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<platform_listing::Model> {
    let listing = state.services.listings.relist(tenant.store_id, id).await?;
    Ok(ok(listing))
}

/// Apply one status to many listings; failures are reported per listing
#[utoipa::path(
    post,
    path = "/api/v1/listings/bulk-status",
    request_body = BulkStatusRequest,
    responses(
        (status = 200, description = "Bulk outcome", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "listings"
)]
pub async fn bulk_update_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<BulkStatusRequest>,
) -> ApiResult<BulkStatusOutcome> {
    let outcome = state
        .services
        .listings
        .bulk_update_status(tenant.store_id, payload.ids, payload.status)
        .await;
    Ok(ok(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/listings/bulk-publish",
    request_body = BulkPublishRequest,
    responses(
        (status = 200, description = "Bulk outcome", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "listings"
)]
pub async fn bulk_publish(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<BulkPublishRequest>,
) -> ApiResult<BulkPublishOutcome> {
    let outcome = state
        .services
        .listings
        .bulk_publish(tenant.store_id, payload.ids)
        .await;
    Ok(ok(outcome))
}

pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_listing).get(list_listings))
        .route("/bulk-status", post(bulk_update_status))
        .route("/bulk-publish", post(bulk_publish))
        .route(
            "/:id",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
        .route("/:id/status", axum::routing::put(change_listing_status))
        .route("/:id/publish", post(publish_listing))
        .route("/:id/unlist", post(unlist_listing))
        .route("/:id/relist", post(relist_listing))
}
