use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::ok;
use crate::{
    services::sku::{FormatCheck, SkuGeneratorService},
    ApiResult, AppState,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FormatRequest {
    pub format: String,
}

/// Check a SKU format string before saving it on a category
#[utoipa::path(
    post,
    path = "/api/v1/sku/validate-format",
    request_body = FormatRequest,
    responses(
        (status = 200, description = "Format check", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "sku"
)]
pub async fn validate_format(Json(payload): Json<FormatRequest>) -> ApiResult<FormatCheck> {
    Ok(ok(SkuGeneratorService::check_format(&payload.format)))
}

pub fn sku_routes() -> Router<AppState> {
    Router::new().route("/validate-format", post(validate_format))
}
