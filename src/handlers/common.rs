use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{entities::store::Entity as Store, errors::ServiceError, ApiResponse, AppState};

/// Header naming the store a request acts on.
pub const STORE_HEADER: &str = "x-store-id";
/// Header naming the acting user.
pub const USER_HEADER: &str = "x-user-id";

/// Store and user a request is made for, taken from the request headers.
/// The store must exist; everything the handler touches is scoped to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub store_id: Uuid,
    pub user_id: Uuid,
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, ServiceError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {} header", name)))?;
    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| ServiceError::Unauthorized(format!("{} must be a UUID", name)))
}

#[async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let store_id = header_uuid(parts, STORE_HEADER)?;
        let user_id = header_uuid(parts, USER_HEADER)?;

        Store::find_by_id(store_id)
            .one(state.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::Unauthorized(format!("Unknown store {}", store_id)))?;

        Ok(Self { store_id, user_id })
    }
}

/// 200 with the standard envelope.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// 200 with the standard envelope and a message.
pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data).with_message(message))
}

/// 201 with the standard envelope.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    pub per_page: Option<u64>,
}

fn default_page() -> u64 {
    1
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: None,
        }
    }
}

impl PaginationParams {
    /// Page number, 1-based.
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }
}

/// Optional free-text reason carried by several actions.
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use assert_matches::assert_matches;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = header_uuid(&parts(&[]), STORE_HEADER).unwrap_err();
        assert_matches!(err, ServiceError::Unauthorized(_));
    }

    #[test]
    fn malformed_header_is_unauthorized() {
        let err = header_uuid(&parts(&[(STORE_HEADER, "store-1")]), STORE_HEADER).unwrap_err();
        assert_matches!(err, ServiceError::Unauthorized(ref msg) if msg == "x-store-id must be a UUID");
    }

    #[test]
    fn parses_uuid_header() {
        let id = Uuid::new_v4();
        let value = id.to_string();
        let parsed = header_uuid(&parts(&[(USER_HEADER, value.as_str())]), USER_HEADER).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn page_is_at_least_one() {
        let params = PaginationParams {
            page: 0,
            per_page: Some(10),
        };
        assert_eq!(params.page(), 1);
    }
}
