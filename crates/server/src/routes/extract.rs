//! Request extractors whose rejections use the JSON error body.

use axum::{
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use storepulse_core::{StoreId, StoreScope, TenantId};

use crate::error::AppError;

/// `{tenant_id}/{store_id}` path segments as a store scope.
///
/// Non-numeric ids are a 400 with `{"error": ...}`.
#[derive(Debug, Clone, Copy)]
pub struct StorePath(pub StoreScope);

impl<S> FromRequestParts<S> for StorePath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((tenant_id, store_id)) =
            Path::<(TenantId, StoreId)>::from_request_parts(parts, state).await?;
        Ok(Self(StoreScope::new(tenant_id, store_id)))
    }
}

/// Query string extractor that rejects with [`AppError::BadRequest`].
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        http::{Method, StatusCode},
        routing::get,
    };
    use serde::Deserialize;

    use super::*;
    use crate::routes::test_support::send;

    #[derive(Debug, Deserialize)]
    struct Window {
        days: u32,
    }

    async fn echo(StorePath(scope): StorePath, ApiQuery(window): ApiQuery<Window>) -> String {
        format!("{}:{}:{}", scope.tenant_id, scope.store_id, window.days)
    }

    fn router() -> Router {
        Router::new().route("/t/{tenant_id}/s/{store_id}", get(echo))
    }

    #[tokio::test]
    async fn test_bad_path_segment_is_json_400() {
        let (status, body) = send(&router(), Method::GET, "/t/acme/s/1?days=3").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Bad request: "));
    }

    #[tokio::test]
    async fn test_bad_query_is_json_400() {
        let (status, body) = send(&router(), Method::GET, "/t/1/s/2?days=soon").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Bad request: "));
    }

    #[tokio::test]
    async fn test_missing_query_field_is_json_400() {
        let (status, body) = send(&router(), Method::GET, "/t/1/s/2").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
