//! Unified error handling for the HTTP surface.

use axum::{
    Json,
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::db::RepositoryError;
use crate::ingestion::SyncError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Sync trigger, status or teardown failed.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Analytics query failed.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Sync(SyncError::StoreNotFound(_))
            | Self::Analytics(AnalyticsError::StoreNotFound(_))
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Sync(SyncError::AlreadyRunning { .. }) => StatusCode::CONFLICT,
            Self::Sync(SyncError::Fetch { .. }) => StatusCode::BAD_GATEWAY,
            Self::Sync(
                SyncError::Configuration(_) | SyncError::Reconcile(_) | SyncError::Repository(_),
            )
            | Self::Analytics(AnalyticsError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show a client.
    fn public_message(&self) -> String {
        match self {
            Self::Sync(SyncError::Fetch { .. }) => "External service error".to_string(),
            Self::Sync(SyncError::StoreNotFound(_))
            | Self::Analytics(AnalyticsError::StoreNotFound(_)) => "Store not found".to_string(),
            Self::Sync(SyncError::AlreadyRunning { .. }) => {
                "A sync is already running for this store".to_string()
            }
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Sync(SyncError::Repository(err))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
