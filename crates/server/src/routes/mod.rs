//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                       - Liveness check
//!
//! # Sync
//! POST   /tenants/{tenant_id}/stores/{store_id}/sync        - Run a sync now
//! GET    /tenants/{tenant_id}/stores/{store_id}/sync-status - Last sync state
//! DELETE /tenants/{tenant_id}/stores/{store_id}             - Remove store and its data
//!
//! # Analytics
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/segments
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/forecast?months=N
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/product-matrix
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/alerts
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/insights
//! GET    /tenants/{tenant_id}/stores/{store_id}/analytics/summary?from=&to=
//! ```
//!
//! A store requested under a tenant that does not own it is a 404. Malformed
//! ids or query strings are a 400 with the usual `{"error": ...}` body.

pub mod analytics;
pub mod extract;
pub mod sync;

use axum::{Router, routing::get};

use crate::error::AppError;
use crate::state::AppState;

/// Build the complete router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(sync::router())
        .merge(analytics::router())
        .fallback(not_found)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> AppError {
    AppError::NotFound("no such route".to_string())
}
