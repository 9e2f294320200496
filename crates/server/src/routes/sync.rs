//! Sync trigger, status and store teardown handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use tracing::instrument;

use crate::error::AppError;
use crate::ingestion::{SyncOutcome, SyncStatusView};
use crate::models::StoreTeardown;
use crate::routes::extract::StorePath;
use crate::state::AppState;

/// Build the sync router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tenants/{tenant_id}/stores/{store_id}/sync", post(trigger_sync))
        .route("/tenants/{tenant_id}/stores/{store_id}/sync-status", get(sync_status))
        .route("/tenants/{tenant_id}/stores/{store_id}", delete(delete_store))
}

/// Run a full sync of the store and wait for it to finish.
///
/// # Errors
///
/// 404 for an unknown store, 409 while another sync of the store runs, 502
/// when Shopify fails.
#[instrument(skip(state))]
pub async fn trigger_sync(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state
        .sync()
        .sync_store(scope)
        .await?;
    Ok(Json(outcome))
}

/// Last sync timestamps, error and live phase.
///
/// # Errors
///
/// 404 for an unknown store.
pub async fn sync_status(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<SyncStatusView>, AppError> {
    let status = state
        .sync()
        .status(scope)
        .await?;
    Ok(Json(status))
}

/// Remove the store and everything ingested for it.
///
/// # Errors
///
/// 404 for an unknown store, 409 while a sync of the store runs.
#[instrument(skip(state))]
pub async fn delete_store(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<StoreTeardown>, AppError> {
    let teardown = state
        .sync()
        .delete_store(scope)
        .await?;
    Ok(Json(teardown))
}
