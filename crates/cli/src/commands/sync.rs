//! One-shot sync commands.
//!
//! # Usage
//!
//! ```bash
//! # Sync one store
//! sp-cli sync 3
//!
//! # Sync every store, pausing between them like the scheduler does
//! sp-cli sync-all
//! ```

use std::sync::Arc;

use thiserror::Error;

use storepulse_core::StoreId;
use storepulse_server::config::{ConfigError, SchedulerConfig, ShopifyConfig};
use storepulse_server::db::{PgStoreRepository, RepositoryError, StoreRepository};
use storepulse_server::ingestion::{SyncError, SyncScheduler, SyncService};

use super::{ConnectError, connect};

/// Errors that can occur during a sync command.
#[derive(Debug, Error)]
pub enum SyncCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store {0} not found")]
    StoreNotFound(StoreId),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("{0} store(s) failed to sync")]
    SweepFailures(usize),
}

async fn service() -> Result<SyncService, SyncCommandError> {
    let pool = connect().await?;
    let shopify = ShopifyConfig::from_env()?;
    Ok(SyncService::new(Arc::new(PgStoreRepository::new(pool)), shopify))
}

/// Sync the store with ID `store_id`.
pub async fn one(store_id: i32) -> Result<(), SyncCommandError> {
    let service = service().await?;
    let store_id = StoreId::new(store_id);

    let store = service
        .repository()
        .get_store(store_id)
        .await?
        .ok_or(SyncCommandError::StoreNotFound(store_id))?;

    let outcome = service.sync_store(store.scope()).await?;
    tracing::info!(
        store_id = %store.id,
        shop = %store.shop_domain,
        customers = outcome.synced.customers,
        products = outcome.synced.products,
        orders = outcome.synced.orders,
        "Store synced"
    );
    Ok(())
}

/// Sync every store once.
pub async fn all() -> Result<(), SyncCommandError> {
    let service = service().await?;
    let scheduler = SyncScheduler::new(service, SchedulerConfig::from_env()?);

    let report = scheduler.run_sweep().await?;
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "Sweep finished"
    );

    if report.failed > 0 {
        return Err(SyncCommandError::SweepFailures(report.failed));
    }
    Ok(())
}
