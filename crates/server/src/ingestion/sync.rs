//! Per-store sync orchestration.
//!
//! A sync walks customers, products and orders in that order. Each entity
//! type is streamed page by page from the Admin API and every page is
//! reconciled before the next one is consumed. A failure at any stage is
//! recorded on the store's [`SyncStatus`] and returned to the caller.
//!
//! Only one sync per store may be in flight. The [`SyncRegistry`] hands out
//! a guard per run; a second trigger fails with [`SyncError::AlreadyRunning`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use storepulse_core::{StoreId, StoreScope, SyncPhase};

use super::reconcile::{Reconcile, ReconcileContext, ReconcileError, ReconcileSummary, reconcile};
use crate::config::ShopifyConfig;
use crate::db::{RepositoryError, StoreRepository};
use crate::models::{ShopCredentials, Store, StoreTeardown, SyncStatus};
use crate::shopify::{
    Customers, EntityKind, Orders, Products, RemoteEntity, ShopifyClient, ShopifyError,
};

/// Pages buffered between the fetcher and the reconciler.
const PAGE_BUFFER: usize = 2;

/// Errors from a sync run or a store teardown.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The store does not exist under the requested tenant.
    #[error("store not found: {0}")]
    StoreNotFound(StoreScope),

    /// No credentials are available for the store.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Another sync of the store is in flight.
    #[error("a sync of store {store_id} is already running (generation {generation})")]
    AlreadyRunning { store_id: StoreId, generation: u64 },

    /// Fetching an entity type from the Admin API failed.
    #[error("failed to fetch {entity}: {source}")]
    Fetch {
        entity: EntityKind,
        #[source]
        source: ShopifyError,
    },

    /// Persisting a fetched record failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Reading or writing store bookkeeping failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct RunState {
    generation: u64,
    phase: SyncPhase,
}

/// In-flight sync runs, keyed by store.
#[derive(Debug, Default)]
pub struct SyncRegistry {
    runs: Mutex<HashMap<StoreId, RunState>>,
    generation: AtomicU64,
}

impl SyncRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `store_id` for a new run.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::AlreadyRunning` if the store is already claimed.
    pub fn begin(self: &Arc<Self>, store_id: StoreId) -> Result<RunGuard, SyncError> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(run) = runs.get(&store_id) {
            return Err(SyncError::AlreadyRunning {
                store_id,
                generation: run.generation,
            });
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        runs.insert(
            store_id,
            RunState {
                generation,
                phase: SyncPhase::Idle,
            },
        );

        Ok(RunGuard {
            registry: Arc::clone(self),
            store_id,
            generation,
        })
    }

    /// Phase of the run in flight for `store_id`, if any.
    #[must_use]
    pub fn current_phase(&self, store_id: StoreId) -> Option<SyncPhase> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&store_id)
            .map(|run| run.phase)
    }

    /// Number of runs in flight.
    #[must_use]
    pub fn active(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Claim on one store; released on drop.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<SyncRegistry>,
    store_id: StoreId,
    generation: u64,
}

impl RunGuard {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Move the run to `phase`.
    pub fn advance(&self, phase: SyncPhase) {
        let mut runs = self
            .registry
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(run) = runs.get_mut(&self.store_id) {
            if !run.phase.can_transition_to(phase) {
                warn!(
                    store_id = %self.store_id,
                    from = %run.phase,
                    to = %phase,
                    "Unexpected sync phase transition"
                );
            }
            run.phase = phase;
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self
            .registry
            .runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if runs
            .get(&self.store_id)
            .is_some_and(|run| run.generation == self.generation)
        {
            runs.remove(&self.store_id);
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Records processed per entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedCounts {
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
}

/// Result of a successful sync run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub synced: SyncedCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub generation: u64,
}

/// Sync bookkeeping for a store, with the live phase when a run is in flight.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub store_id: StoreId,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub phase: SyncPhase,
    #[serde(flatten)]
    pub status: SyncStatus,
}

// =============================================================================
// Service
// =============================================================================

/// Runs syncs for any store in the repository.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncServiceInner>,
}

struct SyncServiceInner {
    repo: Arc<dyn StoreRepository>,
    registry: Arc<SyncRegistry>,
    shopify: ShopifyConfig,
}

impl SyncService {
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>, shopify: ShopifyConfig) -> Self {
        Self {
            inner: Arc::new(SyncServiceInner {
                repo,
                registry: Arc::new(SyncRegistry::new()),
                shopify,
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SyncRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn StoreRepository> {
        &self.inner.repo
    }

    /// Sync one store end to end.
    ///
    /// # Errors
    ///
    /// Fails fast with `AlreadyRunning`, `StoreNotFound` or `Configuration`
    /// before anything is fetched. Fetch and reconcile failures are recorded
    /// on the store's sync status before being returned; records reconciled
    /// before the failure stay committed.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn sync_store(&self, scope: StoreScope) -> Result<SyncOutcome, SyncError> {
        let store = self.load_store(scope).await?;
        let guard = self.inner.registry.begin(store.id)?;
        let credentials = self.resolve_credentials(&store).await?;
        let client = ShopifyClient::new(&credentials, self.inner.shopify.endpoint_override.as_ref())
            .map_err(|e| SyncError::Configuration(e.to_string()))?;

        let started_at = Utc::now();
        info!(generation = guard.generation(), shop = %store.shop_domain, "Starting sync");

        match self.run(&guard, scope, &client).await {
            Ok(synced) => {
                let finished_at = Utc::now();
                guard.advance(SyncPhase::Succeeded);
                info!(
                    customers = synced.customers,
                    products = synced.products,
                    orders = synced.orders,
                    "Sync complete"
                );
                Ok(SyncOutcome {
                    success: true,
                    synced,
                    started_at,
                    finished_at,
                    generation: guard.generation(),
                })
            }
            Err(e) => {
                guard.advance(SyncPhase::Failed);
                error!(error = %e, "Sync failed");
                self.record_failure(scope, &e).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        guard: &RunGuard,
        scope: StoreScope,
        client: &ShopifyClient,
    ) -> Result<SyncedCounts, SyncError> {
        let ctx = ReconcileContext {
            repo: self.inner.repo.as_ref(),
            scope,
            now: Utc::now(),
        };

        guard.advance(SyncPhase::FetchingCustomers);
        let customers = sync_entity::<Customers>(client, ctx).await?;

        guard.advance(SyncPhase::FetchingProducts);
        let products = sync_entity::<Products>(client, ctx).await?;

        guard.advance(SyncPhase::FetchingOrders);
        let orders = sync_entity::<Orders>(client, ctx).await?;

        guard.advance(SyncPhase::Finalizing);
        let finished_at = Utc::now();
        self.inner
            .repo
            .mark_store_synced(scope.store_id, finished_at)
            .await?;
        self.inner
            .repo
            .save_sync_status(scope, &SyncStatus::succeeded(finished_at))
            .await?;

        Ok(SyncedCounts {
            customers: customers.count(),
            products: products.count(),
            orders: orders.count(),
        })
    }

    /// Store the error message, keeping the previous success timestamps.
    async fn record_failure(&self, scope: StoreScope, failure: &SyncError) {
        let previous = match self.inner.repo.get_sync_status(scope).await {
            Ok(status) => status.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load sync status");
                SyncStatus::default()
            }
        };
        let status = previous.failed(failure.to_string(), Utc::now());
        if let Err(e) = self.inner.repo.save_sync_status(scope, &status).await {
            warn!(error = %e, "Failed to record sync failure");
        }
    }

    async fn load_store(&self, scope: StoreScope) -> Result<Store, SyncError> {
        self.inner
            .repo
            .get_store(scope.store_id)
            .await?
            .filter(|store| store.tenant_id == scope.tenant_id)
            .ok_or(SyncError::StoreNotFound(scope))
    }

    /// Stored credentials, else the direct-access fallback.
    async fn resolve_credentials(&self, store: &Store) -> Result<ShopCredentials, SyncError> {
        if let Some(credentials) = self.inner.repo.get_credentials(store.id).await? {
            return Ok(credentials);
        }
        if let Some(credentials) = &self.inner.shopify.dev_direct {
            warn!(shop = %credentials.shop_domain, "No stored credentials, using direct-access fallback");
            return Ok(credentials.clone());
        }
        Err(SyncError::Configuration(format!(
            "no credentials for store {} and no direct-access fallback configured",
            store.id
        )))
    }

    /// Sync bookkeeping for a store.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` if the tenant does not own the store.
    pub async fn status(&self, scope: StoreScope) -> Result<SyncStatusView, SyncError> {
        let store = self.load_store(scope).await?;
        let status = self.inner.repo.get_sync_status(scope).await?.unwrap_or_default();
        let phase = self
            .inner
            .registry
            .current_phase(scope.store_id)
            .unwrap_or(SyncPhase::Idle);

        Ok(SyncStatusView {
            store_id: store.id,
            last_synced_at: store.last_synced_at,
            phase,
            status,
        })
    }

    /// Remove a store and everything ingested for it.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` while a sync of the store is in flight and
    /// `StoreNotFound` if the tenant does not own the store.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn delete_store(&self, scope: StoreScope) -> Result<StoreTeardown, SyncError> {
        let store = self.load_store(scope).await?;
        let _guard = self.inner.registry.begin(store.id)?;
        let teardown = self
            .inner
            .repo
            .delete_store(scope)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => SyncError::StoreNotFound(scope),
                other => SyncError::Repository(other),
            })?;

        info!(
            line_items = teardown.line_items,
            orders = teardown.orders,
            products = teardown.products,
            customers = teardown.customers,
            "Store deleted"
        );
        Ok(teardown)
    }
}

/// Stream every page of `E` and reconcile each as it arrives.
async fn sync_entity<E>(
    client: &ShopifyClient,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileSummary, SyncError>
where
    E: RemoteEntity,
    E::Record: Reconcile,
{
    let mut pages = client.stream_pages::<E>(PAGE_BUFFER);
    let mut summary = ReconcileSummary::default();

    while let Some(page) = pages.recv().await {
        let records = page.map_err(|source| SyncError::Fetch {
            entity: E::KIND,
            source,
        })?;
        summary.absorb(reconcile(ctx, &records).await?);
    }

    info!(entity = %E::KIND, count = summary.count(), "Entity synced");
    Ok(summary)
}
