//! Application state shared across handlers.

use std::sync::Arc;

use crate::analytics::AnalyticsService;
use crate::config::ShopifyConfig;
use crate::db::StoreRepository;
use crate::ingestion::SyncService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sync: SyncService,
    analytics: AnalyticsService,
}

impl AppState {
    /// Create a new application state over `repo`.
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>, shopify: ShopifyConfig) -> Self {
        let sync = SyncService::new(Arc::clone(&repo), shopify);
        let analytics = AnalyticsService::new(repo);
        Self {
            inner: Arc::new(AppStateInner {
                sync,
                analytics,
            }),
        }
    }

    /// Get a reference to the sync orchestrator.
    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    #[must_use]
    pub fn analytics(&self) -> &AnalyticsService {
        &self.inner.analytics
    }
}
