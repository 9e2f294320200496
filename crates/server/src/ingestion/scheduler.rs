//! Periodic sync of every connected store.
//!
//! Stores are swept one at a time with a pause between them. The pause
//! doubles after each consecutive failure (up to `max_backoff`) and always
//! gets a random jitter on top, so a misbehaving upstream is not hammered.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::sync::{SyncError, SyncService};
use crate::config::SchedulerConfig;

/// Doublings applied to the inter-store delay at most.
const MAX_BACKOFF_EXPONENT: u32 = 4;

/// Result of one pass over all stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Stores already being synced by someone else.
    pub skipped: usize,
}

/// Background driver for [`SyncService`].
#[derive(Clone)]
pub struct SyncScheduler {
    sync: SyncService,
    config: SchedulerConfig,
}

impl SyncScheduler {
    #[must_use]
    pub const fn new(sync: SyncService, config: SchedulerConfig) -> Self {
        Self { sync, config }
    }

    /// Pause before the next store, given the failures seen in a row.
    #[must_use]
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.min(MAX_BACKOFF_EXPONENT);
        let backoff = self
            .config
            .store_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.config.max_backoff);

        #[allow(clippy::cast_possible_truncation)]
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };

        backoff + jitter
    }

    /// Sync every store once, sequentially.
    ///
    /// Individual failures are logged and counted; they never stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store list cannot be loaded.
    pub async fn run_sweep(&self) -> Result<SweepReport, SyncError> {
        let (_keep_open, mut shutdown) = watch::channel(false);
        self.sweep_until(&mut shutdown).await
    }

    /// Like [`Self::run_sweep`], but stops before the next store once
    /// `shutdown` flips to `true`. A sync already in flight is finished.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store list cannot be loaded.
    #[instrument(skip_all)]
    pub async fn sweep_until(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SweepReport, SyncError> {
        let stores = self.sync.repository().list_stores().await?;
        let mut report = SweepReport::default();
        let mut consecutive_failures = 0_u32;

        info!(stores = stores.len(), "Starting sync sweep");

        for (index, store) in stores.iter().enumerate() {
            if *shutdown.borrow() {
                info!(remaining = stores.len() - index, "Sync sweep interrupted by shutdown");
                break;
            }
            if index > 0 && pause(self.delay_for(consecutive_failures), shutdown).await {
                info!(remaining = stores.len() - index, "Sync sweep interrupted by shutdown");
                break;
            }

            match self.sync.sync_store(store.scope()).await {
                Ok(_) => {
                    report.succeeded += 1;
                    consecutive_failures = 0;
                }
                Err(SyncError::AlreadyRunning { .. }) => {
                    debug!(store_id = %store.id, "Sync already running, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(store_id = %store.id, tenant_id = %store.tenant_id, error = %e, "Store sync failed");
                    report.failed += 1;
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Sync sweep complete"
        );
        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` flips to `true`.
    ///
    /// Returns immediately when the scheduler is disabled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Some(interval) = self.config.interval else {
            info!("Sync scheduler disabled");
            return;
        };

        info!(interval_secs = interval.as_secs(), "Sync scheduler started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(e) = self.sweep_until(&mut shutdown).await {
                error!(error = %e, "Sync sweep failed");
            }
            if *shutdown.borrow() {
                break;
            }
        }

        info!("Sync scheduler stopped");
    }
}

/// Sleep for `delay`. Returns `true` if shutdown was requested first.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use storepulse_core::TenantId;

    use super::*;
    use crate::config::ShopifyConfig;
    use crate::db::{MemoryStoreRepository, StoreRepository};
    use crate::models::NewStore;

    fn scheduler(repo: Arc<MemoryStoreRepository>, config: SchedulerConfig) -> SyncScheduler {
        let shopify = ShopifyConfig {
            api_version: "2025-10".to_string(),
            endpoint_override: None,
            app: None,
            dev_direct: None,
        };
        SyncScheduler::new(SyncService::new(repo, shopify), config)
    }

    fn no_jitter() -> SchedulerConfig {
        SchedulerConfig {
            interval: None,
            store_delay: Duration::from_millis(200),
            jitter: Duration::ZERO,
            max_backoff: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_delay_backs_off_and_caps() {
        let scheduler = scheduler(Arc::new(MemoryStoreRepository::new()), no_jitter());

        assert_eq!(scheduler.delay_for(0), Duration::from_millis(200));
        assert_eq!(scheduler.delay_for(1), Duration::from_millis(400));
        assert_eq!(scheduler.delay_for(2), Duration::from_millis(800));
        assert_eq!(scheduler.delay_for(3), Duration::from_millis(1000));
        assert_eq!(scheduler.delay_for(50), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = SchedulerConfig {
            jitter: Duration::from_millis(100),
            ..no_jitter()
        };
        let scheduler = scheduler(Arc::new(MemoryStoreRepository::new()), config);

        for _ in 0..50 {
            let delay = scheduler.delay_for(0);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn test_sweep_counts_failures_and_continues() {
        let repo = Arc::new(MemoryStoreRepository::new());
        two_stores(&repo).await;

        // No credentials anywhere: both stores fail fast.
        let report = scheduler(repo, no_jitter()).run_sweep().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                succeeded: 0,
                failed: 2,
                skipped: 0
            }
        );
    }

    async fn two_stores(repo: &MemoryStoreRepository) {
        for domain in ["a.myshopify.com", "b.myshopify.com"] {
            repo.create_store(NewStore {
                tenant_id: TenantId::new(1),
                name: domain.to_string(),
                shop_domain: domain.to_string(),
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_pause_between_stores() {
        let repo = Arc::new(MemoryStoreRepository::new());
        two_stores(&repo).await;
        let config = SchedulerConfig {
            store_delay: Duration::from_secs(3600),
            max_backoff: Duration::from_secs(3600),
            ..no_jitter()
        };
        let scheduler = scheduler(repo, config);
        let (tx, mut rx) = watch::channel(false);

        let sweep = tokio::spawn(async move { scheduler.sweep_until(&mut rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), sweep)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded + report.skipped, 0);
    }

    #[tokio::test]
    async fn test_sweep_after_shutdown_syncs_nothing() {
        let repo = Arc::new(MemoryStoreRepository::new());
        two_stores(&repo).await;
        let (_tx, mut rx) = watch::channel(true);

        let report = scheduler(repo, no_jitter()).sweep_until(&mut rx).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_mid_sweep() {
        let repo = Arc::new(MemoryStoreRepository::new());
        two_stores(&repo).await;
        let config = SchedulerConfig {
            interval: Some(Duration::from_secs(3600)),
            store_delay: Duration::from_secs(3600),
            max_backoff: Duration::from_secs(3600),
            ..no_jitter()
        };
        let (tx, rx) = watch::channel(false);

        let running = tokio::spawn(scheduler(repo, config).run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let (_tx, rx) = watch::channel(false);
        scheduler(Arc::new(MemoryStoreRepository::new()), no_jitter())
            .run(rx)
            .await;
    }
}
