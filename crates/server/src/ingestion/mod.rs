//! Ingestion pipeline: reconcile fetched records, orchestrate per-store
//! syncs and sweep all stores on a schedule.

mod reconcile;
mod scheduler;
mod sync;

pub use reconcile::{
    Reconcile, ReconcileContext, ReconcileError, ReconcileSummary, line_item_key, reconcile,
};
pub use scheduler::{SweepReport, SyncScheduler};
pub use sync::{
    RunGuard, SyncError, SyncOutcome, SyncRegistry, SyncService, SyncStatusView, SyncedCounts,
};
