//! Status enums for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// Phase of a single store's sync run.
///
/// Runs move strictly forward:
/// `Idle -> FetchingCustomers -> FetchingProducts -> FetchingOrders ->
/// Finalizing -> {Succeeded, Failed}`. Any phase may jump to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    FetchingCustomers,
    FetchingProducts,
    FetchingOrders,
    Finalizing,
    Succeeded,
    Failed,
}

impl SyncPhase {
    /// Whether a run in this phase is still doing work.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::FetchingCustomers | Self::FetchingProducts | Self::FetchingOrders | Self::Finalizing
        )
    }

    /// Whether the run has finished (either way).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::FetchingCustomers)
                | (Self::FetchingCustomers, Self::FetchingProducts)
                | (Self::FetchingProducts, Self::FetchingOrders)
                | (Self::FetchingOrders, Self::Finalizing)
                | (Self::Finalizing, Self::Succeeded)
        ) || (!self.is_terminal() && matches!(next, Self::Failed))
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::FetchingCustomers => "fetching-customers",
            Self::FetchingProducts => "fetching-products",
            Self::FetchingOrders => "fetching-orders",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
