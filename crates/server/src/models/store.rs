//! Connected stores, their credentials and sync bookkeeping.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use storepulse_core::{StoreId, StoreScope, TenantId};

/// A shop connected under a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    /// Store ID.
    pub id: StoreId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Shop domain (e.g., acme.myshopify.com).
    pub shop_domain: String,
    /// Last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// When the store was connected.
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// The (tenant, store) pair this store's data lives under.
    #[must_use]
    pub const fn scope(&self) -> StoreScope {
        StoreScope::new(self.tenant_id, self.id)
    }
}

/// Input for connecting a new store.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub tenant_id: TenantId,
    pub name: String,
    pub shop_domain: String,
}

/// Admin API credentials for a single shop.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopCredentials {
    /// Shop domain (e.g., acme.myshopify.com).
    pub shop_domain: String,
    /// Admin API access token (redacted in debug output).
    pub access_token: SecretString,
    /// Admin API version (e.g., 2025-10).
    pub api_version: String,
}

impl ShopCredentials {
    #[must_use]
    pub fn new(
        shop_domain: impl Into<String>,
        access_token: SecretString,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            access_token,
            api_version: api_version.into(),
        }
    }
}

impl std::fmt::Debug for ShopCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCredentials")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Per-store sync bookkeeping, overwritten on every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub customers_synced_at: Option<DateTime<Utc>>,
    pub products_synced_at: Option<DateTime<Utc>>,
    pub orders_synced_at: Option<DateTime<Utc>>,
    /// Error message of the most recent failed attempt, cleared on success.
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Status after a successful run finishing at `at`.
    #[must_use]
    pub const fn succeeded(at: DateTime<Utc>) -> Self {
        Self {
            customers_synced_at: Some(at),
            products_synced_at: Some(at),
            orders_synced_at: Some(at),
            last_error: None,
            updated_at: Some(at),
        }
    }

    /// Record a failure, keeping the previous success timestamps.
    #[must_use]
    pub fn failed(self, error: String, at: DateTime<Utc>) -> Self {
        Self {
            last_error: Some(error),
            updated_at: Some(at),
            ..self
        }
    }
}

/// Half-open time window `[from, until)`; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Everything.
    pub const ALL: Self = Self {
        from: None,
        until: None,
    };

    #[must_use]
    pub const fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    #[must_use]
    pub const fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: None,
        }
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.until.is_none_or(|until| at < until)
    }
}

/// Rows removed by a store teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTeardown {
    pub line_items: u64,
    pub orders: u64,
    pub products: u64,
    pub customers: u64,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_failed_keeps_previous_timestamps() {
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_default();
        let later = first + Duration::hours(1);

        let status = SyncStatus::succeeded(first).failed("boom".to_string(), later);
        assert_eq!(status.customers_synced_at, Some(first));
        assert_eq!(status.orders_synced_at, Some(first));
        assert_eq!(status.last_error.as_deref(), Some("boom"));
        assert_eq!(status.updated_at, Some(later));
    }

    #[test]
    fn test_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().unwrap_or_default();
        let end = start + Duration::days(7);
        let window = DateWindow::between(start, end);

        assert!(window.contains(start));
        assert!(window.contains(end - Duration::seconds(1)));
        assert!(!window.contains(end));
        assert!(DateWindow::ALL.contains(end));
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = ShopCredentials::new(
            "acme.myshopify.com",
            SecretString::from("shpat_live_token"),
            "2025-10",
        );
        let debug = format!("{creds:?}");
        assert!(debug.contains("acme.myshopify.com"));
        assert!(!debug.contains("shpat_live_token"));
    }
}
