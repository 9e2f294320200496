//! Store management commands.
//!
//! # Usage
//!
//! ```bash
//! # Connect a store with its own Admin API token
//! sp-cli store add -t 1 -n "Acme" -d acme.myshopify.com --access-token shpat_...
//!
//! # List stores
//! sp-cli store list
//!
//! # Remove a store and everything ingested for it
//! sp-cli store delete 3
//! ```

use secrecy::SecretString;
use thiserror::Error;

use storepulse_core::{StoreId, TenantId};
use storepulse_server::config::{ConfigError, validate_secret_strength};
use storepulse_server::db::{PgStoreRepository, RepositoryError, StoreRepository};
use storepulse_server::models::{NewStore, ShopCredentials};

use super::{ConnectError, connect};

const DEFAULT_API_VERSION: &str = "2025-10";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Shop domain is not a `*.myshopify.com` host.
    #[error("Invalid shop domain: {0}")]
    InvalidDomain(String),

    #[error("Rejected access token: {0}")]
    InsecureToken(#[from] ConfigError),

    #[error("Store {0} not found")]
    NotFound(StoreId),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn validate_domain(domain: &str) -> Result<(), StoreError> {
    let valid = domain
        .strip_suffix(".myshopify.com")
        .is_some_and(|name| {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidDomain(domain.to_owned()))
    }
}

/// Connect a new store, storing its access token when given.
pub async fn add(
    tenant: i32,
    name: &str,
    domain: &str,
    access_token: Option<String>,
) -> Result<StoreId, StoreError> {
    validate_domain(domain)?;
    if let Some(token) = &access_token {
        validate_secret_strength(token, "access token")?;
    }

    let repo = PgStoreRepository::new(connect().await?);
    let store = repo
        .create_store(NewStore {
            tenant_id: TenantId::new(tenant),
            name: name.to_owned(),
            shop_domain: domain.to_owned(),
        })
        .await?;

    if let Some(token) = access_token {
        let api_version = std::env::var("SHOPIFY_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_owned());
        let credentials = ShopCredentials::new(domain, SecretString::from(token), api_version);
        repo.save_credentials(store.id, &credentials).await?;
    } else {
        tracing::warn!("No access token stored; syncs will need the direct-access fallback");
    }

    tracing::info!(
        store_id = %store.id,
        tenant_id = %store.tenant_id,
        shop = %store.shop_domain,
        "Store connected"
    );
    Ok(store.id)
}

/// Log every connected store.
pub async fn list() -> Result<(), StoreError> {
    let repo = PgStoreRepository::new(connect().await?);
    let stores = repo.list_stores().await?;

    if stores.is_empty() {
        tracing::info!("No stores connected");
    }
    for store in stores {
        tracing::info!(
            store_id = %store.id,
            tenant_id = %store.tenant_id,
            name = %store.name,
            shop = %store.shop_domain,
            last_synced_at = ?store.last_synced_at,
            "Store"
        );
    }
    Ok(())
}

/// Remove a store and everything ingested for it.
pub async fn delete(store_id: i32) -> Result<(), StoreError> {
    let store_id = StoreId::new(store_id);
    let repo = PgStoreRepository::new(connect().await?);

    let store = repo
        .get_store(store_id)
        .await?
        .ok_or(StoreError::NotFound(store_id))?;
    let teardown = repo.delete_store(store.scope()).await?;

    tracing::info!(
        store_id = %store.id,
        line_items = teardown.line_items,
        orders = teardown.orders,
        products = teardown.products,
        customers = teardown.customers,
        "Store deleted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("acme.myshopify.com").is_ok());
        assert!(validate_domain("acme-2.myshopify.com").is_ok());
        assert!(validate_domain("myshopify.com").is_err());
        assert!(validate_domain(".myshopify.com").is_err());
        assert!(validate_domain("acme.com").is_err());
        assert!(validate_domain("a.b.myshopify.com").is_err());
    }
}
