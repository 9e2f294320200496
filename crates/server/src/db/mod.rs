//! Storage boundary for ingested shop data.
//!
//! # Tables
//!
//! - `stores` - Connected shops, one tenant each
//! - `shop_credentials` - Admin API access tokens per store
//! - `sync_status` - Last sync timestamps and error per store
//! - `customers`, `products`, `orders`, `order_line_items` - Ingested data,
//!   keyed by `(store_id, remote_id)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p storepulse-cli -- migrate
//! ```
//!
//! They are never applied on server startup.

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use storepulse_core::{RemoteId, StoreId, StoreScope};

use crate::models::{
    Customer, DateWindow, LineItem, NewStore, Order, Product, ProductSales, ShopCredentials, Store,
    StoreTeardown, SyncStatus,
};

pub use memory::MemoryStoreRepository;
pub use postgres::PgStoreRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Keyed record store for one or more tenants' shop data.
///
/// Every entity read or write is scoped by a [`StoreScope`]; implementations
/// filter on both tenant and store. Writes are per record and not
/// transactional across a batch.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Connect a new store.
    async fn create_store(&self, store: NewStore) -> Result<Store, RepositoryError>;

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;

    /// All stores across tenants, ordered by id.
    async fn list_stores(&self) -> Result<Vec<Store>, RepositoryError>;

    async fn mark_store_synced(
        &self,
        id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Remove a store and everything ingested for it.
    ///
    /// Deletes line items, orders, products, customers, sync status,
    /// credentials and finally the store row.
    async fn delete_store(&self, scope: StoreScope) -> Result<StoreTeardown, RepositoryError>;

    async fn save_credentials(
        &self,
        id: StoreId,
        credentials: &ShopCredentials,
    ) -> Result<(), RepositoryError>;

    async fn get_credentials(
        &self,
        id: StoreId,
    ) -> Result<Option<ShopCredentials>, RepositoryError>;

    // -------------------------------------------------------------------------
    // Sync status
    // -------------------------------------------------------------------------

    async fn get_sync_status(
        &self,
        scope: StoreScope,
    ) -> Result<Option<SyncStatus>, RepositoryError>;

    /// Overwrite the store's sync status row.
    async fn save_sync_status(
        &self,
        scope: StoreScope,
        status: &SyncStatus,
    ) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    async fn find_customer(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Customer>, RepositoryError>;

    /// Insert a new customer; fails with `Conflict` if it already exists.
    async fn insert_customer(&self, customer: &Customer) -> Result<(), RepositoryError>;

    /// Replace an existing customer; fails with `NotFound` if it does not exist.
    async fn update_customer(&self, customer: &Customer) -> Result<(), RepositoryError>;

    async fn list_customers(&self, scope: StoreScope) -> Result<Vec<Customer>, RepositoryError>;

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn find_product(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn update_product(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn list_products(&self, scope: StoreScope) -> Result<Vec<Product>, RepositoryError>;

    // -------------------------------------------------------------------------
    // Orders and line items
    // -------------------------------------------------------------------------

    async fn find_order(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn update_order(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Orders created inside `window`, oldest first.
    async fn list_orders(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn find_line_item(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<LineItem>, RepositoryError>;

    async fn insert_line_item(&self, item: &LineItem) -> Result<(), RepositoryError>;

    async fn update_line_item(&self, item: &LineItem) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    /// Sum of order totals for orders created inside `window`.
    async fn order_revenue(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Decimal, RepositoryError>;

    /// Line item units and revenue grouped by product, for orders created
    /// inside `window`. Lines without a product are left out. Ordered by
    /// revenue descending, then product id.
    async fn product_sales(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<ProductSales>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
