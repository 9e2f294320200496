//! `PostgreSQL` implementation of [`StoreRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use storepulse_core::{RemoteId, StoreId, StoreScope, TenantId};

use super::{RepositoryError, StoreRepository};
use crate::models::{
    Customer, DateWindow, LineItem, NewStore, Order, Product, ProductSales, ShopCredentials, Store,
    StoreTeardown, SyncStatus,
};

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i32,
    tenant_id: i32,
    name: String,
    shop_domain: String,
    last_synced_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: StoreId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            name: row.name,
            shop_domain: row.shop_domain,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    shop_domain: String,
    access_token: String,
    api_version: String,
}

impl From<CredentialsRow> for ShopCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self::new(
            row.shop_domain,
            SecretString::from(row.access_token),
            row.api_version,
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SyncStatusRow {
    customers_synced_at: Option<DateTime<Utc>>,
    products_synced_at: Option<DateTime<Utc>>,
    orders_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<SyncStatusRow> for SyncStatus {
    fn from(row: SyncStatusRow) -> Self {
        Self {
            customers_synced_at: row.customers_synced_at,
            products_synced_at: row.products_synced_at,
            orders_synced_at: row.orders_synced_at,
            last_error: row.last_error,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    store_id: i32,
    remote_id: String,
    tenant_id: i32,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    orders_count: i32,
    total_spent: Decimal,
    default_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: RemoteId::from_stored(row.remote_id),
            scope: scope_of(row.tenant_id, row.store_id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            orders_count: row.orders_count,
            total_spent: row.total_spent,
            default_address: row.default_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    store_id: i32,
    remote_id: String,
    tenant_id: i32,
    title: String,
    handle: Option<String>,
    price: Option<Decimal>,
    sku: Option<String>,
    status: Option<String>,
    tags: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: RemoteId::from_stored(row.remote_id),
            scope: scope_of(row.tenant_id, row.store_id),
            title: row.title,
            handle: row.handle,
            price: row.price,
            sku: row.sku,
            status: row.status,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    store_id: i32,
    remote_id: String,
    tenant_id: i32,
    name: Option<String>,
    customer_remote_id: Option<String>,
    total_price: Decimal,
    subtotal_price: Decimal,
    total_tax: Decimal,
    currency: Option<String>,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: RemoteId::from_stored(row.remote_id),
            scope: scope_of(row.tenant_id, row.store_id),
            name: row.name,
            customer_id: row.customer_remote_id.map(RemoteId::from_stored),
            total_price: row.total_price,
            subtotal_price: row.subtotal_price,
            total_tax: row.total_tax,
            currency: row.currency,
            financial_status: row.financial_status,
            fulfillment_status: row.fulfillment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    store_id: i32,
    remote_id: String,
    tenant_id: i32,
    order_remote_id: String,
    product_remote_id: Option<String>,
    variant_remote_id: Option<String>,
    sku: Option<String>,
    title: Option<String>,
    quantity: i32,
    price: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        Self {
            id: RemoteId::from_stored(row.remote_id),
            scope: scope_of(row.tenant_id, row.store_id),
            order_id: RemoteId::from_stored(row.order_remote_id),
            product_id: row.product_remote_id.map(RemoteId::from_stored),
            variant_id: row.variant_remote_id.map(RemoteId::from_stored),
            sku: row.sku,
            title: row.title,
            quantity: row.quantity,
            price: row.price,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_id: String,
    units: i64,
    revenue: Decimal,
    line_count: i64,
}

impl From<ProductSalesRow> for ProductSales {
    fn from(row: ProductSalesRow) -> Self {
        Self {
            product_id: RemoteId::from_stored(row.product_id),
            units: row.units,
            revenue: row.revenue,
            line_count: row.line_count,
        }
    }
}

const fn scope_of(tenant_id: i32, store_id: i32) -> StoreScope {
    StoreScope::new(TenantId::new(tenant_id), StoreId::new(store_id))
}

/// Map unique violations to `Conflict`, everything else to `Database`.
fn map_insert_error(error: sqlx::Error, what: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::Conflict(format!("{what} references a missing row"))
        }
        _ => RepositoryError::Database(error),
    }
}

fn expect_one(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn create_store(&self, store: NewStore) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO stores (tenant_id, name, shop_domain)
            VALUES ($1, $2, $3)
            RETURNING id, tenant_id, name, shop_domain, last_synced_at, created_at
            ",
        )
        .bind(store.tenant_id.as_i32())
        .bind(&store.name)
        .bind(&store.shop_domain)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("store {}", store.shop_domain)))?;

        Ok(row.into())
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, tenant_id, name, shop_domain, last_synced_at, created_at
            FROM stores
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Store::from))
    }

    async fn list_stores(&self) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(
            r"
            SELECT id, tenant_id, name, shop_domain, last_synced_at, created_at
            FROM stores
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Store::from).collect())
    }

    async fn mark_store_synced(
        &self,
        id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE stores SET last_synced_at = $2 WHERE id = $1")
            .bind(id.as_i32())
            .bind(at)
            .execute(&self.pool)
            .await?;

        expect_one(result.rows_affected())
    }

    async fn delete_store(&self, scope: StoreScope) -> Result<StoreTeardown, RepositoryError> {
        let store_id = scope.store_id.as_i32();
        let tenant_id = scope.tenant_id.as_i32();
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(store_id)
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        if !owned {
            return Err(RepositoryError::NotFound);
        }

        let mut teardown = StoreTeardown::default();
        for (table, counter) in [
            ("order_line_items", &mut teardown.line_items),
            ("orders", &mut teardown.orders),
            ("products", &mut teardown.products),
            ("customers", &mut teardown.customers),
        ] {
            let result = sqlx::query(&format!(
                "DELETE FROM {table} WHERE store_id = $1 AND tenant_id = $2"
            ))
            .bind(store_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
            *counter = result.rows_affected();
        }

        for table in ["sync_status", "shop_credentials"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE store_id = $1"))
                .bind(store_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM stores WHERE id = $1 AND tenant_id = $2")
            .bind(store_id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(teardown)
    }

    async fn save_credentials(
        &self,
        id: StoreId,
        credentials: &ShopCredentials,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop_credentials (store_id, shop_domain, access_token, api_version)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (store_id) DO UPDATE SET
                shop_domain = EXCLUDED.shop_domain,
                access_token = EXCLUDED.access_token,
                api_version = EXCLUDED.api_version,
                updated_at = now()
            ",
        )
        .bind(id.as_i32())
        .bind(&credentials.shop_domain)
        .bind(credentials.access_token.expose_secret())
        .bind(&credentials.api_version)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "credentials"))?;

        Ok(())
    }

    async fn get_credentials(
        &self,
        id: StoreId,
    ) -> Result<Option<ShopCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r"
            SELECT shop_domain, access_token, api_version
            FROM shop_credentials
            WHERE store_id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShopCredentials::from))
    }

    async fn get_sync_status(
        &self,
        scope: StoreScope,
    ) -> Result<Option<SyncStatus>, RepositoryError> {
        let row = sqlx::query_as::<_, SyncStatusRow>(
            r"
            SELECT customers_synced_at, products_synced_at, orders_synced_at, last_error, updated_at
            FROM sync_status
            WHERE store_id = $1 AND tenant_id = $2
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SyncStatus::from))
    }

    async fn save_sync_status(
        &self,
        scope: StoreScope,
        status: &SyncStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO sync_status (
                store_id, tenant_id, customers_synced_at, products_synced_at,
                orders_synced_at, last_error, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (store_id) DO UPDATE SET
                tenant_id = EXCLUDED.tenant_id,
                customers_synced_at = EXCLUDED.customers_synced_at,
                products_synced_at = EXCLUDED.products_synced_at,
                orders_synced_at = EXCLUDED.orders_synced_at,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(status.customers_synced_at)
        .bind(status.products_synced_at)
        .bind(status.orders_synced_at)
        .bind(&status.last_error)
        .bind(status.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "sync status"))?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    async fn find_customer(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT store_id, remote_id, tenant_id, email, first_name, last_name,
                   orders_count, total_spent, default_address, created_at, updated_at
            FROM customers
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO customers (
                store_id, remote_id, tenant_id, email, first_name, last_name,
                orders_count, total_spent, default_address, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(customer.scope.store_id.as_i32())
        .bind(customer.id.as_str())
        .bind(customer.scope.tenant_id.as_i32())
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.orders_count)
        .bind(customer.total_spent)
        .bind(&customer.default_address)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("customer {}", customer.id)))?;

        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE customers SET
                email = $4,
                first_name = $5,
                last_name = $6,
                orders_count = $7,
                total_spent = $8,
                default_address = $9,
                created_at = $10,
                updated_at = $11
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(customer.scope.store_id.as_i32())
        .bind(customer.scope.tenant_id.as_i32())
        .bind(customer.id.as_str())
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.orders_count)
        .bind(customer.total_spent)
        .bind(&customer.default_address)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        expect_one(result.rows_affected())
    }

    async fn list_customers(&self, scope: StoreScope) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT store_id, remote_id, tenant_id, email, first_name, last_name,
                   orders_count, total_spent, default_address, created_at, updated_at
            FROM customers
            WHERE store_id = $1 AND tenant_id = $2
            ORDER BY remote_id
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn find_product(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT store_id, remote_id, tenant_id, title, handle, price, sku,
                   status, tags, created_at, updated_at
            FROM products
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO products (
                store_id, remote_id, tenant_id, title, handle, price, sku,
                status, tags, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(product.scope.store_id.as_i32())
        .bind(product.id.as_str())
        .bind(product.scope.tenant_id.as_i32())
        .bind(&product.title)
        .bind(&product.handle)
        .bind(product.price)
        .bind(&product.sku)
        .bind(&product.status)
        .bind(&product.tags)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("product {}", product.id)))?;

        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET
                title = $4,
                handle = $5,
                price = $6,
                sku = $7,
                status = $8,
                tags = $9,
                created_at = $10,
                updated_at = $11
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(product.scope.store_id.as_i32())
        .bind(product.scope.tenant_id.as_i32())
        .bind(product.id.as_str())
        .bind(&product.title)
        .bind(&product.handle)
        .bind(product.price)
        .bind(&product.sku)
        .bind(&product.status)
        .bind(&product.tags)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        expect_one(result.rows_affected())
    }

    async fn list_products(&self, scope: StoreScope) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT store_id, remote_id, tenant_id, title, handle, price, sku,
                   status, tags, created_at, updated_at
            FROM products
            WHERE store_id = $1 AND tenant_id = $2
            ORDER BY remote_id
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    // -------------------------------------------------------------------------
    // Orders and line items
    // -------------------------------------------------------------------------

    async fn find_order(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT store_id, remote_id, tenant_id, name, customer_remote_id,
                   total_price, subtotal_price, total_tax, currency,
                   financial_status, fulfillment_status, created_at, updated_at
            FROM orders
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO orders (
                store_id, remote_id, tenant_id, name, customer_remote_id,
                total_price, subtotal_price, total_tax, currency,
                financial_status, fulfillment_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(order.scope.store_id.as_i32())
        .bind(order.id.as_str())
        .bind(order.scope.tenant_id.as_i32())
        .bind(&order.name)
        .bind(order.customer_id.as_ref().map(RemoteId::as_str))
        .bind(order.total_price)
        .bind(order.subtotal_price)
        .bind(order.total_tax)
        .bind(&order.currency)
        .bind(&order.financial_status)
        .bind(&order.fulfillment_status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("order {}", order.id)))?;

        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders SET
                name = $4,
                customer_remote_id = $5,
                total_price = $6,
                subtotal_price = $7,
                total_tax = $8,
                currency = $9,
                financial_status = $10,
                fulfillment_status = $11,
                created_at = $12,
                updated_at = $13
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(order.scope.store_id.as_i32())
        .bind(order.scope.tenant_id.as_i32())
        .bind(order.id.as_str())
        .bind(&order.name)
        .bind(order.customer_id.as_ref().map(RemoteId::as_str))
        .bind(order.total_price)
        .bind(order.subtotal_price)
        .bind(order.total_tax)
        .bind(&order.currency)
        .bind(&order.financial_status)
        .bind(&order.fulfillment_status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        expect_one(result.rows_affected())
    }

    async fn list_orders(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT store_id, remote_id, tenant_id, name, customer_remote_id,
                   total_price, subtotal_price, total_tax, currency,
                   financial_status, fulfillment_status, created_at, updated_at
            FROM orders
            WHERE store_id = $1 AND tenant_id = $2
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ORDER BY created_at, remote_id
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_line_item(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<LineItem>, RepositoryError> {
        let row = sqlx::query_as::<_, LineItemRow>(
            r"
            SELECT store_id, remote_id, tenant_id, order_remote_id, product_remote_id,
                   variant_remote_id, sku, title, quantity, price, total,
                   created_at, updated_at
            FROM order_line_items
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LineItem::from))
    }

    async fn insert_line_item(&self, item: &LineItem) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO order_line_items (
                store_id, remote_id, tenant_id, order_remote_id, product_remote_id,
                variant_remote_id, sku, title, quantity, price, total,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(item.scope.store_id.as_i32())
        .bind(item.id.as_str())
        .bind(item.scope.tenant_id.as_i32())
        .bind(item.order_id.as_str())
        .bind(item.product_id.as_ref().map(RemoteId::as_str))
        .bind(item.variant_id.as_ref().map(RemoteId::as_str))
        .bind(&item.sku)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("line item {}", item.id)))?;

        Ok(())
    }

    async fn update_line_item(&self, item: &LineItem) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE order_line_items SET
                order_remote_id = $4,
                product_remote_id = $5,
                variant_remote_id = $6,
                sku = $7,
                title = $8,
                quantity = $9,
                price = $10,
                total = $11,
                created_at = $12,
                updated_at = $13
            WHERE store_id = $1 AND tenant_id = $2 AND remote_id = $3
            ",
        )
        .bind(item.scope.store_id.as_i32())
        .bind(item.scope.tenant_id.as_i32())
        .bind(item.id.as_str())
        .bind(item.order_id.as_str())
        .bind(item.product_id.as_ref().map(RemoteId::as_str))
        .bind(item.variant_id.as_ref().map(RemoteId::as_str))
        .bind(&item.sku)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        expect_one(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    async fn order_revenue(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Decimal, RepositoryError> {
        let revenue = sqlx::query_scalar::<_, Decimal>(
            r"
            SELECT COALESCE(SUM(total_price), 0)
            FROM orders
            WHERE store_id = $1 AND tenant_id = $2
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(window.from)
        .bind(window.until)
        .fetch_one(&self.pool)
        .await?;

        Ok(revenue)
    }

    async fn product_sales(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<ProductSales>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductSalesRow>(
            r"
            SELECT li.product_remote_id AS product_id,
                   COALESCE(SUM(li.quantity), 0)::BIGINT AS units,
                   COALESCE(SUM(li.total), 0) AS revenue,
                   COUNT(*) AS line_count
            FROM order_line_items li
            JOIN orders o
              ON o.store_id = li.store_id AND o.remote_id = li.order_remote_id
            WHERE li.store_id = $1 AND li.tenant_id = $2
              AND li.product_remote_id IS NOT NULL
              AND ($3::timestamptz IS NULL OR o.created_at >= $3)
              AND ($4::timestamptz IS NULL OR o.created_at < $4)
            GROUP BY li.product_remote_id
            ORDER BY revenue DESC, product_id
            ",
        )
        .bind(scope.store_id.as_i32())
        .bind(scope.tenant_id.as_i32())
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductSales::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    async fn repo() -> PgStoreRepository {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PgStoreRepository::new(pool)
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn test_customer_insert_update_roundtrip() {
        let repo = repo().await;
        let store = repo
            .create_store(NewStore {
                tenant_id: TenantId::new(1),
                name: "Roundtrip".to_string(),
                shop_domain: format!("roundtrip-{}.myshopify.com", Utc::now().timestamp_micros()),
            })
            .await
            .unwrap();
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();

        let mut customer = Customer {
            id: RemoteId::from_stored("42"),
            scope: store.scope(),
            email: Some("a@example.com".to_string()),
            first_name: None,
            last_name: None,
            orders_count: 1,
            total_spent: Decimal::new(1999, 2),
            default_address: None,
            created_at: created,
            updated_at: created,
        };
        repo.insert_customer(&customer).await.unwrap();
        assert!(matches!(
            repo.insert_customer(&customer).await,
            Err(RepositoryError::Conflict(_))
        ));

        customer.orders_count = 2;
        repo.update_customer(&customer).await.unwrap();
        let stored = repo
            .find_customer(store.scope(), &customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, customer);

        let teardown = repo.delete_store(store.scope()).await.unwrap();
        assert_eq!(teardown.customers, 1);
    }
}
