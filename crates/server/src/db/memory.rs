//! In-memory [`StoreRepository`] for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use storepulse_core::{RemoteId, StoreId, StoreScope};

use super::{RepositoryError, StoreRepository};
use crate::models::{
    Customer, DateWindow, LineItem, NewStore, Order, Product, ProductSales, ShopCredentials, Store,
    StoreTeardown, SyncStatus,
};

type Key = (StoreScope, RemoteId);

#[derive(Default)]
struct MemoryState {
    next_store_id: i32,
    stores: HashMap<StoreId, Store>,
    credentials: HashMap<StoreId, ShopCredentials>,
    sync_status: HashMap<StoreScope, SyncStatus>,
    customers: HashMap<Key, Customer>,
    products: HashMap<Key, Product>,
    orders: HashMap<Key, Order>,
    line_items: HashMap<Key, LineItem>,
}

/// Process-local repository backed by hash maps.
#[derive(Default)]
pub struct MemoryStoreRepository {
    state: RwLock<MemoryState>,
}

impl MemoryStoreRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn scoped_values<V: Clone>(
    map: &HashMap<Key, V>,
    scope: StoreScope,
    id_of: impl Fn(&V) -> &RemoteId,
) -> Vec<V> {
    let mut values: Vec<V> = map
        .iter()
        .filter(|((s, _), _)| *s == scope)
        .map(|(_, v)| v.clone())
        .collect();
    values.sort_by(|a, b| id_of(a).cmp(id_of(b)));
    values
}

fn insert_new<V>(map: &mut HashMap<Key, V>, key: Key, value: V) -> Result<(), RepositoryError> {
    if map.contains_key(&key) {
        return Err(RepositoryError::Conflict(format!(
            "{} already exists in {}",
            key.1, key.0
        )));
    }
    map.insert(key, value);
    Ok(())
}

fn replace_existing<V>(
    map: &mut HashMap<Key, V>,
    key: &Key,
    value: V,
) -> Result<(), RepositoryError> {
    let slot = map.get_mut(key).ok_or(RepositoryError::NotFound)?;
    *slot = value;
    Ok(())
}

fn remove_scope<V>(map: &mut HashMap<Key, V>, scope: StoreScope) -> u64 {
    let before = map.len();
    map.retain(|(s, _), _| *s != scope);
    (before - map.len()) as u64
}

#[async_trait]
impl StoreRepository for MemoryStoreRepository {
    async fn create_store(&self, store: NewStore) -> Result<Store, RepositoryError> {
        let mut state = self.state.write().await;

        let duplicate = state
            .stores
            .values()
            .any(|s| s.tenant_id == store.tenant_id && s.shop_domain == store.shop_domain);
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "{} is already connected",
                store.shop_domain
            )));
        }

        state.next_store_id += 1;
        let created = Store {
            id: StoreId::new(state.next_store_id),
            tenant_id: store.tenant_id,
            name: store.name,
            shop_domain: store.shop_domain,
            last_synced_at: None,
            created_at: Utc::now(),
        };
        state.stores.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.state.read().await.stores.get(&id).cloned())
    }

    async fn list_stores(&self) -> Result<Vec<Store>, RepositoryError> {
        let mut stores: Vec<Store> = self.state.read().await.stores.values().cloned().collect();
        stores.sort_by_key(|s| s.id.as_i32());
        Ok(stores)
    }

    async fn mark_store_synced(
        &self,
        id: StoreId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let store = state.stores.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        store.last_synced_at = Some(at);
        Ok(())
    }

    async fn delete_store(&self, scope: StoreScope) -> Result<StoreTeardown, RepositoryError> {
        let mut state = self.state.write().await;
        match state.stores.get(&scope.store_id) {
            Some(store) if store.tenant_id == scope.tenant_id => {}
            _ => return Err(RepositoryError::NotFound),
        }

        let teardown = StoreTeardown {
            line_items: remove_scope(&mut state.line_items, scope),
            orders: remove_scope(&mut state.orders, scope),
            products: remove_scope(&mut state.products, scope),
            customers: remove_scope(&mut state.customers, scope),
        };
        state.sync_status.remove(&scope);
        state.credentials.remove(&scope.store_id);
        state.stores.remove(&scope.store_id);
        Ok(teardown)
    }

    async fn save_credentials(
        &self,
        id: StoreId,
        credentials: &ShopCredentials,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.stores.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        state.credentials.insert(id, credentials.clone());
        Ok(())
    }

    async fn get_credentials(
        &self,
        id: StoreId,
    ) -> Result<Option<ShopCredentials>, RepositoryError> {
        Ok(self.state.read().await.credentials.get(&id).cloned())
    }

    async fn get_sync_status(
        &self,
        scope: StoreScope,
    ) -> Result<Option<SyncStatus>, RepositoryError> {
        Ok(self.state.read().await.sync_status.get(&scope).cloned())
    }

    async fn save_sync_status(
        &self,
        scope: StoreScope,
        status: &SyncStatus,
    ) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .sync_status
            .insert(scope, status.clone());
        Ok(())
    }

    async fn find_customer(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let key = (scope, id.clone());
        Ok(self.state.read().await.customers.get(&key).cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let key = (customer.scope, customer.id.clone());
        insert_new(&mut self.state.write().await.customers, key, customer.clone())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let key = (customer.scope, customer.id.clone());
        replace_existing(&mut self.state.write().await.customers, &key, customer.clone())
    }

    async fn list_customers(&self, scope: StoreScope) -> Result<Vec<Customer>, RepositoryError> {
        Ok(scoped_values(&self.state.read().await.customers, scope, |c| &c.id))
    }

    async fn find_product(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Product>, RepositoryError> {
        let key = (scope, id.clone());
        Ok(self.state.read().await.products.get(&key).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let key = (product.scope, product.id.clone());
        insert_new(&mut self.state.write().await.products, key, product.clone())
    }

    async fn update_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let key = (product.scope, product.id.clone());
        replace_existing(&mut self.state.write().await.products, &key, product.clone())
    }

    async fn list_products(&self, scope: StoreScope) -> Result<Vec<Product>, RepositoryError> {
        Ok(scoped_values(&self.state.read().await.products, scope, |p| &p.id))
    }

    async fn find_order(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<Order>, RepositoryError> {
        let key = (scope, id.clone());
        Ok(self.state.read().await.orders.get(&key).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let key = (order.scope, order.id.clone());
        insert_new(&mut self.state.write().await.orders, key, order.clone())
    }

    async fn update_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let key = (order.scope, order.id.clone());
        replace_existing(&mut self.state.write().await.orders, &key, order.clone())
    }

    async fn list_orders(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = scoped_values(&self.state.read().await.orders, scope, |o| &o.id)
            .into_iter()
            .filter(|o| window.contains(o.created_at))
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn find_line_item(
        &self,
        scope: StoreScope,
        id: &RemoteId,
    ) -> Result<Option<LineItem>, RepositoryError> {
        let key = (scope, id.clone());
        Ok(self.state.read().await.line_items.get(&key).cloned())
    }

    async fn insert_line_item(&self, item: &LineItem) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&(item.scope, item.order_id.clone())) {
            return Err(RepositoryError::Conflict(format!(
                "line item {} references unknown order {}",
                item.id, item.order_id
            )));
        }
        let key = (item.scope, item.id.clone());
        insert_new(&mut state.line_items, key, item.clone())
    }

    async fn update_line_item(&self, item: &LineItem) -> Result<(), RepositoryError> {
        let key = (item.scope, item.id.clone());
        replace_existing(&mut self.state.write().await.line_items, &key, item.clone())
    }

    async fn order_revenue(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Decimal, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|((s, _), o)| *s == scope && window.contains(o.created_at))
            .map(|(_, o)| o.total_price)
            .sum())
    }

    async fn product_sales(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<Vec<ProductSales>, RepositoryError> {
        let state = self.state.read().await;
        let mut grouped: HashMap<RemoteId, ProductSales> = HashMap::new();

        for ((s, _), item) in &state.line_items {
            if *s != scope {
                continue;
            }
            let Some(product_id) = &item.product_id else {
                continue;
            };
            let in_window = state
                .orders
                .get(&(scope, item.order_id.clone()))
                .is_some_and(|o| window.contains(o.created_at));
            if !in_window {
                continue;
            }

            let entry = grouped
                .entry(product_id.clone())
                .or_insert_with(|| ProductSales {
                    product_id: product_id.clone(),
                    units: 0,
                    revenue: Decimal::ZERO,
                    line_count: 0,
                });
            entry.units += i64::from(item.quantity);
            entry.revenue += item.total;
            entry.line_count += 1;
        }

        let mut sales: Vec<ProductSales> = grouped.into_values().collect();
        sales.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(sales)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, TimeZone};
    use storepulse_core::TenantId;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).single().unwrap()
    }

    fn rid(id: &str) -> RemoteId {
        RemoteId::from_stored(id)
    }

    async fn repo_with_store() -> (MemoryStoreRepository, StoreScope) {
        let repo = MemoryStoreRepository::new();
        let store = repo
            .create_store(NewStore {
                tenant_id: TenantId::new(1),
                name: "Acme".to_string(),
                shop_domain: "acme.myshopify.com".to_string(),
            })
            .await
            .unwrap();
        (repo, store.scope())
    }

    fn order(scope: StoreScope, id: &str, total: i64, created_at: DateTime<Utc>) -> Order {
        Order {
            id: rid(id),
            scope,
            name: None,
            customer_id: None,
            total_price: Decimal::from(total),
            subtotal_price: Decimal::from(total),
            total_tax: Decimal::ZERO,
            currency: None,
            financial_status: None,
            fulfillment_status: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn line(scope: StoreScope, id: &str, order_id: &str, product: Option<&str>, qty: i32) -> LineItem {
        LineItem {
            id: rid(id),
            scope,
            order_id: rid(order_id),
            product_id: product.map(rid),
            variant_id: None,
            sku: None,
            title: None,
            quantity: qty,
            price: Decimal::from(10),
            total: Decimal::from(10 * qty),
            created_at: at(1),
            updated_at: at(1),
        }
    }

    #[tokio::test]
    async fn test_insert_twice_conflicts_and_update_requires_existing() {
        let (repo, scope) = repo_with_store().await;
        let o = order(scope, "1", 10, at(1));

        repo.insert_order(&o).await.unwrap();
        assert!(matches!(
            repo.insert_order(&o).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            repo.update_order(&order(scope, "2", 1, at(1))).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reads_are_scoped_to_tenant_and_store() {
        let (repo, scope) = repo_with_store().await;
        repo.insert_order(&order(scope, "1", 10, at(1))).await.unwrap();

        let other_tenant = StoreScope::new(TenantId::new(2), scope.store_id);
        assert!(repo.find_order(other_tenant, &rid("1")).await.unwrap().is_none());
        assert!(repo.list_orders(other_tenant, DateWindow::ALL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_sales_groups_and_filters_by_order_date() {
        let (repo, scope) = repo_with_store().await;
        repo.insert_order(&order(scope, "1", 20, at(1))).await.unwrap();
        repo.insert_order(&order(scope, "2", 30, at(10))).await.unwrap();
        repo.insert_line_item(&line(scope, "1a", "1", Some("p1"), 2)).await.unwrap();
        repo.insert_line_item(&line(scope, "2a", "2", Some("p1"), 1)).await.unwrap();
        repo.insert_line_item(&line(scope, "2b", "2", Some("p2"), 5)).await.unwrap();
        repo.insert_line_item(&line(scope, "2c", "2", None, 9)).await.unwrap();

        let all = repo.product_sales(scope, DateWindow::ALL).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].product_id, rid("p2"));
        assert_eq!(all[0].revenue, Decimal::from(50));
        assert_eq!(all[1].units, 3);
        assert_eq!(all[1].line_count, 2);

        let recent = repo
            .product_sales(scope, DateWindow::since(at(5)))
            .await
            .unwrap();
        let p1 = recent.iter().find(|s| s.product_id == rid("p1")).unwrap();
        assert_eq!(p1.units, 1);

        let revenue = repo
            .order_revenue(scope, DateWindow::between(at(1), at(1) + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(revenue, Decimal::from(20));
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let (repo, scope) = repo_with_store().await;
        repo.insert_order(&order(scope, "1", 20, at(1))).await.unwrap();
        repo.insert_line_item(&line(scope, "1a", "1", None, 1)).await.unwrap();
        repo.save_sync_status(scope, &SyncStatus::succeeded(at(2))).await.unwrap();

        let wrong_tenant = StoreScope::new(TenantId::new(9), scope.store_id);
        assert!(matches!(
            repo.delete_store(wrong_tenant).await,
            Err(RepositoryError::NotFound)
        ));

        let teardown = repo.delete_store(scope).await.unwrap();
        assert_eq!(teardown.orders, 1);
        assert_eq!(teardown.line_items, 1);
        assert!(repo.get_store(scope.store_id).await.unwrap().is_none());
        assert!(repo.get_sync_status(scope).await.unwrap().is_none());
    }
}
