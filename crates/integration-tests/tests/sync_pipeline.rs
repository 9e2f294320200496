//! Integration tests for the fetch → reconcile pipeline.
//!
//! Shopify is a local `wiremock` server; nothing external is required.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::Value;
use wiremock::MockServer;

use storepulse_core::{RemoteId, SyncPhase};
use storepulse_integration_tests::{
    connect_store, customer_node, mount_shop, order_node, product_node,
};
use storepulse_server::db::StoreRepository;
use storepulse_server::ingestion::SyncError;
use storepulse_server::models::DateWindow;

fn rid(id: &str) -> RemoteId {
    RemoteId::from_stored(id)
}

fn small_shop() -> (Vec<Value>, Vec<Value>, Vec<Value>) {
    let customers = vec![
        customer_node(1, Some("ada@example.com"), "Ada"),
        customer_node(2, Some("grace@example.com"), "Grace"),
    ];
    let products = vec![product_node(10, "Coffee Mug", "12.50"), product_node(11, "Tee", "20.00")];
    let orders = vec![
        order_node(100, Some(1), "45.00", "2026-02-01T12:00:00Z", &[(10, 2, "12.50"), (11, 1, "20.00")]),
        // Guest checkout, and a line for a product not in the catalog.
        order_node(101, None, "30.00", "2026-02-02T12:00:00Z", &[(99, 3, "10.00")]),
    ];
    (customers, products, orders)
}

// ============================================================================
// Idempotence & partial updates
// ============================================================================

#[tokio::test]
async fn test_second_sync_of_same_data_changes_nothing() {
    let server = MockServer::start().await;
    let (customers, products, orders) = small_shop();
    mount_shop(&server, &customers, &products, &orders).await;
    let store = connect_store(&server).await;

    let first = store.sync.sync_store(store.scope).await.unwrap();
    let customers_after_first = store.repo.list_customers(store.scope).await.unwrap();
    let orders_after_first = store.repo.list_orders(store.scope, DateWindow::ALL).await.unwrap();
    let sales_after_first = store.repo.product_sales(store.scope, DateWindow::ALL).await.unwrap();

    let second = store.sync.sync_store(store.scope).await.unwrap();

    assert_eq!(first.synced, second.synced);
    assert!(second.generation > first.generation);
    assert_eq!(store.repo.list_customers(store.scope).await.unwrap(), customers_after_first);
    assert_eq!(
        store.repo.list_orders(store.scope, DateWindow::ALL).await.unwrap(),
        orders_after_first
    );
    assert_eq!(
        store.repo.product_sales(store.scope, DateWindow::ALL).await.unwrap(),
        sales_after_first
    );
}

#[tokio::test]
async fn test_missing_fields_do_not_overwrite() {
    let server = MockServer::start().await;
    let (customers, products, orders) = small_shop();
    mount_shop(&server, &customers, &products, &orders).await;
    let store = connect_store(&server).await;
    store.sync.sync_store(store.scope).await.unwrap();

    // Ada comes back without an email and with a new first name.
    server.reset().await;
    let mut ada = customer_node(1, None, "Augusta");
    ada["updatedAt"] = Value::from("2026-03-01T00:00:00Z");
    mount_shop(&server, &[ada], &products, &orders).await;
    store.sync.sync_store(store.scope).await.unwrap();

    let ada = store
        .repo
        .find_customer(store.scope, &rid("1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ada.email.as_deref(), Some("ada@example.com"));
    assert_eq!(ada.first_name.as_deref(), Some("Augusta"));
    assert_eq!(ada.updated_at.to_rfc3339(), "2026-03-01T00:00:00+00:00");

    // Grace was absent from the second fetch and is untouched.
    assert!(store.repo.find_customer(store.scope, &rid("2")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_orders_link_known_records_only() {
    let server = MockServer::start().await;
    let (customers, products, orders) = small_shop();
    mount_shop(&server, &customers, &products, &orders).await;
    let store = connect_store(&server).await;

    store.sync.sync_store(store.scope).await.unwrap();

    let orders = store.repo.list_orders(store.scope, DateWindow::ALL).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].customer_id, Some(rid("1")));
    assert_eq!(orders[1].customer_id, None);

    let sales = store.repo.product_sales(store.scope, DateWindow::ALL).await.unwrap();
    // Product 99 is not in the catalog, so its line has no product.
    assert_eq!(sales.len(), 2);
    let mug = sales.iter().find(|s| s.product_id == rid("10")).unwrap();
    assert_eq!(mug.units, 2);
    assert_eq!(mug.revenue, Decimal::new(2500, 2));
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_every_page_is_ingested() {
    let server = MockServer::start().await;
    let customers: Vec<Value> = (1..=620)
        .map(|i| customer_node(i, Some(&format!("c{i}@example.com")), "Bulk"))
        .collect();
    let products: Vec<Value> = (1..=251).map(|i| product_node(i, &format!("P{i}"), "1.00")).collect();
    mount_shop(&server, &customers, &products, &[]).await;
    let store = connect_store(&server).await;

    let outcome = store.sync.sync_store(store.scope).await.unwrap();

    assert_eq!(outcome.synced.customers, 620);
    assert_eq!(outcome.synced.products, 251);
    assert_eq!(outcome.synced.orders, 0);
    assert_eq!(store.repo.list_customers(store.scope).await.unwrap().len(), 620);
    assert_eq!(store.repo.list_products(store.scope).await.unwrap().len(), 251);
    assert!(
        store
            .repo
            .find_customer(store.scope, &rid("620"))
            .await
            .unwrap()
            .is_some()
    );
}

// ============================================================================
// Failure & bookkeeping
// ============================================================================

#[tokio::test]
async fn test_unreachable_shop_records_error() {
    let server = MockServer::start().await;
    // Nothing mounted: every request is a 404 from the mock server.
    let store = connect_store(&server).await;

    let err = store.sync.sync_store(store.scope).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch { .. }));

    let view = store.sync.status(store.scope).await.unwrap();
    assert_eq!(view.phase, SyncPhase::Idle);
    assert!(view.status.last_error.is_some());
    assert!(view.last_synced_at.is_none());
    assert!(store.repo.list_customers(store.scope).await.unwrap().is_empty());
}
