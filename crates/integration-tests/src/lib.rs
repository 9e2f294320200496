//! Integration tests for storepulse.
//!
//! Shopify is replaced by a `wiremock` server answering the Admin GraphQL
//! endpoint with scripted pages; storage is the in-memory repository.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storepulse-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sync_pipeline` - Fetch, paginate and reconcile through [`SyncService`]
//! - `analytics_http` - Reports over synced data through the HTTP router

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storepulse_core::{StoreScope, TenantId};
use storepulse_server::config::ShopifyConfig;
use storepulse_server::db::{MemoryStoreRepository, StoreRepository};
use storepulse_server::ingestion::SyncService;
use storepulse_server::models::{NewStore, ShopCredentials};

pub const API_VERSION: &str = "2025-10";

/// Nodes per page served by [`mount_pages`], matching the client's page size.
pub const PAGE_SIZE: usize = 250;

/// A store connected to a mock shop, with credentials saved.
pub struct TestStore {
    pub repo: Arc<MemoryStoreRepository>,
    pub sync: SyncService,
    pub scope: StoreScope,
}

/// Shopify config pointing at `server`.
///
/// # Panics
///
/// Panics if the mock server URI is not a URL.
#[must_use]
pub fn shopify_config(server: &MockServer) -> ShopifyConfig {
    ShopifyConfig {
        api_version: API_VERSION.to_string(),
        endpoint_override: Some(Url::parse(&server.uri()).expect("mock server URI")),
        app: None,
        dev_direct: None,
    }
}

/// Connect a store for tenant 1 and point its sync at `server`.
///
/// # Panics
///
/// Panics if the in-memory repository rejects the store.
pub async fn connect_store(server: &MockServer) -> TestStore {
    let repo = Arc::new(MemoryStoreRepository::new());
    let store = repo
        .create_store(NewStore {
            tenant_id: TenantId::new(1),
            name: "Acme".to_string(),
            shop_domain: "acme.myshopify.com".to_string(),
        })
        .await
        .expect("create store");
    repo.save_credentials(
        store.id,
        &ShopCredentials::new(
            "acme.myshopify.com",
            SecretString::from("shpat_integration"),
            API_VERSION,
        ),
    )
    .await
    .expect("save credentials");

    let sync = SyncService::new(repo.clone(), shopify_config(server));
    TestStore {
        repo,
        sync,
        scope: store.scope(),
    }
}

fn page(field: &str, nodes: &[Value], end_cursor: Option<String>) -> Value {
    let edges: Vec<Value> = nodes.iter().map(|node| json!({ "node": node })).collect();
    json!({
        "data": {
            field: {
                "edges": edges,
                "pageInfo": {
                    "hasNextPage": end_cursor.is_some(),
                    "endCursor": end_cursor,
                }
            }
        }
    })
}

/// Serve `nodes` for `operation` in pages of [`PAGE_SIZE`].
///
/// Page `n + 1` is requested with `after: "<field>-cursor-<n>"`. Later pages
/// are mounted first so their more specific matchers win.
pub async fn mount_pages(server: &MockServer, operation: &str, field: &str, nodes: &[Value]) {
    let chunks: Vec<&[Value]> = if nodes.is_empty() {
        vec![&[][..]]
    } else {
        nodes.chunks(PAGE_SIZE).collect()
    };
    let last = chunks.len() - 1;

    for (index, chunk) in chunks.iter().enumerate().rev() {
        let next = (index < last).then(|| format!("{field}-cursor-{index}"));
        let mut mock = Mock::given(method("POST"))
            .and(path(format!("/admin/api/{API_VERSION}/graphql.json")))
            .and(body_partial_json(json!({ "operationName": operation })));
        if index > 0 {
            let after = format!("{field}-cursor-{}", index - 1);
            mock = mock.and(body_partial_json(json!({ "variables": { "after": after } })));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(page(field, chunk, next)))
            .mount(server)
            .await;
    }
}

/// Serve a whole shop: customers, products and orders.
pub async fn mount_shop(server: &MockServer, customers: &[Value], products: &[Value], orders: &[Value]) {
    mount_pages(server, "SyncCustomers", "customers", customers).await;
    mount_pages(server, "SyncProducts", "products", products).await;
    mount_pages(server, "SyncOrders", "orders", orders).await;
}

fn money(amount: &str) -> Value {
    json!({ "shopMoney": { "amount": amount, "currencyCode": "USD" } })
}

/// A customer node.
#[must_use]
pub fn customer_node(id: u64, email: Option<&str>, first_name: &str) -> Value {
    json!({
        "id": format!("gid://shopify/Customer/{id}"),
        "email": email,
        "firstName": first_name,
        "lastName": "Tester",
        "numberOfOrders": "0",
        "amountSpent": { "amount": "0.00", "currencyCode": "USD" },
        "defaultAddress": { "formatted": ["1 Main St", "Austin TX", "United States"] },
        "createdAt": "2026-01-05T10:00:00Z",
        "updatedAt": "2026-01-05T10:00:00Z",
    })
}

/// A product node with a single variant.
#[must_use]
pub fn product_node(id: u64, title: &str, price: &str) -> Value {
    json!({
        "id": format!("gid://shopify/Product/{id}"),
        "title": title,
        "handle": title.to_lowercase().replace(' ', "-"),
        "status": "ACTIVE",
        "tags": ["integration"],
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
        "variants": {
            "edges": [{ "node": {
                "id": format!("gid://shopify/ProductVariant/{id}"),
                "price": price,
                "sku": format!("SKU-{id}"),
            } }],
            "pageInfo": { "hasNextPage": false, "endCursor": null }
        }
    })
}

/// A line of an order node: `(product id, quantity, unit price)`.
pub type Line<'a> = (u64, i32, &'a str);

/// An order node. `created_at` is RFC 3339.
#[must_use]
pub fn order_node(
    id: u64,
    customer: Option<u64>,
    total: &str,
    created_at: &str,
    lines: &[Line<'_>],
) -> Value {
    let edges: Vec<Value> = lines
        .iter()
        .enumerate()
        .map(|(index, (product, quantity, price))| {
            json!({ "node": {
                "id": format!("gid://shopify/LineItem/{id}{index}"),
                "title": format!("Product {product}"),
                "quantity": quantity,
                "originalUnitPriceSet": money(price),
                "product": { "id": format!("gid://shopify/Product/{product}") },
                "variant": { "id": format!("gid://shopify/ProductVariant/{product}"), "sku": null },
            } })
        })
        .collect();

    json!({
        "id": format!("gid://shopify/Order/{id}"),
        "name": format!("#{id}"),
        "createdAt": created_at,
        "updatedAt": created_at,
        "totalPriceSet": money(total),
        "subtotalPriceSet": money(total),
        "totalTaxSet": money("0.00"),
        "displayFinancialStatus": "PAID",
        "displayFulfillmentStatus": "FULFILLED",
        "customer": customer.map(|c| json!({ "id": format!("gid://shopify/Customer/{c}") })),
        "lineItems": {
            "edges": edges,
            "pageInfo": { "hasNextPage": false, "endCursor": null }
        }
    })
}
