//! Wire types for paginated Admin API responses and the normalized records
//! handed to the reconciler.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use storepulse_core::RemoteId;

// =============================================================================
// Normalized records
// =============================================================================

/// A customer as fetched upstream. `None` means "not supplied".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCustomer {
    pub id: RemoteId,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub orders_count: Option<i32>,
    pub total_spent: Option<Decimal>,
    pub default_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A product as fetched upstream. Price and SKU come from the first variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProduct {
    pub id: RemoteId,
    pub title: Option<String>,
    pub handle: Option<String>,
    pub status: Option<String>,
    /// Comma-joined tags.
    pub tags: Option<String>,
    pub price: Option<Decimal>,
    pub sku: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An order as fetched upstream, with its line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrder {
    pub id: RemoteId,
    pub name: Option<String>,
    pub customer_id: Option<RemoteId>,
    pub total_price: Option<Decimal>,
    pub subtotal_price: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub currency: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub line_items: Vec<RemoteLineItem>,
}

/// An order line as fetched upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteLineItem {
    /// Upstream id; absent for some legacy or custom lines.
    pub id: Option<RemoteId>,
    pub title: Option<String>,
    pub quantity: Option<i32>,
    /// Unit price.
    pub price: Option<Decimal>,
    pub product_id: Option<RemoteId>,
    pub variant_id: Option<RemoteId>,
    pub sku: Option<String>,
}

impl RemoteCustomer {
    /// A record carrying only its identity.
    #[must_use]
    pub const fn new(id: RemoteId) -> Self {
        Self {
            id,
            email: None,
            first_name: None,
            last_name: None,
            orders_count: None,
            total_spent: None,
            default_address: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl RemoteProduct {
    /// A record carrying only its identity.
    #[must_use]
    pub const fn new(id: RemoteId) -> Self {
        Self {
            id,
            title: None,
            handle: None,
            status: None,
            tags: None,
            price: None,
            sku: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl RemoteOrder {
    /// A record carrying only its identity.
    #[must_use]
    pub const fn new(id: RemoteId) -> Self {
        Self {
            id,
            name: None,
            customer_id: None,
            total_price: None,
            subtotal_price: None,
            total_tax: None,
            currency: None,
            financial_status: None,
            fulfillment_status: None,
            created_at: None,
            updated_at: None,
            line_items: Vec::new(),
        }
    }
}

impl RemoteLineItem {
    /// `quantity * price`, when both are known.
    #[must_use]
    pub fn total(&self) -> Option<Decimal> {
        Some(Decimal::from(self.quantity?) * self.price?)
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// `first`/`after` variables shared by every paginated query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageVariables {
    pub first: i32,
    pub after: Option<String>,
}

/// Response `data` for a paginated query; the root field name varies.
#[derive(Debug, Deserialize)]
pub struct PageData<N> {
    #[serde(alias = "customers", alias = "products", alias = "orders")]
    pub connection: Connection<N>,
}

/// A Relay-style connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<N>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct Edge<N> {
    pub node: N,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// `{ id }` reference to another node.
#[derive(Debug, Deserialize)]
pub struct NodeRef {
    pub id: String,
}

/// `MoneyBag.shopMoney`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyBag {
    pub shop_money: MoneyV2,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyV2 {
    pub amount: String,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerNode {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Unsigned 64-bit counts arrive as strings.
    pub number_of_orders: Option<serde_json::Value>,
    pub amount_spent: Option<MoneyV2>,
    pub default_address: Option<AddressNode>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddressNode {
    #[serde(default)]
    pub formatted: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNode {
    pub id: String,
    pub title: Option<String>,
    pub handle: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
    pub variants: Option<Connection<VariantNode>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VariantNode {
    pub id: String,
    pub price: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNode {
    pub id: String,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub total_price_set: Option<MoneyBag>,
    pub subtotal_price_set: Option<MoneyBag>,
    pub total_tax_set: Option<MoneyBag>,
    pub display_financial_status: Option<String>,
    pub display_fulfillment_status: Option<String>,
    pub customer: Option<NodeRef>,
    pub line_items: Option<Connection<LineItemNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemNode {
    pub id: Option<String>,
    pub title: Option<String>,
    pub quantity: Option<i32>,
    pub original_unit_price_set: Option<MoneyBag>,
    pub product: Option<NodeRef>,
    pub variant: Option<VariantRef>,
}

#[derive(Debug, Deserialize)]
pub struct VariantRef {
    pub id: String,
    pub sku: Option<String>,
}
