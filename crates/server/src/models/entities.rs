//! Customers, products, orders and line items as stored locally.
//!
//! Every entity is keyed by `(store, remote id)` and carries its full
//! [`StoreScope`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storepulse_core::{RemoteId, StoreScope};

/// A customer of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: RemoteId,
    pub scope: StoreScope,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Lifetime order count as reported upstream.
    pub orders_count: i32,
    /// Lifetime spend as reported upstream.
    pub total_spent: Decimal,
    /// Default address, formatted on a single line.
    pub default_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// "First Last", or `None` when neither part is known.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// A product of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: RemoteId,
    pub scope: StoreScope,
    pub title: String,
    pub handle: Option<String>,
    /// Price of the first variant.
    pub price: Option<Decimal>,
    /// SKU of the first variant.
    pub sku: Option<String>,
    pub status: Option<String>,
    /// Comma-separated tags.
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order placed in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: RemoteId,
    pub scope: StoreScope,
    /// Order name (e.g., "#1001").
    pub name: Option<String>,
    /// `None` for guest checkouts and customers unknown locally.
    pub customer_id: Option<RemoteId>,
    pub total_price: Decimal,
    pub subtotal_price: Decimal,
    pub total_tax: Decimal,
    pub currency: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Upstream id, or the deterministic `order:discriminator` key.
    pub id: RemoteId,
    pub scope: StoreScope,
    pub order_id: RemoteId,
    /// `None` when the product is not present locally.
    pub product_id: Option<RemoteId>,
    pub variant_id: Option<RemoteId>,
    pub sku: Option<String>,
    pub title: Option<String>,
    pub quantity: i32,
    /// Unit price.
    pub price: Decimal,
    /// `quantity * price`.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item totals grouped by product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub product_id: RemoteId,
    pub units: i64,
    pub revenue: Decimal,
    /// Number of line items contributing (one per order line).
    pub line_count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storepulse_core::{StoreId, TenantId};

    fn customer(first: Option<&str>, last: Option<&str>) -> Customer {
        Customer {
            id: RemoteId::from_global_id("1").unwrap(),
            scope: StoreScope::new(TenantId::new(1), StoreId::new(1)),
            email: None,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            orders_count: 0,
            total_spent: Decimal::ZERO,
            default_address: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            customer(Some("Ada"), Some("Lovelace")).display_name().as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(customer(None, Some("Hopper")).display_name().as_deref(), Some("Hopper"));
        assert_eq!(customer(Some("  "), None).display_name(), None);
        assert_eq!(customer(None, None).display_name(), None);
    }
}
