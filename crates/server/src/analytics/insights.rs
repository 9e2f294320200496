//! Top products, top customers and customer locations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use storepulse_core::{RemoteId, amount_to_f64};

use crate::models::{Customer, Order, Product, ProductSales};

/// Locations reported at most.
pub const LOCATION_LIMIT: usize = 10;
/// Entries per list in the combined insights view.
pub const INSIGHTS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: RemoteId,
    pub title: String,
    pub handle: Option<String>,
    pub total_quantity_sold: i64,
    pub total_revenue: f64,
    /// Order lines that included the product.
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub customer_id: RemoteId,
    pub name: String,
    pub email: String,
    pub total_spent: f64,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStats {
    pub location: String,
    pub customer_count: usize,
    /// Sum of the customers' upstream lifetime order counts.
    pub total_orders: i64,
    /// Sum of the customers' upstream lifetime spend.
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInsights {
    pub top_products: Vec<TopProduct>,
    pub top_customers: Vec<TopCustomer>,
    pub customer_locations: Vec<LocationStats>,
}

/// Best sellers by revenue.
///
/// `sales` must already be ordered by revenue, as
/// [`StoreRepository::product_sales`](crate::db::StoreRepository::product_sales)
/// returns it.
#[must_use]
pub fn top_products(sales: &[ProductSales], products: &[Product], limit: usize) -> Vec<TopProduct> {
    let by_id: HashMap<&RemoteId, &Product> = products.iter().map(|p| (&p.id, p)).collect();

    sales
        .iter()
        .take(limit)
        .map(|s| {
            let product = by_id.get(&s.product_id);
            TopProduct {
                product_id: s.product_id.clone(),
                title: product.map_or_else(|| "Unknown Product".to_string(), |p| p.title.clone()),
                handle: product.and_then(|p| p.handle.clone()),
                total_quantity_sold: s.units,
                total_revenue: amount_to_f64(s.revenue),
                order_count: s.line_count,
            }
        })
        .collect()
}

/// Biggest spenders by the sum of their order totals.
#[must_use]
pub fn top_customers(orders: &[Order], customers: &[Customer], limit: usize) -> Vec<TopCustomer> {
    let mut totals: HashMap<&RemoteId, (Decimal, usize)> = HashMap::new();
    for order in orders {
        if let Some(customer_id) = &order.customer_id {
            let entry = totals.entry(customer_id).or_default();
            entry.0 += order.total_price;
            entry.1 += 1;
        }
    }

    let mut ranked: Vec<(&RemoteId, Decimal, usize)> = totals
        .into_iter()
        .map(|(id, (spent, count))| (id, spent, count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let by_id: HashMap<&RemoteId, &Customer> = customers.iter().map(|c| (&c.id, c)).collect();
    ranked
        .into_iter()
        .take(limit)
        .map(|(id, spent, count)| {
            let customer = by_id.get(id);
            TopCustomer {
                customer_id: id.clone(),
                name: customer
                    .and_then(|c| c.display_name())
                    .unwrap_or_else(|| "Unknown".to_string()),
                email: customer
                    .and_then(|c| c.email.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                total_spent: amount_to_f64(spent),
                order_count: count,
            }
        })
        .collect()
}

/// Customers grouped by default address, largest groups first.
#[must_use]
pub fn customer_locations(customers: &[Customer]) -> Vec<LocationStats> {
    let mut groups: HashMap<&str, (usize, i64, Decimal)> = HashMap::new();
    for customer in customers {
        let Some(location) = customer.default_address.as_deref() else {
            continue;
        };
        let location = location.trim();
        if location.is_empty() {
            continue;
        }
        let entry = groups.entry(location).or_default();
        entry.0 += 1;
        entry.1 += i64::from(customer.orders_count);
        entry.2 += customer.total_spent;
    }

    let mut locations: Vec<LocationStats> = groups
        .into_iter()
        .map(|(location, (count, orders, revenue))| LocationStats {
            location: location.to_string(),
            customer_count: count,
            total_orders: orders,
            total_revenue: amount_to_f64(revenue),
        })
        .collect();
    locations.sort_by(|a, b| {
        b.customer_count
            .cmp(&a.customer_count)
            .then_with(|| a.location.cmp(&b.location))
    });
    locations.truncate(LOCATION_LIMIT);
    locations
}

/// The combined insights view.
#[must_use]
pub fn compute_insights(
    sales: &[ProductSales],
    products: &[Product],
    orders: &[Order],
    customers: &[Customer],
) -> StoreInsights {
    StoreInsights {
        top_products: top_products(sales, products, INSIGHTS_LIMIT),
        top_customers: top_customers(orders, customers, INSIGHTS_LIMIT),
        customer_locations: customer_locations(customers),
    }
}
