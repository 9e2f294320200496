//! Store totals over an optional date window.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use storepulse_core::amount_to_f64;

use crate::models::{Customer, DateWindow, Order};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub orders_count: usize,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    /// Customers created inside the window.
    pub total_customers: usize,
    pub total_orders: usize,
    /// All products of the store, regardless of the window.
    pub total_products: usize,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub orders_per_customer: f64,
    pub revenue_per_customer: f64,
    /// One entry per day with orders, oldest first.
    pub daily: Vec<DailyTotals>,
}

fn ratio(numerator: Decimal, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    amount_to_f64(numerator / Decimal::from(denominator))
}

/// Summarize the orders and customers created inside `window`.
#[must_use]
pub fn compute_summary(
    customers: &[Customer],
    orders: &[Order],
    total_products: usize,
    window: DateWindow,
) -> StoreSummary {
    let total_customers = customers
        .iter()
        .filter(|c| window.contains(c.created_at))
        .count();

    let mut revenue = Decimal::ZERO;
    let mut total_orders = 0;
    let mut by_day: BTreeMap<NaiveDate, (usize, Decimal)> = BTreeMap::new();
    for order in orders.iter().filter(|o| window.contains(o.created_at)) {
        total_orders += 1;
        revenue += order.total_price;
        let day = by_day.entry(order.created_at.date_naive()).or_default();
        day.0 += 1;
        day.1 += order.total_price;
    }

    StoreSummary {
        total_customers,
        total_orders,
        total_products,
        total_revenue: amount_to_f64(revenue),
        avg_order_value: ratio(revenue, total_orders),
        orders_per_customer: ratio(Decimal::from(total_orders), total_customers),
        revenue_per_customer: ratio(revenue, total_customers),
        daily: by_day
            .into_iter()
            .map(|(date, (count, total))| DailyTotals {
                date,
                orders_count: count,
                total_revenue: amount_to_f64(total),
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::analytics::fixtures::{customer, order};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).single().unwrap()
    }

    #[test]
    fn test_empty_store_has_zero_ratios() {
        let summary = compute_summary(&[], &[], 0, DateWindow::ALL);
        assert_eq!(summary, StoreSummary::default());
    }

    #[test]
    fn test_totals_and_daily_series() {
        let customers = vec![
            Customer {
                created_at: at(1, 0),
                ..customer("1")
            },
            Customer {
                created_at: at(2, 0),
                ..customer("2")
            },
        ];
        let orders = vec![
            order("a", Some("1"), 100, at(3, 9)),
            order("b", Some("1"), 50, at(3, 18)),
            order("c", Some("2"), 150, at(5, 12)),
        ];

        let summary = compute_summary(&customers, &orders, 7, DateWindow::ALL);

        assert_eq!(summary.total_customers, 2);
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.total_products, 7);
        assert!((summary.total_revenue - 300.0).abs() < 1e-9);
        assert!((summary.avg_order_value - 100.0).abs() < 1e-9);
        assert!((summary.orders_per_customer - 1.5).abs() < 1e-9);
        assert!((summary.revenue_per_customer - 150.0).abs() < 1e-9);
        assert_eq!(summary.daily.len(), 2);
        assert_eq!(summary.daily[0].date, at(3, 0).date_naive());
        assert_eq!(summary.daily[0].orders_count, 2);
        assert!((summary.daily[1].total_revenue - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_filters_customers_and_orders() {
        let customers = vec![
            Customer {
                created_at: at(1, 0),
                ..customer("old")
            },
            Customer {
                created_at: at(10, 0),
                ..customer("new")
            },
        ];
        let orders = vec![
            order("a", Some("old"), 100, at(2, 0)),
            order("b", Some("new"), 40, at(10, 12)),
        ];

        let window = DateWindow::between(at(10, 0), at(11, 0));
        let summary = compute_summary(&customers, &orders, 1, window);

        assert_eq!(summary.total_customers, 1);
        assert_eq!(summary.total_orders, 1);
        assert!((summary.total_revenue - 40.0).abs() < 1e-9);
        assert_eq!(summary.total_products, 1);
    }

    #[test]
    fn test_orders_without_customers_in_window() {
        let orders = vec![order("a", None, 20, at(3, 0))];
        let summary = compute_summary(&[], &orders, 0, DateWindow::ALL);

        assert!((summary.avg_order_value - 20.0).abs() < 1e-9);
        assert!(summary.revenue_per_customer.abs() < f64::EPSILON);
        assert!(summary.orders_per_customer.abs() < f64::EPSILON);
    }
}
