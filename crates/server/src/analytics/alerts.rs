//! Threshold-based business alerts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storepulse_core::{RemoteId, amount_to_f64};

use super::days_before;
use crate::models::{Order, Product, ProductSales};

/// Week-over-week drop (percent) that raises a critical alert.
const REVENUE_DROP_PERCENT: f64 = -20.0;
/// Week-over-week rise (percent) that raises a success alert.
const REVENUE_SURGE_PERCENT: f64 = 30.0;
/// A last order above this total marks a customer as high value.
const HIGH_VALUE_ORDER: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
/// Lapsed high-value customers tolerated before alerting.
const RETENTION_ALERT_AFTER: usize = 5;
const INACTIVE_DAYS: i64 = 30;
/// Product titles named in the slow-moving alert.
const SLOW_MOVING_SAMPLE: usize = 5;

/// Severity, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Critical,
    Warning,
    Success,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Revenue,
    Product,
    Customer,
    Inventory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertType,
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
    pub value: f64,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAlerts {
    pub alerts: Vec<Alert>,
    pub alert_count: usize,
    pub critical_count: usize,
}

/// Everything the alert rules look at.
#[derive(Debug, Clone, Copy)]
pub struct AlertInputs<'a> {
    /// Revenue of the trailing 7 days.
    pub week_revenue: Decimal,
    /// Revenue of the 7 days before that.
    pub previous_week_revenue: Decimal,
    /// Product sales of the trailing 7 days, any order.
    pub week_sales: &'a [ProductSales],
    /// Product sales of the trailing 30 days.
    pub month_sales: &'a [ProductSales],
    pub products: &'a [Product],
    /// All orders of the store.
    pub orders: &'a [Order],
}

/// Evaluate every rule and sort the alerts by severity.
#[must_use]
pub fn compute_alerts(inputs: AlertInputs<'_>, now: DateTime<Utc>) -> BusinessAlerts {
    let mut alerts: Vec<Alert> = [
        revenue_alert(inputs.week_revenue, inputs.previous_week_revenue),
        trending_alert(inputs.week_sales, inputs.products),
        retention_alert(inputs.orders, now),
        slow_moving_alert(inputs.month_sales, inputs.products),
    ]
    .into_iter()
    .flatten()
    .collect();

    alerts.sort_by_key(|alert| alert.kind);
    let critical_count = alerts
        .iter()
        .filter(|alert| alert.kind == AlertType::Critical)
        .count();

    BusinessAlerts {
        alert_count: alerts.len(),
        critical_count,
        alerts,
    }
}

/// Week-over-week revenue change; silent when last week had no revenue.
fn revenue_alert(current: Decimal, previous: Decimal) -> Option<Alert> {
    if previous <= Decimal::ZERO {
        return None;
    }
    let change = amount_to_f64((current - previous) / previous * Decimal::ONE_HUNDRED);

    if change < REVENUE_DROP_PERCENT {
        Some(Alert {
            kind: AlertType::Critical,
            category: AlertCategory::Revenue,
            title: "Revenue Drop Alert".to_string(),
            message: format!(
                "Revenue decreased by {:.1}% compared to last week",
                change.abs()
            ),
            value: change,
            action: "Review recent orders and customer feedback".to_string(),
        })
    } else if change > REVENUE_SURGE_PERCENT {
        Some(Alert {
            kind: AlertType::Success,
            category: AlertCategory::Revenue,
            title: "Revenue Surge".to_string(),
            message: format!("Revenue increased by {change:.1}% compared to last week"),
            value: change,
            action: "Analyze what drove this growth".to_string(),
        })
    } else {
        None
    }
}

/// The week's best seller by units.
fn trending_alert(week_sales: &[ProductSales], products: &[Product]) -> Option<Alert> {
    let top = week_sales
        .iter()
        .filter(|s| s.units > 0)
        .max_by(|a, b| {
            a.units
                .cmp(&b.units)
                .then_with(|| a.revenue.cmp(&b.revenue))
                .then_with(|| b.product_id.cmp(&a.product_id))
        })?;
    let product = products.iter().find(|p| p.id == top.product_id)?;

    #[allow(clippy::cast_precision_loss)]
    let value = top.units as f64;
    Some(Alert {
        kind: AlertType::Info,
        category: AlertCategory::Product,
        title: "Trending Product".to_string(),
        message: format!("\"{}\" sold {} units this week", product.title, top.units),
        value,
        action: "Consider promoting this product".to_string(),
    })
}

/// Customers whose last order was high value and is 30+ days old.
fn retention_alert(orders: &[Order], now: DateTime<Utc>) -> Option<Alert> {
    let cutoff = days_before(now, INACTIVE_DAYS);

    let mut last_orders: HashMap<&RemoteId, &Order> = HashMap::new();
    for order in orders {
        let Some(customer_id) = &order.customer_id else {
            continue;
        };
        last_orders
            .entry(customer_id)
            .and_modify(|last| {
                if order.created_at > last.created_at {
                    *last = order;
                }
            })
            .or_insert(order);
    }

    let lapsed = last_orders
        .values()
        .filter(|last| last.created_at < cutoff && last.total_price > HIGH_VALUE_ORDER)
        .count();
    if lapsed <= RETENTION_ALERT_AFTER {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let value = lapsed as f64;
    Some(Alert {
        kind: AlertType::Warning,
        category: AlertCategory::Customer,
        title: "Customer Retention Alert".to_string(),
        message: format!("{lapsed} high-value customers haven't ordered in 30+ days"),
        value,
        action: "Send re-engagement campaign".to_string(),
    })
}

/// Products with no line items in the trailing 30 days.
fn slow_moving_alert(month_sales: &[ProductSales], products: &[Product]) -> Option<Alert> {
    let sold: HashSet<&RemoteId> = month_sales.iter().map(|s| &s.product_id).collect();
    let idle: Vec<&Product> = products.iter().filter(|p| !sold.contains(&p.id)).collect();
    if idle.is_empty() {
        return None;
    }

    let sample = idle
        .iter()
        .take(SLOW_MOVING_SAMPLE)
        .map(|p| p.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    #[allow(clippy::cast_precision_loss)]
    let value = idle.len() as f64;
    Some(Alert {
        kind: AlertType::Warning,
        category: AlertCategory::Inventory,
        title: "Slow-Moving Inventory".to_string(),
        message: format!(
            "{} products had no sales in the past 30 days: {sample}",
            idle.len()
        ),
        value,
        action: "Consider promotions or discontinuation".to_string(),
    })
}
