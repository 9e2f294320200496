//! Customer segmentation.
//!
//! Buckets are not exclusive: a customer can be VIP and Frequent at once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storepulse_core::{RemoteId, amount_to_f64};

use super::days_before;
use crate::models::{Customer, Order};

/// Customers shown per segment.
pub const SEGMENT_DISPLAY_LIMIT: usize = 20;

/// Orders needed to count as a frequent buyer.
pub const FREQUENT_ORDER_COUNT: usize = 5;

/// Window for "new" and "one-time" customers.
pub const RECENT_DAYS: i64 = 30;

/// Inactivity after which a repeat customer is at risk.
pub const AT_RISK_DAYS: i64 = 90;

/// One customer's order history, as shown in a segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: RemoteId,
    pub name: String,
    pub email: Option<String>,
    pub order_count: usize,
    pub total_spent: f64,
    pub last_order_date: Option<DateTime<Utc>>,
    pub first_order_date: Option<DateTime<Utc>>,
}

/// A segment's full size and its top spenders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Segment {
    pub count: usize,
    pub customers: Vec<CustomerSummary>,
}

impl Segment {
    fn from_members(mut members: Vec<CustomerSummary>) -> Self {
        members.sort_by(|a, b| {
            b.total_spent
                .total_cmp(&a.total_spent)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        let count = members.len();
        members.truncate(SEGMENT_DISPLAY_LIMIT);
        Self {
            count,
            customers: members,
        }
    }

    /// Whether `id` is among the displayed customers.
    #[must_use]
    pub fn contains(&self, id: &RemoteId) -> bool {
        self.customers.iter().any(|c| &c.customer_id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSegments {
    pub vip: Segment,
    pub frequent: Segment,
    pub new: Segment,
    pub at_risk: Segment,
    pub one_time: Segment,
    pub total_customers: usize,
    /// Spend needed to be VIP.
    pub vip_threshold: f64,
}

#[derive(Debug, Default)]
struct OrderStats {
    count: usize,
    spent: Decimal,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

impl OrderStats {
    fn record(&mut self, order: &Order) {
        self.count += 1;
        self.spent += order.total_price;
        self.first = Some(self.first.map_or(order.created_at, |t| t.min(order.created_at)));
        self.last = Some(self.last.map_or(order.created_at, |t| t.max(order.created_at)));
    }
}

/// Classify `customers` by the orders they placed.
///
/// Spend is the sum of the customer's order totals. The VIP threshold is
/// `(20% of total revenue / customer count) * 5`; a customer with no spend
/// is never VIP.
#[must_use]
pub fn compute_segments(
    customers: &[Customer],
    orders: &[Order],
    now: DateTime<Utc>,
) -> CustomerSegments {
    if customers.is_empty() {
        return CustomerSegments::default();
    }

    let mut stats: HashMap<&RemoteId, OrderStats> = HashMap::new();
    for order in orders {
        if let Some(customer_id) = &order.customer_id {
            stats.entry(customer_id).or_default().record(order);
        }
    }

    let empty = OrderStats::default();
    let total_revenue: Decimal = customers
        .iter()
        .filter_map(|c| stats.get(&c.id))
        .map(|s| s.spent)
        .sum();
    let threshold =
        total_revenue * Decimal::new(2, 1) / Decimal::from(customers.len()) * Decimal::from(5);

    let recent_cutoff = days_before(now, RECENT_DAYS);
    let at_risk_cutoff = days_before(now, AT_RISK_DAYS);

    let mut vip = Vec::new();
    let mut frequent = Vec::new();
    let mut new = Vec::new();
    let mut at_risk = Vec::new();
    let mut one_time = Vec::new();

    for customer in customers {
        let s = stats.get(&customer.id).unwrap_or(&empty);
        let summary = CustomerSummary {
            customer_id: customer.id.clone(),
            name: customer
                .display_name()
                .unwrap_or_else(|| "Unknown".to_string()),
            email: customer.email.clone(),
            order_count: s.count,
            total_spent: amount_to_f64(s.spent),
            last_order_date: s.last,
            first_order_date: s.first,
        };

        if s.spent > Decimal::ZERO && s.spent >= threshold {
            vip.push(summary.clone());
        }
        if s.count >= FREQUENT_ORDER_COUNT {
            frequent.push(summary.clone());
        }
        if s.first.is_some_and(|first| first >= recent_cutoff) {
            new.push(summary.clone());
        }
        if s.count > 1 && s.last.is_some_and(|last| last < at_risk_cutoff) {
            at_risk.push(summary.clone());
        }
        if s.count == 1 && s.last.is_some_and(|last| last < recent_cutoff) {
            one_time.push(summary);
        }
    }

    CustomerSegments {
        vip: Segment::from_members(vip),
        frequent: Segment::from_members(frequent),
        new: Segment::from_members(new),
        at_risk: Segment::from_members(at_risk),
        one_time: Segment::from_members(one_time),
        total_customers: customers.len(),
        vip_threshold: amount_to_f64(threshold),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use storepulse_core::{StoreId, StoreScope, TenantId};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().unwrap()
    }

    fn scope() -> StoreScope {
        StoreScope::new(TenantId::new(1), StoreId::new(1))
    }

    fn customer(id: &str) -> Customer {
        Customer {
            id: RemoteId::from_stored(id),
            scope: scope(),
            email: None,
            first_name: Some(format!("Customer{id}")),
            last_name: None,
            orders_count: 0,
            total_spent: Decimal::ZERO,
            default_address: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn order(id: &str, customer: &str, total: i64, days_ago: i64) -> Order {
        let at = now() - Duration::days(days_ago);
        Order {
            id: RemoteId::from_stored(id),
            scope: scope(),
            name: None,
            customer_id: Some(RemoteId::from_stored(customer)),
            total_price: Decimal::from(total),
            subtotal_price: Decimal::from(total),
            total_tax: Decimal::ZERO,
            currency: None,
            financial_status: None,
            fulfillment_status: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn rid(id: &str) -> RemoteId {
        RemoteId::from_stored(id)
    }

    #[test]
    fn test_empty_store_has_empty_segments() {
        let segments = compute_segments(&[], &[], now());
        assert_eq!(segments.total_customers, 0);
        assert_eq!(segments.vip.count, 0);
    }

    #[test]
    fn test_one_time_buyer_only_lands_in_one_time() {
        let customers = vec![customer("1"), customer("2")];
        let orders = vec![
            order("a", "1", 50, 45),
            order("b", "2", 900, 2),
            order("c", "2", 900, 3),
        ];

        let segments = compute_segments(&customers, &orders, now());

        assert!(segments.one_time.contains(&rid("1")));
        assert!(!segments.vip.contains(&rid("1")));
        assert!(!segments.frequent.contains(&rid("1")));
        assert!(!segments.new.contains(&rid("1")));
        assert!(!segments.at_risk.contains(&rid("1")));
    }

    #[test]
    fn test_vip_threshold_and_zero_spend() {
        let customers = vec![customer("1"), customer("2"), customer("3")];
        let orders = vec![order("a", "1", 1000, 10), order("b", "2", 50, 10)];

        let segments = compute_segments(&customers, &orders, now());

        // (1050 * 0.2 / 3) * 5 = 350
        assert!((segments.vip_threshold - 350.0).abs() < 1e-9);
        assert_eq!(segments.vip.count, 1);
        assert!(segments.vip.contains(&rid("1")));
        for segment in [
            &segments.vip,
            &segments.frequent,
            &segments.new,
            &segments.at_risk,
            &segments.one_time,
        ] {
            assert!(!segment.contains(&rid("3")));
        }
    }

    #[test]
    fn test_frequent_and_at_risk() {
        let customers = vec![customer("1"), customer("2")];
        let mut orders: Vec<Order> = (0..5)
            .map(|i| order(&format!("f{i}"), "1", 10, 5 + i))
            .collect();
        orders.push(order("r1", "2", 10, 120));
        orders.push(order("r2", "2", 10, 100));

        let segments = compute_segments(&customers, &orders, now());

        assert!(segments.frequent.contains(&rid("1")));
        assert!(segments.at_risk.contains(&rid("2")));
        assert!(!segments.at_risk.contains(&rid("1")));
        assert!(segments.new.contains(&rid("1")));
        let summary = &segments.frequent.customers[0];
        assert_eq!(summary.order_count, 5);
        assert_eq!(summary.first_order_date, Some(now() - Duration::days(9)));
        assert_eq!(summary.last_order_date, Some(now() - Duration::days(5)));
    }

    #[test]
    fn test_segments_sorted_by_spend_and_truncated() {
        let customers: Vec<Customer> = (0..25).map(|i| customer(&i.to_string())).collect();
        let orders: Vec<Order> = (0..25)
            .map(|i| order(&format!("o{i}"), &i.to_string(), 10 + i, 40))
            .collect();

        let segments = compute_segments(&customers, &orders, now());

        assert_eq!(segments.one_time.count, 25);
        assert_eq!(segments.one_time.customers.len(), SEGMENT_DISPLAY_LIMIT);
        assert_eq!(segments.one_time.customers[0].customer_id, rid("24"));
        assert!(
            segments
                .one_time
                .customers
                .windows(2)
                .all(|w| w[0].total_spent >= w[1].total_spent)
        );
    }

    #[test]
    fn test_orders_for_unknown_customers_are_ignored() {
        let customers = vec![customer("1")];
        let orders = vec![order("a", "1", 100, 40), order("b", "ghost", 10_000, 40)];

        let segments = compute_segments(&customers, &orders, now());

        assert!((segments.vip_threshold - 100.0).abs() < 1e-9);
        assert!(segments.vip.contains(&rid("1")));
    }
}
