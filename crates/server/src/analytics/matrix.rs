//! Product performance matrix (revenue x growth).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use storepulse_core::{RemoteId, amount_to_f64};

use super::{days_before, upper_median};
use crate::models::{DateWindow, Product, ProductSales};

/// Growth (percent) separating high from low growth.
pub const GROWTH_THRESHOLD: f64 = 10.0;

/// Products shown per quadrant.
pub const QUADRANT_DISPLAY_LIMIT: usize = 10;

const PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub product_id: RemoteId,
    pub title: String,
    pub handle: Option<String>,
    pub recent_revenue: f64,
    /// Percent change against the previous period.
    pub growth_rate: f64,
    pub units_sold: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Quadrant {
    pub count: usize,
    pub products: Vec<ProductPerformance>,
}

impl Quadrant {
    fn from_members(
        mut members: Vec<ProductPerformance>,
        order: impl Fn(&ProductPerformance, &ProductPerformance) -> std::cmp::Ordering,
    ) -> Self {
        members.sort_by(|a, b| order(a, b).then_with(|| a.product_id.cmp(&b.product_id)));
        let count = members.len();
        members.truncate(QUADRANT_DISPLAY_LIMIT);
        Self {
            count,
            products: members,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &RemoteId) -> bool {
        self.products.iter().any(|p| &p.product_id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatrix {
    /// High revenue, high growth.
    pub stars: Quadrant,
    /// High revenue, low growth.
    pub cash_cows: Quadrant,
    /// Low revenue, high growth.
    pub question_marks: Quadrant,
    /// Low revenue, low growth.
    pub dogs: Quadrant,
    pub median_revenue: f64,
}

/// The last 30 days and the 30 days before them.
#[must_use]
pub fn periods(now: DateTime<Utc>) -> (DateWindow, DateWindow) {
    let split = days_before(now, PERIOD_DAYS);
    let recent = DateWindow::since(split);
    let older = DateWindow::between(days_before(now, 2 * PERIOD_DAYS), split);
    (recent, older)
}

/// Percent change from `older` to `recent`.
///
/// 100 when there was nothing before and something now; 0 when both are
/// zero.
#[must_use]
pub fn growth_rate(recent: f64, older: f64) -> f64 {
    if older > 0.0 {
        (recent - older) / older * 100.0
    } else if recent > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Classify `products` by their sales in the recent and older periods.
#[must_use]
pub fn compute_matrix(
    products: &[Product],
    recent: &[ProductSales],
    older: &[ProductSales],
) -> ProductMatrix {
    let recent: HashMap<&RemoteId, &ProductSales> =
        recent.iter().map(|s| (&s.product_id, s)).collect();
    let older: HashMap<&RemoteId, &ProductSales> =
        older.iter().map(|s| (&s.product_id, s)).collect();

    let performances: Vec<ProductPerformance> = products
        .iter()
        .filter_map(|product| {
            let current = recent.get(&product.id);
            let recent_revenue = current.map_or(0.0, |s| amount_to_f64(s.revenue));
            let older_revenue = older.get(&product.id).map_or(0.0, |s| amount_to_f64(s.revenue));

            // No sales in either period.
            if recent_revenue <= 0.0 && older_revenue <= 0.0 {
                return None;
            }

            Some(ProductPerformance {
                product_id: product.id.clone(),
                title: product.title.clone(),
                handle: product.handle.clone(),
                recent_revenue,
                growth_rate: growth_rate(recent_revenue, older_revenue),
                units_sold: current.map_or(0, |s| s.units),
            })
        })
        .collect();

    let selling: Vec<f64> = performances
        .iter()
        .map(|p| p.recent_revenue)
        .filter(|r| *r > 0.0)
        .collect();
    let median = upper_median(&selling);

    let mut stars = Vec::new();
    let mut cash_cows = Vec::new();
    let mut question_marks = Vec::new();
    let mut dogs = Vec::new();

    for product in performances {
        let high_revenue = product.recent_revenue > 0.0 && product.recent_revenue >= median;
        let high_growth = product.growth_rate >= GROWTH_THRESHOLD;
        match (high_revenue, high_growth) {
            (true, true) => stars.push(product),
            (true, false) => cash_cows.push(product),
            (false, true) => question_marks.push(product),
            (false, false) => dogs.push(product),
        }
    }

    ProductMatrix {
        stars: Quadrant::from_members(stars, |a, b| b.recent_revenue.total_cmp(&a.recent_revenue)),
        cash_cows: Quadrant::from_members(cash_cows, |a, b| {
            b.recent_revenue.total_cmp(&a.recent_revenue)
        }),
        question_marks: Quadrant::from_members(question_marks, |a, b| {
            b.growth_rate.total_cmp(&a.growth_rate)
        }),
        dogs: Quadrant::from_members(dogs, |a, b| a.recent_revenue.total_cmp(&b.recent_revenue)),
        median_revenue: median,
    }
}
