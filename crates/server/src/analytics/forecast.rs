//! Monthly revenue forecast by single exponential smoothing.
//!
//! The history runs from the first month with orders inside the window up to
//! the current month, with empty months filled in as zero. Growth is the
//! mean month-over-month change of the smoothed level, clamped to ±50%, and
//! is damped geometrically over the forecast horizon.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storepulse_core::amount_to_f64;

use super::upper_median;
use crate::models::Order;

/// Smoothing factor; higher reacts faster.
const ALPHA: f64 = 0.4;
/// Monthly growth is clamped to `[-MAX_GROWTH, MAX_GROWTH]`.
const MAX_GROWTH: f64 = 0.5;
/// Per-step damping of growth.
const DAMPENING: f64 = 0.92;
/// Confidence lost per forecast step.
const CONFIDENCE_STEP: f64 = 0.18;
const MIN_CONFIDENCE: f64 = 0.4;
/// Growth beyond which the trend is growing (or declining).
const TREND_THRESHOLD: f64 = 0.05;
/// Months of history needed to forecast at all.
const MIN_HISTORY_MONTHS: usize = 3;

/// Largest horizon accepted by the HTTP surface.
pub const MAX_FORECAST_MONTHS: u32 = 24;
pub const DEFAULT_FORECAST_MONTHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub month: String,
    pub revenue: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Growing,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueForecast {
    pub historical_data: Vec<MonthlyRevenue>,
    pub forecast: Vec<ForecastPoint>,
    pub trend: Trend,
    pub average_monthly_revenue: f64,
    /// Clamped monthly growth as a fraction (0.1 = +10%).
    pub growth_rate: f64,
    pub median_monthly_revenue: f64,
}

/// Months of history considered for a `months`-step forecast.
#[must_use]
pub fn history_window_months(months: u32) -> u32 {
    (months.saturating_mul(2)).max(12)
}

/// An instant no later than the start of the history window.
///
/// Used to narrow the order query; the exact month cut is applied by
/// [`compute_forecast`].
#[must_use]
pub fn history_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now - Duration::days(31 * (i64::from(history_window_months(months)) + 1))
}

/// Month as a running index (`year * 12 + month0`).
#[allow(clippy::cast_possible_wrap)]
fn month_index(at: DateTime<Utc>) -> i32 {
    at.year() * 12 + at.month0() as i32
}

fn as_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn month_key(index: i32) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

/// Forecast `months` months past the current one.
#[must_use]
pub fn compute_forecast(orders: &[Order], months: u32, now: DateTime<Utc>) -> RevenueForecast {
    let current = month_index(now);
    let window_start = current.saturating_sub(as_i32(history_window_months(months)));

    let mut by_month: BTreeMap<i32, Decimal> = BTreeMap::new();
    for order in orders {
        let index = month_index(order.created_at);
        if (window_start..=current).contains(&index) {
            *by_month.entry(index).or_default() += order.total_price;
        }
    }

    let historical_data: Vec<MonthlyRevenue> = by_month
        .first_key_value()
        .map(|(&first, _)| {
            (first..=current)
                .map(|index| MonthlyRevenue {
                    month: month_key(index),
                    revenue: by_month.get(&index).copied().map_or(0.0, amount_to_f64),
                })
                .collect()
        })
        .unwrap_or_default();

    if historical_data.len() < MIN_HISTORY_MONTHS {
        return RevenueForecast {
            historical_data,
            forecast: Vec::new(),
            trend: Trend::InsufficientData,
            average_monthly_revenue: 0.0,
            growth_rate: 0.0,
            median_monthly_revenue: 0.0,
        };
    }

    let revenues: Vec<f64> = historical_data.iter().map(|m| m.revenue).collect();
    let levels = smooth(&revenues);
    let growth = clamp_growth(mean_growth(&levels));

    #[allow(clippy::cast_precision_loss)]
    let mean = revenues.iter().sum::<f64>() / revenues.len() as f64;
    let median = upper_median(&revenues);
    let last_level = levels.last().copied().unwrap_or(0.0);

    let mut last = median.max(mean).max(last_level);
    let forecast = (1..=months)
        .map(|step| {
            let damping = DAMPENING.powi(as_i32(step) - 1);
            last *= 1.0 + growth * damping;
            ForecastPoint {
                month: month_key(current.saturating_add(as_i32(step))),
                revenue: last.max(0.0),
                confidence: (1.0 - CONFIDENCE_STEP * f64::from(step)).max(MIN_CONFIDENCE),
            }
        })
        .collect();

    RevenueForecast {
        historical_data,
        forecast,
        trend: trend_for(growth),
        average_monthly_revenue: mean,
        growth_rate: growth,
        median_monthly_revenue: median,
    }
}

/// Smoothed level per month, seeded with the first observation.
fn smooth(series: &[f64]) -> Vec<f64> {
    let mut level = series.first().copied().unwrap_or(0.0);
    series
        .iter()
        .map(|&y| {
            level = ALPHA.mul_add(y, (1.0 - ALPHA) * level);
            level
        })
        .collect()
}

/// Mean relative change between consecutive levels, skipping zero levels.
fn mean_growth(levels: &[f64]) -> f64 {
    let changes: Vec<f64> = levels
        .windows(2)
        .filter_map(|pair| match pair {
            [prev, curr] if *prev > 0.0 => Some((curr - prev) / prev),
            _ => None,
        })
        .collect();
    if changes.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = changes.len() as f64;
    changes.iter().sum::<f64>() / count
}

fn clamp_growth(growth: f64) -> f64 {
    if growth.is_finite() {
        growth.clamp(-MAX_GROWTH, MAX_GROWTH)
    } else {
        0.0
    }
}

fn trend_for(growth: f64) -> Trend {
    if growth > TREND_THRESHOLD {
        Trend::Growing
    } else if growth < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::analytics::fixtures;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).single().unwrap()
    }

    fn in_month(year: i32, month: u32, total: i64) -> Order {
        let at = Utc.with_ymd_and_hms(year, month, 10, 0, 0, 0).single().unwrap();
        fixtures::order("x", None, total, at)
    }

    #[test]
    fn test_two_months_is_insufficient() {
        let orders = vec![in_month(2026, 5, 100), in_month(2026, 6, 120)];

        let result = compute_forecast(&orders, 3, now());

        assert_eq!(result.trend, Trend::InsufficientData);
        assert!(result.forecast.is_empty());
        assert_eq!(result.historical_data.len(), 2);
        assert!(result.growth_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_orders_is_insufficient() {
        let result = compute_forecast(&[], 3, now());
        assert_eq!(result.trend, Trend::InsufficientData);
        assert!(result.historical_data.is_empty());
    }

    #[test]
    fn test_gaps_are_zero_filled_through_current_month() {
        let orders = vec![in_month(2026, 1, 100), in_month(2026, 4, 50)];

        let result = compute_forecast(&orders, 3, now());

        let months: Vec<&str> = result.historical_data.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(
            months,
            ["2026-01", "2026-02", "2026-03", "2026-04", "2026-05", "2026-06"]
        );
        assert!(result.historical_data[1].revenue.abs() < f64::EPSILON);
    }

    #[test]
    fn test_orders_outside_window_are_ignored() {
        let orders = vec![
            in_month(2024, 1, 1_000_000),
            in_month(2026, 4, 100),
            in_month(2026, 5, 100),
            in_month(2026, 6, 100),
        ];

        let result = compute_forecast(&orders, 3, now());

        assert_eq!(result.historical_data.len(), 3);
        assert!((result.average_monthly_revenue - 100.0).abs() < 1e-9);
        assert_eq!(result.trend, Trend::Stable);
    }

    #[test]
    fn test_explosive_growth_is_clamped() {
        let orders = vec![
            in_month(2026, 3, 10),
            in_month(2026, 4, 1_000),
            in_month(2026, 5, 100_000),
            in_month(2026, 6, 10_000_000),
        ];

        let result = compute_forecast(&orders, 4, now());

        assert!((result.growth_rate - MAX_GROWTH).abs() < f64::EPSILON);
        assert_eq!(result.trend, Trend::Growing);
        assert_eq!(result.forecast.len(), 4);

        let baseline = result
            .median_monthly_revenue
            .max(result.average_monthly_revenue)
            .max(smooth(&[10.0, 1_000.0, 100_000.0, 10_000_000.0])[3]);
        let mut previous = baseline;
        for point in &result.forecast {
            assert!(point.revenue <= previous * (1.0 + MAX_GROWTH) + 1e-6);
            previous = point.revenue;
        }
    }

    #[test]
    fn test_forecast_months_and_confidence() {
        let orders = vec![
            in_month(2026, 3, 100),
            in_month(2026, 4, 100),
            in_month(2026, 5, 100),
            in_month(2026, 6, 100),
        ];

        let result = compute_forecast(&orders, 5, now());

        let months: Vec<&str> = result.forecast.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, ["2026-07", "2026-08", "2026-09", "2026-10", "2026-11"]);
        assert!((result.forecast[0].confidence - 0.82).abs() < 1e-9);
        assert!((result.forecast[3].confidence - 0.4).abs() < 1e-9);
        assert!((result.forecast[4].confidence - 0.4).abs() < 1e-9);
        assert!((result.forecast[0].revenue - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_declining_series() {
        let orders = vec![
            in_month(2026, 3, 1000),
            in_month(2026, 4, 600),
            in_month(2026, 5, 300),
            in_month(2026, 6, 100),
        ];

        let result = compute_forecast(&orders, 2, now());
        assert_eq!(result.trend, Trend::Declining);
        assert!(result.forecast.iter().all(|p| p.revenue >= 0.0));
    }

    #[test]
    fn test_year_rollover_keys() {
        assert_eq!(month_key(2026 * 12 + 11), "2026-12");
        assert_eq!(month_key(2026 * 12 + 12), "2027-01");
        assert_eq!(history_window_months(3), 12);
        assert_eq!(history_window_months(10), 20);
    }
}
