//! Analytics report handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::analytics::{
    BusinessAlerts, CustomerSegments, DEFAULT_FORECAST_MONTHS, MAX_FORECAST_MONTHS, ProductMatrix,
    RevenueForecast, StoreInsights, StoreSummary,
};
use crate::error::AppError;
use crate::models::DateWindow;
use crate::routes::extract::{ApiQuery, StorePath};
use crate::state::AppState;

/// Build the analytics router.
pub fn router() -> Router<AppState> {
    let base = "/tenants/{tenant_id}/stores/{store_id}/analytics";
    Router::new()
        .route(&format!("{base}/segments"), get(segments))
        .route(&format!("{base}/forecast"), get(forecast))
        .route(&format!("{base}/product-matrix"), get(product_matrix))
        .route(&format!("{base}/alerts"), get(alerts))
        .route(&format!("{base}/insights"), get(insights))
        .route(&format!("{base}/summary"), get(summary))
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub months: Option<u32>,
}

/// Inclusive calendar dates (UTC).
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl SummaryQuery {
    /// `[from 00:00, to + 1 day 00:00)` in UTC.
    fn window(&self) -> Result<DateWindow, AppError> {
        if matches!((self.from, self.to), (Some(from), Some(to)) if from > to) {
            return Err(AppError::BadRequest("from must not be after to".to_string()));
        }

        let until = match self.to {
            Some(to) => Some(
                to.checked_add_days(Days::new(1))
                    .ok_or_else(|| AppError::BadRequest("to is out of range".to_string()))?,
            ),
            None => None,
        };

        Ok(DateWindow {
            from: self.from.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            until: until.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
        })
    }
}

/// Customer segments.
///
/// # Errors
///
/// 404 for an unknown store.
pub async fn segments(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<CustomerSegments>, AppError> {
    Ok(Json(state.analytics().segments(scope).await?))
}

/// Revenue forecast for `months` (1 to 24, default 3) months.
///
/// # Errors
///
/// 400 for a horizon out of range, 404 for an unknown store.
pub async fn forecast(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
    ApiQuery(query): ApiQuery<ForecastQuery>,
) -> Result<Json<RevenueForecast>, AppError> {
    let months = query.months.unwrap_or(DEFAULT_FORECAST_MONTHS);
    if !(1..=MAX_FORECAST_MONTHS).contains(&months) {
        return Err(AppError::BadRequest(format!(
            "months must be between 1 and {MAX_FORECAST_MONTHS}"
        )));
    }
    Ok(Json(state.analytics().forecast(scope, months).await?))
}

/// Product performance matrix.
///
/// # Errors
///
/// 404 for an unknown store.
pub async fn product_matrix(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<ProductMatrix>, AppError> {
    Ok(Json(state.analytics().product_matrix(scope).await?))
}

/// Business alerts, most severe first.
///
/// # Errors
///
/// 404 for an unknown store.
pub async fn alerts(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<BusinessAlerts>, AppError> {
    Ok(Json(state.analytics().alerts(scope).await?))
}

/// Top products, top customers and customer locations.
///
/// # Errors
///
/// 404 for an unknown store.
pub async fn insights(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
) -> Result<Json<StoreInsights>, AppError> {
    Ok(Json(state.analytics().insights(scope).await?))
}

/// Store totals, optionally limited to `from..=to`.
///
/// # Errors
///
/// 400 for an inverted range, 404 for an unknown store.
pub async fn summary(
    State(state): State<AppState>,
    StorePath(scope): StorePath,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<StoreSummary>, AppError> {
    let window = query.window()?;
    Ok(Json(state.analytics().summary(scope, window).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use storepulse_core::{RemoteId, StoreScope, TenantId};

    use super::*;
    use crate::db::StoreRepository;
    use crate::models::Order;
    use crate::routes::test_support::{app, send, store_path};

    fn order(scope: StoreScope, id: &str, total: i64, day: u32) -> Order {
        let at = Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).single().unwrap();
        Order {
            id: RemoteId::from_stored(id),
            scope,
            name: Some(format!("#{id}")),
            customer_id: None,
            total_price: Decimal::from(total),
            subtotal_price: Decimal::from(total),
            total_tax: Decimal::ZERO,
            currency: Some("USD".to_string()),
            financial_status: Some("PAID".to_string()),
            fulfillment_status: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_summary_window_is_inclusive_of_to_date() {
        let query = SummaryQuery {
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            to: NaiveDate::from_ymd_opt(2026, 3, 31),
        };
        let window = query.window().unwrap();

        assert_eq!(
            window.from,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single()
        );
        assert_eq!(
            window.until,
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single()
        );
    }

    #[test]
    fn test_summary_window_rejects_inverted_range() {
        let query = SummaryQuery {
            from: NaiveDate::from_ymd_opt(2026, 3, 2),
            to: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        assert!(matches!(query.window(), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_every_report_serves_an_empty_store() {
        let (router, _, scope) = app().await;

        for report in [
            "segments",
            "forecast",
            "product-matrix",
            "alerts",
            "insights",
            "summary",
        ] {
            let uri = store_path(scope, &format!("/analytics/{report}"));
            let (status, _) = send(&router, Method::GET, &uri).await;
            assert_eq!(status, StatusCode::OK, "{report}");
        }
    }

    #[tokio::test]
    async fn test_forecast_months_bounds() {
        let (router, _, scope) = app().await;

        for (months, expected) in [
            ("0", StatusCode::BAD_REQUEST),
            ("25", StatusCode::BAD_REQUEST),
            ("abc", StatusCode::BAD_REQUEST),
            ("1", StatusCode::OK),
            ("24", StatusCode::OK),
        ] {
            let uri = store_path(scope, &format!("/analytics/forecast?months={months}"));
            let (status, body) = send(&router, Method::GET, &uri).await;
            assert_eq!(status, expected, "months={months}");
            if expected == StatusCode::BAD_REQUEST {
                let message = body["error"].as_str().unwrap();
                assert!(message.starts_with("Bad request: "), "months={months}");
            }
        }
    }

    #[tokio::test]
    async fn test_summary_over_date_range() {
        let (router, repo, scope) = app().await;
        for (id, total, day) in [("1", 100, 2), ("2", 50, 2), ("3", 70, 20)] {
            repo.insert_order(&order(scope, id, total, day)).await.unwrap();
        }

        let uri = store_path(scope, "/analytics/summary?from=2026-03-01&to=2026-03-10");
        let (status, body) = send(&router, Method::GET, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalOrders"], 2);
        assert_eq!(body["totalRevenue"], 150.0);
        assert_eq!(body["daily"][0]["date"], "2026-03-02");
        assert_eq!(body["daily"][0]["ordersCount"], 2);
    }

    #[tokio::test]
    async fn test_summary_rejects_malformed_date() {
        let (router, _, scope) = app().await;

        let uri = store_path(scope, "/analytics/summary?from=yesterday");
        let (status, body) = send(&router, Method::GET, &uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Bad request: "));
    }

    #[tokio::test]
    async fn test_reports_are_tenant_scoped() {
        let (router, _, scope) = app().await;
        let foreign = StoreScope::new(TenantId::new(42), scope.store_id);

        let (status, _) = send(
            &router,
            Method::GET,
            &store_path(foreign, "/analytics/insights"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
