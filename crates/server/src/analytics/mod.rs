//! Analytics over a store's ingested data.
//!
//! Each report is a pure `compute_*` function over already-loaded rows plus
//! an explicit `now`, so it can be tested without storage or a clock.
//! [`AnalyticsService`] loads the rows for a store and calls them.
//!
//! Money is summed as `Decimal` and converted to `f64` only for output.

pub mod alerts;
pub mod forecast;
pub mod insights;
pub mod matrix;
pub mod segments;
pub mod summary;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, instrument};

use storepulse_core::StoreScope;

use crate::db::{RepositoryError, StoreRepository};
use crate::models::{DateWindow, Store};

pub use alerts::{Alert, AlertCategory, AlertInputs, AlertType, BusinessAlerts, compute_alerts};
pub use forecast::{
    DEFAULT_FORECAST_MONTHS, ForecastPoint, MAX_FORECAST_MONTHS, MonthlyRevenue, RevenueForecast,
    Trend, compute_forecast,
};
pub use insights::{
    LocationStats, StoreInsights, TopCustomer, TopProduct, compute_insights, customer_locations,
    top_customers, top_products,
};
pub use matrix::{ProductMatrix, ProductPerformance, Quadrant, compute_matrix};
pub use segments::{CustomerSegments, CustomerSummary, Segment, compute_segments};
pub use summary::{DailyTotals, StoreSummary, compute_summary};

/// Days in the alert comparison windows.
const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

/// Errors from [`AnalyticsService`].
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The store does not exist or belongs to another tenant.
    #[error("store not found: {0}")]
    StoreNotFound(StoreScope),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// `days` days before `now`.
pub(crate) fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Element at index `len / 2` of the sorted values; 0 when empty.
pub(crate) fn upper_median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.get(sorted.len() / 2).copied().unwrap_or(0.0)
}

/// Reports for one store at a time.
#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<dyn StoreRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(repo: Arc<dyn StoreRepository>) -> Self {
        Self { repo }
    }

    async fn load_store(&self, scope: StoreScope) -> Result<Store, AnalyticsError> {
        self.repo
            .get_store(scope.store_id)
            .await?
            .filter(|store| store.tenant_id == scope.tenant_id)
            .ok_or(AnalyticsError::StoreNotFound(scope))
    }

    /// Customer segments.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn segments(&self, scope: StoreScope) -> Result<CustomerSegments, AnalyticsError> {
        self.load_store(scope).await?;
        let customers = self.repo.list_customers(scope).await?;
        let orders = self.repo.list_orders(scope, DateWindow::ALL).await?;
        debug!(customers = customers.len(), orders = orders.len(), "Computing segments");

        Ok(compute_segments(&customers, &orders, Utc::now()))
    }

    /// Revenue forecast for the next `months` months.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn forecast(
        &self,
        scope: StoreScope,
        months: u32,
    ) -> Result<RevenueForecast, AnalyticsError> {
        self.load_store(scope).await?;
        let now = Utc::now();
        let window = DateWindow::since(forecast::history_start(now, months));
        let orders = self.repo.list_orders(scope, window).await?;
        debug!(orders = orders.len(), "Computing forecast");

        Ok(compute_forecast(&orders, months, now))
    }

    /// Product performance matrix over the last two 30-day periods.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn product_matrix(&self, scope: StoreScope) -> Result<ProductMatrix, AnalyticsError> {
        self.load_store(scope).await?;
        let (recent, older) = matrix::periods(Utc::now());
        let products = self.repo.list_products(scope).await?;
        let recent = self.repo.product_sales(scope, recent).await?;
        let older = self.repo.product_sales(scope, older).await?;

        Ok(compute_matrix(&products, &recent, &older))
    }

    /// Business alerts.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn alerts(&self, scope: StoreScope) -> Result<BusinessAlerts, AnalyticsError> {
        self.load_store(scope).await?;
        let now = Utc::now();
        let week_start = days_before(now, WEEK_DAYS);
        let this_week = DateWindow::since(week_start);
        let last_week = DateWindow::between(days_before(now, 2 * WEEK_DAYS), week_start);
        let this_month = DateWindow::since(days_before(now, MONTH_DAYS));

        let week_revenue = self.repo.order_revenue(scope, this_week).await?;
        let previous_week_revenue = self.repo.order_revenue(scope, last_week).await?;
        let week_sales = self.repo.product_sales(scope, this_week).await?;
        let month_sales = self.repo.product_sales(scope, this_month).await?;
        let products = self.repo.list_products(scope).await?;
        let orders = self.repo.list_orders(scope, DateWindow::ALL).await?;

        let alerts = compute_alerts(
            AlertInputs {
                week_revenue,
                previous_week_revenue,
                week_sales: &week_sales,
                month_sales: &month_sales,
                products: &products,
                orders: &orders,
            },
            now,
        );
        debug!(alerts = alerts.alert_count, critical = alerts.critical_count, "Computed alerts");
        Ok(alerts)
    }

    /// Top products, top customers and customer locations.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn insights(&self, scope: StoreScope) -> Result<StoreInsights, AnalyticsError> {
        self.load_store(scope).await?;
        let sales = self.repo.product_sales(scope, DateWindow::ALL).await?;
        let products = self.repo.list_products(scope).await?;
        let orders = self.repo.list_orders(scope, DateWindow::ALL).await?;
        let customers = self.repo.list_customers(scope).await?;

        Ok(compute_insights(&sales, &products, &orders, &customers))
    }

    /// Totals over `window`.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when the store is unknown to the tenant.
    #[instrument(skip(self), fields(store_id = %scope.store_id, tenant_id = %scope.tenant_id))]
    pub async fn summary(
        &self,
        scope: StoreScope,
        window: DateWindow,
    ) -> Result<StoreSummary, AnalyticsError> {
        self.load_store(scope).await?;
        let customers = self.repo.list_customers(scope).await?;
        let orders = self.repo.list_orders(scope, window).await?;
        let products = self.repo.list_products(scope).await?;

        Ok(compute_summary(&customers, &orders, products.len(), window))
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use storepulse_core::{StoreId, TenantId};

    use super::*;
    use crate::db::MemoryStoreRepository;
    use crate::models::{LineItem, NewStore};

    #[test]
    fn test_upper_median() {
        assert!((upper_median(&[3.0, 1.0, 2.0, 4.0]) - 3.0).abs() < f64::EPSILON);
        assert!((upper_median(&[5.0]) - 5.0).abs() < f64::EPSILON);
        assert!(upper_median(&[]).abs() < f64::EPSILON);
    }

    async fn seeded() -> (Arc<MemoryStoreRepository>, StoreScope) {
        let repo = Arc::new(MemoryStoreRepository::new());
        let store = repo
            .create_store(NewStore {
                tenant_id: TenantId::new(7),
                name: "Acme".to_string(),
                shop_domain: "acme.myshopify.com".to_string(),
            })
            .await
            .unwrap();
        (repo, store.scope())
    }

    #[tokio::test]
    async fn test_wrong_tenant_is_not_found() {
        let (repo, scope) = seeded().await;
        let service = AnalyticsService::new(repo);
        let foreign = StoreScope::new(TenantId::new(8), scope.store_id);

        let err = service.segments(foreign).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::StoreNotFound(s) if s == foreign));

        let missing = StoreScope::new(scope.tenant_id, StoreId::new(999));
        assert!(matches!(
            service.summary(missing, DateWindow::ALL).await,
            Err(AnalyticsError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reports_over_stored_rows() {
        let (repo, scope) = seeded().await;
        let now = Utc::now();

        let mut customer = fixtures::customer("c1");
        customer.scope = scope;
        customer.created_at = now;
        repo.insert_customer(&customer).await.unwrap();

        let mut product = fixtures::product("p1", "Mug");
        product.scope = scope;
        repo.insert_product(&product).await.unwrap();

        let mut order = fixtures::order("o1", Some("c1"), 30, days_before(now, 2));
        order.scope = scope;
        repo.insert_order(&order).await.unwrap();
        repo.insert_line_item(&LineItem {
            id: fixtures::rid("l1"),
            scope,
            order_id: order.id.clone(),
            product_id: Some(product.id.clone()),
            variant_id: None,
            sku: None,
            title: Some("Mug".to_string()),
            quantity: 3,
            price: Decimal::TEN,
            total: Decimal::from(30),
            created_at: order.created_at,
            updated_at: order.created_at,
        })
        .await
        .unwrap();

        let service = AnalyticsService::new(repo);

        let insights = service.insights(scope).await.unwrap();
        assert_eq!(insights.top_products.len(), 1);
        assert_eq!(insights.top_products[0].total_quantity_sold, 3);
        assert_eq!(insights.top_customers[0].name, "Customerc1");

        let summary = service.summary(scope, DateWindow::ALL).await.unwrap();
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.total_products, 1);

        let matrix = service.product_matrix(scope).await.unwrap();
        assert_eq!(matrix.stars.count, 1);

        let alerts = service.alerts(scope).await.unwrap();
        let trending = alerts
            .alerts
            .iter()
            .find(|a| a.kind == AlertType::Info)
            .unwrap();
        assert_eq!(trending.message, "\"Mug\" sold 3 units this week");

        let forecast = service.forecast(scope, 3).await.unwrap();
        assert_eq!(forecast.trend, Trend::InsufficientData);
    }
}
