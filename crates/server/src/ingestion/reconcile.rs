//! Merge fetched records into local storage.
//!
//! Each record is looked up by remote id. New records are inserted with
//! defaults for anything the fetch did not supply; existing records only
//! take the fields present in the fetch. Nothing is transactional across a
//! batch: records processed before a failure stay committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use storepulse_core::{RemoteId, StoreScope};

use crate::db::{RepositoryError, StoreRepository};
use crate::models::{Customer, LineItem, Order, Product};
use crate::shopify::{RemoteCustomer, RemoteLineItem, RemoteOrder, RemoteProduct};

/// A record that failed to persist.
#[derive(Debug, Error)]
#[error("failed to reconcile {entity} {id}: {source}")]
pub struct ReconcileError {
    pub entity: &'static str,
    pub id: RemoteId,
    #[source]
    pub source: RepositoryError,
}

impl ReconcileError {
    fn new(entity: &'static str, id: &RemoteId, source: RepositoryError) -> Self {
        Self {
            entity,
            id: id.clone(),
            source,
        }
    }
}

/// Counts for one reconciled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Nested order lines, inserted or updated.
    pub line_items: usize,
}

impl ReconcileSummary {
    /// Top-level records processed.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.inserted + self.updated
    }

    /// Add another batch's counts.
    pub const fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.line_items += other.line_items;
    }
}

/// Where records are written and when.
#[derive(Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub repo: &'a dyn StoreRepository,
    pub scope: StoreScope,
    /// Fallback for timestamps the fetch did not supply.
    pub now: DateTime<Utc>,
}

/// A fetched record that can be merged into storage.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    /// Persist this record, inserting or updating as needed.
    async fn apply(
        &self,
        ctx: ReconcileContext<'_>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ReconcileError>;
}

/// Reconcile a batch of records, in order.
///
/// # Errors
///
/// Stops at the first record that fails to persist.
#[instrument(skip_all, fields(store_id = %ctx.scope.store_id, tenant_id = %ctx.scope.tenant_id, entity = R::ENTITY, count = records.len()))]
pub async fn reconcile<R: Reconcile>(
    ctx: ReconcileContext<'_>,
    records: &[R],
) -> Result<ReconcileSummary, ReconcileError> {
    let mut summary = ReconcileSummary::default();
    for record in records {
        record.apply(ctx, &mut summary).await?;
    }
    debug!(
        inserted = summary.inserted,
        updated = summary.updated,
        line_items = summary.line_items,
        "Reconciled batch"
    );
    Ok(summary)
}

/// Overwrite `slot` only when the fetch supplied a value.
fn merge<T>(slot: &mut T, value: Option<&T>)
where
    T: Clone,
{
    if let Some(value) = value {
        slot.clone_from(value);
    }
}

/// Like [`merge`] for nullable columns.
fn merge_opt<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
impl Reconcile for RemoteCustomer {
    const ENTITY: &'static str = "customer";

    async fn apply(
        &self,
        ctx: ReconcileContext<'_>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ReconcileError> {
        let fail = |e| ReconcileError::new(Self::ENTITY, &self.id, e);
        let existing = ctx.repo.find_customer(ctx.scope, &self.id).await.map_err(fail)?;
        let updated_at = self.updated_at.unwrap_or(ctx.now);

        if let Some(mut customer) = existing {
            merge_opt(&mut customer.email, self.email.as_ref());
            merge_opt(&mut customer.first_name, self.first_name.as_ref());
            merge_opt(&mut customer.last_name, self.last_name.as_ref());
            merge(&mut customer.orders_count, self.orders_count.as_ref());
            merge(&mut customer.total_spent, self.total_spent.as_ref());
            merge_opt(&mut customer.default_address, self.default_address.as_ref());
            merge(&mut customer.created_at, self.created_at.as_ref());
            customer.updated_at = updated_at;
            ctx.repo.update_customer(&customer).await.map_err(fail)?;
            summary.updated += 1;
        } else {
            let customer = Customer {
                id: self.id.clone(),
                scope: ctx.scope,
                email: self.email.clone(),
                first_name: self.first_name.clone(),
                last_name: self.last_name.clone(),
                orders_count: self.orders_count.unwrap_or(0),
                total_spent: self.total_spent.unwrap_or(Decimal::ZERO),
                default_address: self.default_address.clone(),
                created_at: self.created_at.unwrap_or(ctx.now),
                updated_at,
            };
            ctx.repo.insert_customer(&customer).await.map_err(fail)?;
            summary.inserted += 1;
        }
        Ok(())
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl Reconcile for RemoteProduct {
    const ENTITY: &'static str = "product";

    async fn apply(
        &self,
        ctx: ReconcileContext<'_>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ReconcileError> {
        let fail = |e| ReconcileError::new(Self::ENTITY, &self.id, e);
        let existing = ctx.repo.find_product(ctx.scope, &self.id).await.map_err(fail)?;
        let updated_at = self.updated_at.unwrap_or(ctx.now);

        if let Some(mut product) = existing {
            merge(&mut product.title, self.title.as_ref());
            merge_opt(&mut product.handle, self.handle.as_ref());
            merge_opt(&mut product.price, self.price.as_ref());
            merge_opt(&mut product.sku, self.sku.as_ref());
            merge_opt(&mut product.status, self.status.as_ref());
            merge_opt(&mut product.tags, self.tags.as_ref());
            merge(&mut product.created_at, self.created_at.as_ref());
            product.updated_at = updated_at;
            ctx.repo.update_product(&product).await.map_err(fail)?;
            summary.updated += 1;
        } else {
            let product = Product {
                id: self.id.clone(),
                scope: ctx.scope,
                title: self.title.clone().unwrap_or_default(),
                handle: self.handle.clone(),
                price: self.price,
                sku: self.sku.clone(),
                status: self.status.clone(),
                tags: self.tags.clone(),
                created_at: self.created_at.unwrap_or(ctx.now),
                updated_at,
            };
            ctx.repo.insert_product(&product).await.map_err(fail)?;
            summary.inserted += 1;
        }
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl Reconcile for RemoteOrder {
    const ENTITY: &'static str = "order";

    async fn apply(
        &self,
        ctx: ReconcileContext<'_>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ReconcileError> {
        let fail = |e| ReconcileError::new(Self::ENTITY, &self.id, e);

        // References to customers we have not ingested are dropped.
        let customer_id = match &self.customer_id {
            Some(id) => ctx
                .repo
                .find_customer(ctx.scope, id)
                .await
                .map_err(fail)?
                .map(|customer| customer.id),
            None => None,
        };

        let existing = ctx.repo.find_order(ctx.scope, &self.id).await.map_err(fail)?;
        let updated_at = self.updated_at.unwrap_or(ctx.now);

        let order = if let Some(mut order) = existing {
            merge_opt(&mut order.name, self.name.as_ref());
            if self.customer_id.is_some() {
                order.customer_id = customer_id;
            }
            merge(&mut order.total_price, self.total_price.as_ref());
            merge(&mut order.subtotal_price, self.subtotal_price.as_ref());
            merge(&mut order.total_tax, self.total_tax.as_ref());
            merge_opt(&mut order.currency, self.currency.as_ref());
            merge_opt(&mut order.financial_status, self.financial_status.as_ref());
            merge_opt(&mut order.fulfillment_status, self.fulfillment_status.as_ref());
            merge(&mut order.created_at, self.created_at.as_ref());
            order.updated_at = updated_at;
            ctx.repo.update_order(&order).await.map_err(fail)?;
            summary.updated += 1;
            order
        } else {
            let order = Order {
                id: self.id.clone(),
                scope: ctx.scope,
                name: self.name.clone(),
                customer_id,
                total_price: self.total_price.unwrap_or(Decimal::ZERO),
                subtotal_price: self.subtotal_price.unwrap_or(Decimal::ZERO),
                total_tax: self.total_tax.unwrap_or(Decimal::ZERO),
                currency: self.currency.clone(),
                financial_status: self.financial_status.clone(),
                fulfillment_status: self.fulfillment_status.clone(),
                created_at: self.created_at.unwrap_or(ctx.now),
                updated_at,
            };
            ctx.repo.insert_order(&order).await.map_err(fail)?;
            summary.inserted += 1;
            order
        };

        for (index, line) in self.line_items.iter().enumerate() {
            apply_line_item(ctx, &order, index, line).await?;
            summary.line_items += 1;
        }
        Ok(())
    }
}

/// Stable identity for a line: its remote id, else
/// `order:variant`, `order:sku` or `order:index`.
#[must_use]
pub fn line_item_key(order_id: &RemoteId, index: usize, line: &RemoteLineItem) -> RemoteId {
    if let Some(id) = &line.id {
        return id.clone();
    }
    let discriminator = match (&line.variant_id, &line.sku) {
        (Some(variant), _) => variant.as_str().to_string(),
        (None, Some(sku)) if !sku.is_empty() => sku.clone(),
        _ => index.to_string(),
    };
    RemoteId::composite(order_id, &discriminator)
}

async fn apply_line_item(
    ctx: ReconcileContext<'_>,
    order: &Order,
    index: usize,
    line: &RemoteLineItem,
) -> Result<(), ReconcileError> {
    let id = line_item_key(&order.id, index, line);
    let fail = |e| ReconcileError::new("line item", &id, e);

    let product_id = match &line.product_id {
        Some(product) => ctx
            .repo
            .find_product(ctx.scope, product)
            .await
            .map_err(fail)?
            .map(|product| product.id),
        None => None,
    };

    let existing = ctx.repo.find_line_item(ctx.scope, &id).await.map_err(fail)?;

    if let Some(mut item) = existing {
        if line.product_id.is_some() {
            item.product_id = product_id;
        }
        merge_opt(&mut item.variant_id, line.variant_id.as_ref());
        merge_opt(&mut item.sku, line.sku.as_ref());
        merge_opt(&mut item.title, line.title.as_ref());
        merge(&mut item.quantity, line.quantity.as_ref());
        merge(&mut item.price, line.price.as_ref());
        item.total = Decimal::from(item.quantity) * item.price;
        item.created_at = order.created_at;
        item.updated_at = order.updated_at;
        ctx.repo.update_line_item(&item).await.map_err(fail)?;
    } else {
        let quantity = line.quantity.unwrap_or(0);
        let price = line.price.unwrap_or(Decimal::ZERO);
        let item = LineItem {
            id: id.clone(),
            scope: ctx.scope,
            order_id: order.id.clone(),
            product_id,
            variant_id: line.variant_id.clone(),
            sku: line.sku.clone(),
            title: line.title.clone(),
            quantity,
            price,
            total: line.total().unwrap_or(Decimal::from(quantity) * price),
            created_at: order.created_at,
            updated_at: order.updated_at,
        };
        ctx.repo.insert_line_item(&item).await.map_err(fail)?;
    }
    Ok(())
}
