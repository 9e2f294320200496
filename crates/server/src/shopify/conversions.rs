//! Conversions from wire nodes to normalized remote records.

use rust_decimal::Decimal;

use storepulse_core::{RemoteId, parse_amount};

use super::ShopifyError;
use super::types::{
    CustomerNode, LineItemNode, MoneyBag, MoneyV2, OrderNode, ProductNode, RemoteCustomer,
    RemoteLineItem, RemoteOrder, RemoteProduct,
};

pub fn convert_customer(node: CustomerNode) -> Result<RemoteCustomer, ShopifyError> {
    let id = RemoteId::from_global_id(&node.id)?;

    let orders_count = node.number_of_orders.as_ref().and_then(count_from_json);
    let total_spent = node.amount_spent.as_ref().and_then(|m| amount(&m.amount));
    let default_address = node
        .default_address
        .map(|address| address.formatted.join(", "))
        .filter(|line| !line.trim().is_empty());

    Ok(RemoteCustomer {
        id,
        email: node.email,
        first_name: node.first_name,
        last_name: node.last_name,
        orders_count,
        total_spent,
        default_address,
        created_at: node.created_at,
        updated_at: node.updated_at,
    })
}

pub fn convert_product(node: ProductNode) -> Result<RemoteProduct, ShopifyError> {
    let id = RemoteId::from_global_id(&node.id)?;

    let first_variant = node
        .variants
        .and_then(|variants| variants.edges.into_iter().next())
        .map(|edge| edge.node);
    let (price, sku) = first_variant.map_or((None, None), |variant| {
        (variant.price.as_deref().and_then(amount), variant.sku)
    });

    Ok(RemoteProduct {
        id,
        title: node.title,
        handle: node.handle,
        status: node.status,
        tags: node.tags.map(|tags| tags.join(",")),
        price,
        sku: sku.filter(|s| !s.is_empty()),
        created_at: node.created_at,
        updated_at: node.updated_at,
    })
}

pub fn convert_order(node: OrderNode) -> Result<RemoteOrder, ShopifyError> {
    let id = RemoteId::from_global_id(&node.id)?;
    let customer_id = node
        .customer
        .map(|c| RemoteId::from_global_id(&c.id))
        .transpose()?;

    let currency = node
        .total_price_set
        .as_ref()
        .and_then(|m| m.shop_money.currency_code.clone());

    let line_items = match node.line_items {
        Some(connection) => {
            if connection.page_info.has_next_page {
                tracing::warn!(order_id = %id, "Order has more than one page of line items; extra lines skipped");
            }
            connection
                .edges
                .into_iter()
                .map(|edge| convert_line_item(edge.node))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    Ok(RemoteOrder {
        id,
        name: node.name,
        customer_id,
        total_price: money_bag_amount(node.total_price_set.as_ref()),
        subtotal_price: money_bag_amount(node.subtotal_price_set.as_ref()),
        total_tax: money_bag_amount(node.total_tax_set.as_ref()),
        currency,
        financial_status: node.display_financial_status,
        fulfillment_status: node.display_fulfillment_status,
        created_at: node.created_at,
        updated_at: node.updated_at,
        line_items,
    })
}

fn convert_line_item(node: LineItemNode) -> Result<RemoteLineItem, ShopifyError> {
    let id = node.id.as_deref().map(RemoteId::from_global_id).transpose()?;
    let product_id = node
        .product
        .map(|p| RemoteId::from_global_id(&p.id))
        .transpose()?;
    let (variant_id, sku) = match node.variant {
        Some(variant) => (
            Some(RemoteId::from_global_id(&variant.id)?),
            variant.sku.filter(|s| !s.is_empty()),
        ),
        None => (None, None),
    };

    Ok(RemoteLineItem {
        id,
        title: node.title,
        quantity: node.quantity.map(|q| q.max(0)),
        price: money_bag_amount(node.original_unit_price_set.as_ref()),
        product_id,
        variant_id,
        sku,
    })
}

fn money_bag_amount(bag: Option<&MoneyBag>) -> Option<Decimal> {
    bag.map(|b| &b.shop_money).and_then(|m: &MoneyV2| amount(&m.amount))
}

/// Parse an amount, treating malformed values as absent.
fn amount(raw: &str) -> Option<Decimal> {
    match parse_amount(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed amount");
            None
        }
    }
}

/// Counts are `UnsignedInt64` upstream and may arrive as strings.
fn count_from_json(value: &serde_json::Value) -> Option<i32> {
    let count = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }?;
    Some(i32::try_from(count).unwrap_or(i32::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_customer_normalizes_ids_and_amounts() {
        let node: CustomerNode = serde_json::from_value(json!({
            "id": "gid://shopify/Customer/123",
            "email": "ada@example.com",
            "firstName": "Ada",
            "lastName": null,
            "numberOfOrders": "4",
            "amountSpent": { "amount": "250.50", "currencyCode": "USD" },
            "defaultAddress": { "formatted": ["1 Main St", "Springfield", "US"] },
            "createdAt": "2026-01-02T03:04:05Z",
            "updatedAt": "2026-02-02T03:04:05Z"
        }))
        .unwrap();

        let customer = convert_customer(node).unwrap();
        assert_eq!(customer.id.as_str(), "123");
        assert_eq!(customer.orders_count, Some(4));
        assert_eq!(customer.total_spent, Some(Decimal::new(25050, 2)));
        assert_eq!(customer.default_address.as_deref(), Some("1 Main St, Springfield, US"));
        assert_eq!(customer.last_name, None);
    }

    #[test]
    fn test_convert_product_takes_first_variant() {
        let node: ProductNode = serde_json::from_value(json!({
            "id": "gid://shopify/Product/9",
            "title": "Mug",
            "handle": "mug",
            "status": "ACTIVE",
            "tags": ["kitchen", "gift"],
            "variants": {
                "edges": [{ "node": { "id": "gid://shopify/ProductVariant/91", "price": "12.00", "sku": "MUG-1" } }],
                "pageInfo": { "hasNextPage": true, "endCursor": "abc" }
            }
        }))
        .unwrap();

        let product = convert_product(node).unwrap();
        assert_eq!(product.id.as_str(), "9");
        assert_eq!(product.tags.as_deref(), Some("kitchen,gift"));
        assert_eq!(product.price, Some(Decimal::from(12)));
        assert_eq!(product.sku.as_deref(), Some("MUG-1"));
        assert_eq!(product.created_at, None);
    }

    #[test]
    fn test_convert_order_with_guest_and_line_items() {
        let node: OrderNode = serde_json::from_value(json!({
            "id": "gid://shopify/Order/5001",
            "name": "#1001",
            "createdAt": "2026-03-01T10:00:00Z",
            "totalPriceSet": { "shopMoney": { "amount": "30.00", "currencyCode": "EUR" } },
            "subtotalPriceSet": { "shopMoney": { "amount": "25.00", "currencyCode": "EUR" } },
            "totalTaxSet": { "shopMoney": { "amount": "5.00", "currencyCode": "EUR" } },
            "customer": null,
            "lineItems": {
                "edges": [
                    { "node": {
                        "id": "gid://shopify/LineItem/77",
                        "title": "Mug",
                        "quantity": 2,
                        "originalUnitPriceSet": { "shopMoney": { "amount": "12.50" } },
                        "product": { "id": "gid://shopify/Product/9" },
                        "variant": { "id": "gid://shopify/ProductVariant/91", "sku": "" }
                    } },
                    { "node": { "title": "Gift wrap", "quantity": 1, "product": null, "variant": null } }
                ],
                "pageInfo": { "hasNextPage": false, "endCursor": null }
            }
        }))
        .unwrap();

        let order = convert_order(node).unwrap();
        assert_eq!(order.id.as_str(), "5001");
        assert_eq!(order.customer_id, None);
        assert_eq!(order.currency.as_deref(), Some("EUR"));
        assert_eq!(order.total_price, Some(Decimal::from(30)));
        assert_eq!(order.line_items.len(), 2);

        let first = &order.line_items[0];
        assert_eq!(first.id.as_ref().map(RemoteId::as_str), Some("77"));
        assert_eq!(first.product_id.as_ref().map(RemoteId::as_str), Some("9"));
        assert_eq!(first.sku, None);
        assert_eq!(first.total(), Some(Decimal::from(25)));

        let second = &order.line_items[1];
        assert_eq!(second.id, None);
        assert_eq!(second.price, None);
        assert_eq!(second.total(), None);
    }

    #[test]
    fn test_bad_global_id_is_an_error() {
        let node: OrderNode = serde_json::from_value(json!({
            "id": "gid://shopify/Order/not-a-number"
        }))
        .unwrap();
        assert!(matches!(
            convert_order(node),
            Err(ShopifyError::InvalidGlobalId(_))
        ));
    }

    #[test]
    fn test_count_from_json() {
        assert_eq!(count_from_json(&json!(3)), Some(3));
        assert_eq!(count_from_json(&json!("12")), Some(12));
        assert_eq!(count_from_json(&json!(null)), None);
    }
}
