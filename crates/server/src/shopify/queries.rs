//! Paginated GraphQL queries, one per ingested entity type.
//!
//! Each entity is a marker type implementing [`RemoteEntity`], which ties a
//! query document to its node type and the normalized record it produces.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ShopifyError;
use super::conversions::{convert_customer, convert_order, convert_product};
use super::types::{CustomerNode, OrderNode, ProductNode, RemoteCustomer, RemoteOrder, RemoteProduct};

/// Nodes requested per page.
pub const PAGE_SIZE: i32 = 250;

/// The three entity types a sync fetches, in fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customers,
    Products,
    Orders,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
        })
    }
}

/// An entity type that can be fetched page by page.
pub trait RemoteEntity: Send + 'static {
    /// Node type as it appears on the wire.
    type Node: DeserializeOwned + Send + 'static;
    /// Normalized record handed to the reconciler.
    type Record: Send + 'static;

    const KIND: EntityKind;
    const OPERATION_NAME: &'static str;
    const QUERY: &'static str;

    /// Normalize one node.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::InvalidGlobalId` if an id cannot be normalized.
    fn convert(node: Self::Node) -> Result<Self::Record, ShopifyError>;
}

/// Marker for the customers query.
#[derive(Debug, Clone, Copy)]
pub struct Customers;

/// Marker for the products query.
#[derive(Debug, Clone, Copy)]
pub struct Products;

/// Marker for the orders query.
#[derive(Debug, Clone, Copy)]
pub struct Orders;

impl RemoteEntity for Customers {
    type Node = CustomerNode;
    type Record = RemoteCustomer;

    const KIND: EntityKind = EntityKind::Customers;
    const OPERATION_NAME: &'static str = "SyncCustomers";
    const QUERY: &'static str = r"
query SyncCustomers($first: Int!, $after: String) {
  customers(first: $first, after: $after) {
    edges {
      node {
        id
        email
        firstName
        lastName
        numberOfOrders
        amountSpent { amount currencyCode }
        defaultAddress { formatted }
        createdAt
        updatedAt
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
";

    fn convert(node: CustomerNode) -> Result<RemoteCustomer, ShopifyError> {
        convert_customer(node)
    }
}

impl RemoteEntity for Products {
    type Node = ProductNode;
    type Record = RemoteProduct;

    const KIND: EntityKind = EntityKind::Products;
    const OPERATION_NAME: &'static str = "SyncProducts";
    const QUERY: &'static str = r"
query SyncProducts($first: Int!, $after: String) {
  products(first: $first, after: $after) {
    edges {
      node {
        id
        title
        handle
        status
        tags
        createdAt
        updatedAt
        variants(first: 1) {
          edges { node { id price sku } }
          pageInfo { hasNextPage endCursor }
        }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
";

    fn convert(node: ProductNode) -> Result<RemoteProduct, ShopifyError> {
        convert_product(node)
    }
}

impl RemoteEntity for Orders {
    type Node = OrderNode;
    type Record = RemoteOrder;

    const KIND: EntityKind = EntityKind::Orders;
    const OPERATION_NAME: &'static str = "SyncOrders";
    const QUERY: &'static str = r"
query SyncOrders($first: Int!, $after: String) {
  orders(first: $first, after: $after) {
    edges {
      node {
        id
        name
        createdAt
        updatedAt
        totalPriceSet { shopMoney { amount currencyCode } }
        subtotalPriceSet { shopMoney { amount currencyCode } }
        totalTaxSet { shopMoney { amount currencyCode } }
        displayFinancialStatus
        displayFulfillmentStatus
        customer { id }
        lineItems(first: 250) {
          edges {
            node {
              id
              title
              quantity
              originalUnitPriceSet { shopMoney { amount currencyCode } }
              product { id }
              variant { id sku }
            }
          }
          pageInfo { hasNextPage endCursor }
        }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
";

    fn convert(node: OrderNode) -> Result<RemoteOrder, ShopifyError> {
        convert_order(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_are_named_after_operation() {
        for (query, operation) in [
            (Customers::QUERY, Customers::OPERATION_NAME),
            (Products::QUERY, Products::OPERATION_NAME),
            (Orders::QUERY, Orders::OPERATION_NAME),
        ] {
            assert!(query.contains(&format!("query {operation}(")));
            assert!(query.contains("pageInfo { hasNextPage endCursor }"));
        }
    }

    #[test]
    fn test_entity_kind_display() {
        assert_eq!(EntityKind::Customers.to_string(), "customers");
        assert_eq!(
            serde_json::to_string(&EntityKind::Orders).unwrap_or_default(),
            "\"orders\""
        );
    }
}
