//! Shopify Admin API client used by the ingestion pipeline.
//!
//! # Architecture
//!
//! - Cursor-paginated GraphQL queries, 250 nodes per page
//! - `graphql_client` envelopes (`QueryBody` / `Response`), HTTP via `reqwest`
//! - Global ids (`gid://shopify/Order/123`) are normalized to [`RemoteId`]s
//!   before anything leaves this module
//! - Any failure aborts the fetch of that entity type; there is no retry here
//!
//! # Example
//!
//! ```rust,ignore
//! use storepulse_server::shopify::{Customers, ShopifyClient};
//!
//! let client = ShopifyClient::new(&credentials, None)?;
//! let customers = client.fetch_all::<Customers>().await?;
//!
//! // Or page by page, reconciling as pages arrive
//! let mut pages = client.stream_pages::<Customers>(2);
//! while let Some(page) = pages.recv().await {
//!     let records = page?;
//! }
//! ```
//!
//! [`RemoteId`]: storepulse_core::RemoteId

mod client;
mod conversions;
pub mod queries;
pub mod types;

pub use client::{Page, ShopifyClient};
pub use queries::{Customers, EntityKind, Orders, Products, RemoteEntity};
pub use types::{RemoteCustomer, RemoteLineItem, RemoteOrder, RemoteProduct};

use thiserror::Error;

/// Errors that can occur when fetching from the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status other than 401/403/429.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A global id did not end in a numeric component.
    #[error("Invalid global id: {0}")]
    InvalidGlobalId(#[from] storepulse_core::RemoteIdError),

    /// The response was well-formed but lacked required data.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Failed to build the HTTP client or endpoint.
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(error: graphql_client::Error) -> Self {
        Self {
            message: error.message,
            locations: error
                .locations
                .unwrap_or_default()
                .into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: i64::from(l.line),
                    column: i64::from(l.column),
                })
                .collect(),
            path: error
                .path
                .unwrap_or_default()
                .into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(key) => serde_json::Value::String(key),
                    graphql_client::PathFragment::Index(index) => serde_json::Value::from(index),
                })
                .collect(),
        }
    }
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field 'foo' doesn't exist".to_string(),
                locations: vec![],
                path: vec![],
            },
            GraphQLError {
                message: "Throttled".to_string(),
                locations: vec![],
                path: vec![],
            },
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field 'foo' doesn't exist; Throttled"
        );
    }

    #[test]
    fn test_status_error_display() {
        let err = ShopifyError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 502: bad gateway");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(2);
        assert_eq!(err.to_string(), "Rate limited, retry after 2 seconds");
    }

    #[test]
    fn test_graphql_client_error_conversion() {
        let raw: graphql_client::Error = serde_json::from_value(serde_json::json!({
            "message": "Invalid cursor",
            "locations": [{ "line": 2, "column": 7 }],
            "path": ["orders", 0]
        }))
        .unwrap_or_else(|_| graphql_client::Error {
            message: String::new(),
            locations: None,
            path: None,
            extensions: None,
        });

        let converted = GraphQLError::from(raw);
        assert_eq!(converted.message, "Invalid cursor");
        assert_eq!(converted.locations.len(), 1);
        assert_eq!(converted.path, vec![serde_json::json!("orders"), serde_json::json!(0)]);
    }
}
