//! Paginating GraphQL client for a single shop.

use std::sync::Arc;
use std::time::Duration;

use graphql_client::{QueryBody, Response};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{Instrument, instrument};
use url::Url;

use crate::models::ShopCredentials;

use super::queries::{Customers, Orders, PAGE_SIZE, Products, RemoteEntity};
use super::types::{PageData, PageVariables, RemoteCustomer, RemoteOrder, RemoteProduct};
use super::{GraphQLError, ShopifyError};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Bytes of an error body kept in `ShopifyError::Status`.
const MAX_ERROR_BODY: usize = 512;
/// Fallback when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// One page of normalized records.
#[derive(Debug)]
pub struct Page<R> {
    pub records: Vec<R>,
    /// Cursor for the following page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Shopify Admin API client bound to one shop's credentials.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    endpoint: String,
    shop_domain: String,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("endpoint", &self.inner.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// Create a client for the shop described by `credentials`.
    ///
    /// `endpoint_override` replaces `https://{shop}` as the base of the
    /// GraphQL endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Configuration` if the shop domain is empty and
    /// `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(
        credentials: &ShopCredentials,
        endpoint_override: Option<&Url>,
    ) -> Result<Self, ShopifyError> {
        let shop_domain = credentials.shop_domain.trim();
        if shop_domain.is_empty() {
            return Err(ShopifyError::Configuration(
                "shop domain cannot be empty".to_string(),
            ));
        }

        let base = endpoint_override.map_or_else(
            || format!("https://{shop_domain}"),
            |url| url.as_str().trim_end_matches('/').to_string(),
        );
        let endpoint = format!("{base}/admin/api/{}/graphql.json", credentials.api_version);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                endpoint,
                shop_domain: shop_domain.to_string(),
                access_token: credentials.access_token.clone(),
            }),
        })
    }

    /// The GraphQL endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Fetch a single page of `E`, starting after `after`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, a GraphQL
    /// `errors` payload, a malformed body, or an id that cannot be normalized.
    #[instrument(skip(self), fields(shop = %self.inner.shop_domain, entity = %E::KIND))]
    pub async fn fetch_page<E: RemoteEntity>(
        &self,
        after: Option<String>,
    ) -> Result<Page<E::Record>, ShopifyError> {
        let previous = after.clone();
        let body = QueryBody {
            variables: PageVariables {
                first: PAGE_SIZE,
                after,
            },
            query: E::QUERY,
            operation_name: E::OPERATION_NAME,
        };

        let data: PageData<E::Node> = self.execute(&body).await?;
        let connection = data.connection;

        let next_cursor = if connection.page_info.has_next_page {
            let cursor = connection.page_info.end_cursor.ok_or_else(|| {
                ShopifyError::MissingData("hasNextPage is true but endCursor is null".to_string())
            })?;
            if previous.as_deref() == Some(cursor.as_str()) {
                return Err(ShopifyError::MissingData(format!(
                    "cursor did not advance past {cursor}"
                )));
            }
            Some(cursor)
        } else {
            None
        };

        let records = connection
            .edges
            .into_iter()
            .map(|edge| E::convert(edge.node))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            records,
            next_cursor,
        })
    }

    /// Fetch every page of `E` into memory, in page order.
    ///
    /// # Errors
    ///
    /// The first failing page aborts the whole fetch; see [`Self::fetch_page`].
    #[instrument(skip(self), fields(shop = %self.inner.shop_domain, entity = %E::KIND))]
    pub async fn fetch_all<E: RemoteEntity>(&self) -> Result<Vec<E::Record>, ShopifyError> {
        let mut records = Vec::new();
        let mut after = None;
        let mut page_number = 0_usize;

        loop {
            page_number += 1;
            let page = self.fetch_page::<E>(after.take()).await?;
            tracing::debug!(page = page_number, count = page.records.len(), "Fetched page");
            records.extend(page.records);

            match page.next_cursor {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        tracing::info!(pages = page_number, count = records.len(), "Fetched all pages");
        Ok(records)
    }

    /// Stream pages of `E` through a bounded channel.
    ///
    /// A spawned task fetches pages ahead of the consumer, at most `capacity`
    /// pages at a time. The first error is sent on the channel and ends the
    /// stream; dropping the receiver stops the producer.
    #[must_use]
    pub fn stream_pages<E: RemoteEntity>(
        &self,
        capacity: usize,
    ) -> mpsc::Receiver<Result<Vec<E::Record>, ShopifyError>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = self.clone();
        let span = tracing::info_span!(
            "stream_pages",
            shop = %self.inner.shop_domain,
            entity = %E::KIND,
        );

        tokio::spawn(
            async move {
                let mut after = None;
                let mut page_number = 0_usize;
                loop {
                    page_number += 1;
                    match client.fetch_page::<E>(after.take()).await {
                        Ok(page) => {
                            tracing::debug!(page = page_number, count = page.records.len(), "Fetched page");
                            if tx.send(Ok(page.records)).await.is_err() {
                                tracing::debug!("Page consumer went away, stopping");
                                break;
                            }
                            match page.next_cursor {
                                Some(cursor) => after = Some(cursor),
                                None => break,
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                    }
                }
            }
            .instrument(span),
        );

        rx
    }

    /// Fetch all customers.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_all`].
    pub async fn fetch_customers(&self) -> Result<Vec<RemoteCustomer>, ShopifyError> {
        self.fetch_all::<Customers>().await
    }

    /// Fetch all products.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_all`].
    pub async fn fetch_products(&self) -> Result<Vec<RemoteProduct>, ShopifyError> {
        self.fetch_all::<Products>().await
    }

    /// Fetch all orders with their line items.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_all`].
    pub async fn fetch_orders(&self) -> Result<Vec<RemoteOrder>, ShopifyError> {
        self.fetch_all::<Orders>().await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn execute<V, T>(&self, body: &QueryBody<V>) -> Result<T, ShopifyError>
    where
        V: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(self.endpoint())
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_secs(response.headers());
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ShopifyError::Unauthorized(
                "Invalid or revoked access token".to_string(),
            ));
        }

        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| text.is_char_boundary(*i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            return Err(ShopifyError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: Response<T> = serde_json::from_slice(&bytes)?;

        // Check for GraphQL errors
        if let Some(errors) = envelope.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ShopifyError::MissingData("no data in response".to_string()))
    }
}

/// Seconds to wait according to `Retry-After` (Shopify sends e.g. `2.0`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(DEFAULT_RETRY_AFTER_SECS, |secs| secs.ceil() as u64)
}
