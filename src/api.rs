//! REST client for the tracker data API
//!
//! [`CollectionSource`] is the only seam through which the class helper
//! touches the network. [`RestClient`] is the reqwest-backed implementation;
//! tests swap in [`crate::memory::StaticSource`].

use std::time::Duration;

use async_trait::async_trait;
use classhelper_types::{display_value, CollectionEnvelope, Record};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::ClassHelperConfig;
use crate::error::{ClassHelperError, Result};

/// Fetches JSON documents from the tracker.
///
/// URLs are passed as strings so hypermedia links are requested exactly as
/// the server wrote them.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// GET `url` and decode the body as JSON.
    ///
    /// Transport failures and non-2xx statuses are `Network` errors; a body
    /// that is not JSON is a `ResponseFormat` error.
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// reqwest-backed [`CollectionSource`].
#[derive(Clone)]
pub struct RestClient {
    http: Client,
}

impl RestClient {
    pub fn new(config: &ClassHelperConfig) -> Result<Self> {
        Self::with_timeout(config.request_timeout)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ClassHelperError::Environment(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { http })
    }

    /// Use a preconfigured client, e.g. one carrying session cookies.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CollectionSource for RestClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ClassHelperError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassHelperError::network(url, format!("HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClassHelperError::network(url, e))?;

        serde_json::from_str(&text).map_err(|e| ClassHelperError::response_format(url, e))
    }
}

// ============================================================================
// PAGE RESULTS
// ============================================================================

/// One fetched page of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub rows: Vec<Record>,
    pub previous_page_uri: Option<String>,
    pub next_page_uri: Option<String>,
    pub self_page_uri: Option<String>,
    pub total_size: Option<u64>,
}

impl PageResult {
    pub fn from_envelope(envelope: CollectionEnvelope) -> Self {
        let links = &envelope.data.links;
        Self {
            previous_page_uri: links.prev_uri().map(str::to_string),
            next_page_uri: links.next_uri().map(str::to_string),
            self_page_uri: links.self_uri().map(str::to_string),
            total_size: envelope.data.total_size,
            rows: envelope.data.collection,
        }
    }

    /// Display text of `field` in `row`; absent fields are empty.
    pub fn cell(row: &Record, field: &str) -> String {
        row.get(field).map(display_value).unwrap_or_default()
    }
}

/// Fetch and decode one collection page.
pub async fn fetch_page(source: &dyn CollectionSource, url: &str) -> Result<PageResult> {
    let body = source.get_json(url).await?;
    let envelope: CollectionEnvelope = serde_json::from_value(body)
        .map_err(|e| ClassHelperError::response_format(url, e))?;
    Ok(PageResult::from_envelope(envelope))
}
