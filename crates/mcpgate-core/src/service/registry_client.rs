//! HTTP client for the public MCP registry.
//!
//! Queries `{base_url}/v0/servers` with cursor-based pagination.

use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use crate::registry::{RegistryEntry, SearchResponse};

/// Public registry base URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.modelcontextprotocol.io";

/// Page size used by [`RegistryClient::search_all`]
const PAGE_SIZE: u32 = 100;

pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("mcpgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of servers matching `query`.
    ///
    /// Network and parse errors are returned to the caller.
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<Vec<RegistryEntry>> {
        let page = self.fetch_page(query, limit, cursor).await?;
        Ok(page.servers.into_iter().map(|s| s.server).collect())
    }

    /// Follow `nextCursor` for up to `max_pages` pages.
    ///
    /// A failing page ends pagination; whatever was collected so far is
    /// returned.
    pub async fn search_all(&self, query: &str, max_pages: usize) -> Vec<RegistryEntry> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 0..max_pages {
            let page = match self.fetch_page(query, PAGE_SIZE, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(page = page_no, error = %e, "[Registry] Pagination failed");
                    break;
                }
            };

            results.extend(page.servers.into_iter().map(|s| s.server));

            match page.metadata.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(count = results.len(), query, "[Registry] search_all complete");
        results
    }

    async fn fetch_page(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchResponse> {
        let url = format!("{}/v0/servers", self.base_url);

        let mut params: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if !query.is_empty() {
            params.push(("search", query.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to registry")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Registry returned status: {}", status);
        }

        response
            .json::<SearchResponse>()
            .await
            .context("Failed to parse registry response")
    }
}
