//! Search-and-download capability
//!
//! A query is resolved through a JSON search endpoint; every hit is then
//! downloaded. Hits that fail to download are reported in the batch without
//! failing the query.

use std::time::Duration;

use contracts::{ContractError, FetchBatch, FetchConfig, Fetcher, Query, SearchConfig};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::http::{build_client, download, map_reqwest_error};

/// Resolves a query into download URLs, then downloads each of them
#[derive(Debug, Clone)]
pub struct SearchFetcher {
    client: Client,
    search: SearchConfig,
}

impl SearchFetcher {
    /// # Errors
    /// `PipelineStartup` if the HTTP client can not be built
    pub fn new(fetch: &FetchConfig, search: SearchConfig) -> Result<Self, ContractError> {
        Ok(Self {
            client: build_client(fetch)?,
            search,
        })
    }

    fn search_url(&self, query: &Query) -> Result<Url, ContractError> {
        Url::parse_with_params(
            &self.search.endpoint,
            &[("page", self.search.page.to_string()), ("query", query.to_string())],
        )
        .map_err(|e| ContractError::malformed(query.as_str(), format!("bad search URL: {e}")))
    }

    /// Run the search call and extract the download URLs
    async fn resolve(
        &self,
        query: &Query,
        timeout: Duration,
    ) -> Result<Vec<Option<String>>, ContractError> {
        let url = self.search_url(query)?;
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(key) = &self.search.api_key {
            request = request.header(AUTHORIZATION, format!("Client-ID {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(query.as_str(), timeout, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ContractError::transient(
                query.as_str(),
                Some(status.as_u16()),
                format!("search returned {status}"),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            ContractError::malformed(query.as_str(), format!("invalid search JSON: {e}"))
        })?;

        extract_urls(&body, &self.search.results_pointer, &self.search.url_pointer)
            .map_err(|message| ContractError::malformed(query.as_str(), message))
    }
}

impl Fetcher<Query> for SearchFetcher {
    async fn fetch(&self, item: &Query, timeout: Duration) -> Result<FetchBatch, ContractError> {
        let mut hits = self.resolve(item, timeout).await?;
        if let Some(max) = self.search.max_results {
            hits.truncate(max);
        }
        debug!(query = %item, hits = hits.len(), "search resolved");

        let mut batch = FetchBatch::default();
        for (idx, hit) in hits.into_iter().enumerate() {
            let Some(url) = hit else {
                batch.failures.push(ContractError::malformed(
                    format!("{item}[{idx}]"),
                    format!("no download URL at '{}'", self.search.url_pointer),
                ));
                continue;
            };
            match download(&self.client, &url, timeout).await {
                Ok(resource) => batch.resources.push(resource),
                Err(e) => {
                    warn!(query = %item, url = %url, error = %e, "download failed");
                    batch.failures.push(e);
                }
            }
        }
        Ok(batch)
    }
}

/// Pull `url_pointer` out of every entry found at `results_pointer`.
///
/// Entries without a string at `url_pointer` yield `None`.
fn extract_urls(
    body: &Value,
    results_pointer: &str,
    url_pointer: &str,
) -> Result<Vec<Option<String>>, String> {
    let results = body
        .pointer(results_pointer)
        .ok_or_else(|| format!("missing '{results_pointer}' in search response"))?
        .as_array()
        .ok_or_else(|| format!("'{results_pointer}' is not an array"))?;

    Ok(results
        .iter()
        .map(|entry| {
            entry
                .pointer(url_pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect())
}
