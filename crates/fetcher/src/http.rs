//! HTTP download capability

use std::time::Duration;

use contracts::{ContractError, FetchBatch, FetchConfig, Fetcher, Resource};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// Downloads one URL per work item
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool
    ///
    /// # Errors
    /// `PipelineStartup` if the HTTP client can not be built
    pub fn new(config: &FetchConfig) -> Result<Self, ContractError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Build a fetcher on top of an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher<Url> for HttpFetcher {
    async fn fetch(&self, item: &Url, timeout: Duration) -> Result<FetchBatch, ContractError> {
        let resource = download(&self.client, item.as_str(), timeout).await?;
        Ok(FetchBatch::single(resource))
    }
}

pub(crate) fn build_client(config: &FetchConfig) -> Result<Client, ContractError> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(config.timeout())
        .build()
        .map_err(|e| ContractError::startup("fetch", format!("failed to build HTTP client: {e}")))
}

/// GET `url` and read the whole body, bounded by `timeout`
#[instrument(name = "http_download", skip(client, timeout), level = "debug")]
pub(crate) async fn download(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Resource, ContractError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_reqwest_error(url, timeout, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ContractError::transient(
            url,
            Some(status.as_u16()),
            format!("unexpected status {status}"),
        ));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let content = response
        .bytes()
        .await
        .map_err(|e| map_reqwest_error(url, timeout, e))?;

    debug!(size = content.len(), ?content_type, "download complete");

    Ok(Resource {
        identity: url.to_string(),
        content,
        content_type,
    })
}

pub(crate) fn map_reqwest_error(
    item: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> ContractError {
    if err.is_timeout() {
        ContractError::Timeout {
            item: item.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        ContractError::malformed(item, err.to_string())
    } else {
        ContractError::transient(item, err.status().map(|s| s.as_u16()), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_download_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/id/7/400/600"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/id/7/400/600", server.uri())).unwrap();
        let batch = fetcher().fetch(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(batch.resources.len(), 1);
        let resource = &batch.resources[0];
        assert_eq!(resource.identity, url.as_str());
        assert_eq!(resource.content.as_ref(), &[0xFF, 0xD8, 0xFF]);
        assert_eq!(resource.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/a.jpg", server.uri())).unwrap();
        let err = fetcher().fetch(&url, Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, ContractError::TransientFetch { status: Some(503), .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing.jpg", server.uri())).unwrap();
        let err = fetcher().fetch(&url, Duration::from_secs(5)).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_timeout_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/slow.jpg", server.uri())).unwrap();
        let err = fetcher()
            .fetch(&url, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::Timeout { timeout_ms: 50, .. }), "got {err:?}");
    }
}
