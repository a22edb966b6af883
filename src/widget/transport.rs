use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned invalid json: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Network calls the widget makes. Callers degrade on any error instead of
/// surfacing it to the user.
#[async_trait]
pub trait WidgetTransport: Send + Sync {
    /// GET a JSON configuration document.
    async fn fetch_config(&self, url: &str) -> Result<serde_json::Value, TransportError>;
    /// GET the consent endpoint; a success status means consent was given.
    async fn check_consent(&self, url: &str) -> Result<bool, TransportError>;
    /// POST to the consent endpoint; a success status means it was recorded.
    async fn record_consent(&self, url: &str) -> Result<bool, TransportError>;
}

/// Transport that resolves relative endpoints against the host page origin.
#[derive(Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("civic-chat/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, url: &str) -> Result<Url, TransportError> {
        self.base.join(url).map_err(|source| TransportError::Url {
            url: url.to_string(),
            source,
        })
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        request.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl WidgetTransport for HttpTransport {
    async fn fetch_config(&self, url: &str) -> Result<serde_json::Value, TransportError> {
        let endpoint = self.endpoint(url)?;
        let resp = self
            .send(
                url,
                self.client
                    .get(endpoint)
                    .header(header::ACCEPT, "application/json"),
            )
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| TransportError::Json {
            url: url.to_string(),
            source,
        })
    }

    async fn check_consent(&self, url: &str) -> Result<bool, TransportError> {
        let endpoint = self.endpoint(url)?;
        let resp = self.send(url, self.client.get(endpoint)).await?;
        debug!(%url, status = %resp.status(), "consent check");
        Ok(resp.status().is_success())
    }

    async fn record_consent(&self, url: &str) -> Result<bool, TransportError> {
        let endpoint = self.endpoint(url)?;
        let resp = self
            .send(
                url,
                self.client
                    .post(endpoint)
                    .header(header::CONTENT_TYPE, "application/json"),
            )
            .await?;
        debug!(%url, status = %resp.status(), "consent recorded");
        Ok(resp.status().is_success())
    }
}
