/*
[INPUT]:  HTTP configuration (base URLs, timeouts)
[OUTPUT]: Configured reqwest client with cookie store for credentialed calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use crate::http::Result;

/// Base URLs for the identity and verifier services
pub(crate) const ID_BASE_URL: &str = "https://api.runonflux.io";
pub(crate) const VERIFIER_BASE_URL: &str = "http://localhost:8000";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the identity issuer and login verifier
#[derive(Debug, Clone)]
pub struct ZelidClient {
    http_client: Client,
    id_base_url: Url,
    verifier_base_url: Url,
}

impl ZelidClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_urls(config, ID_BASE_URL, VERIFIER_BASE_URL)
    }

    /// Create a client pointing at explicit base URLs
    pub fn with_config_and_base_urls(
        config: ClientConfig,
        id_base_url: &str,
        verifier_base_url: &str,
    ) -> Result<Self> {
        // Cookie store keeps the verifier's session cookie for later calls.
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http_client,
            id_base_url: Url::parse(id_base_url)?,
            verifier_base_url: Url::parse(verifier_base_url)?,
        })
    }

    /// Base URL of the identity issuer
    pub fn id_base_url(&self) -> &Url {
        &self.id_base_url
    }

    /// Base URL of the login verifier
    pub fn verifier_base_url(&self) -> &Url {
        &self.verifier_base_url
    }

    /// Build request builder for identity endpoints
    pub(crate) fn id_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.id_base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build request builder for verifier endpoints
    pub(crate) fn verifier_request(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder> {
        let url = self.verifier_base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send a request and return the status with the raw body
    pub(crate) async fn send_raw(&self, builder: RequestBuilder) -> Result<(StatusCode, Vec<u8>)> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "http response received");
        Ok((status, bytes.to_vec()))
    }
}
