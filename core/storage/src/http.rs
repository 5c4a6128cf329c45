//! HTTP implementation of the remote wire contract.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use coachsync_common::{Error, ResourceType, Result};

use crate::remote::RemoteApi;

/// HTTP request timeout in seconds.
/// 30s allows for slow backend responses while failing fast enough that
/// the stale-fallback path stays responsive.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote backend client over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpRemote {
    /// Create a new client for the given base URL.
    pub fn new(base_url: Url) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a new client with a custom transport timeout.
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Set the bearer token for authenticated requests.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap() = Some(token.into());
    }

    /// Clear the bearer token.
    pub fn clear_token(&self) {
        *self.token.write().unwrap() = None;
    }

    fn endpoint(&self, resource_type: ResourceType, id: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}", resource_type, id))
            .map_err(|e| Error::InvalidInput(format!("Invalid resource URL: {}", e)))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = *self.token.read().unwrap() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| Error::InvalidInput(format!("Invalid token: {}", e)))?,
            );
        }
        Ok(headers)
    }

    /// Map a transport-level failure onto the error taxonomy.
    fn map_transport_error(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::NetworkTimeout
        } else {
            Error::NetworkUnreachable(err.to_string())
        }
    }

    /// Check if a response is successful, mapping the status and body
    /// onto the error taxonomy if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(Error::from_status(status, &body))
        }
    }

    async fn parse_json(response: Response) -> Result<Value> {
        response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response body: {}", e)))
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn fetch(&self, resource_type: ResourceType, id: &str) -> Result<Value> {
        let url = self.endpoint(resource_type, id)?;
        debug!(%url, "Fetching resource");

        let response = self
            .client
            .get(url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn push(&self, resource_type: ResourceType, id: &str, payload: &Value) -> Result<Value> {
        let url = self.endpoint(resource_type, id)?;
        debug!(%url, "Pushing resource");

        let response = self
            .client
            .put(url)
            .headers(self.auth_headers()?)
            .json(payload)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }
}
