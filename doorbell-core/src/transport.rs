//! HTTP transport to the router's web interface
//!
//! The router is reached over plain HTTP. All traffic goes through
//! [`RouterTransport`] so the login and polling logic can run against
//! scripted responses in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The router signals success with exactly 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Outbound requests needed to talk to the router
#[async_trait]
pub trait RouterTransport: Send + Sync {
    /// GET `url` and return the response, whatever its status
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// POST `form` as `application/x-www-form-urlencoded` to `url`
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn finish(resp: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(strip_url)?;
        Ok(HttpResponse { status, body })
    }
}

// Device list URLs carry the session token, keep them out of error messages.
fn strip_url(e: reqwest::Error) -> TransportError {
    TransportError::HttpError(e.without_url())
}

#[async_trait]
impl RouterTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = self.client.get(url).send().await.map_err(strip_url)?;
        Self::finish(resp).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(strip_url)?;
        Self::finish(resp).await
    }
}
