// Network transport seam.
// Sends one request and hands back the status, leaving the body to read on demand.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::error::{FetchError, Result};

/// Per-request timeout for every outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP methods the getter issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request as seen by the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    /// JSON body, POST only.
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    /// Request headers as a typed map. Fails on names or values HTTP cannot carry.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Other(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Other(format!("invalid header value: {}", e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// A body still to be read off the wire.
#[async_trait]
pub trait ResponseBody: Send {
    async fn read(self: Box<Self>) -> Result<Vec<u8>>;
}

#[async_trait]
impl ResponseBody for Vec<u8> {
    async fn read(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(*self)
    }
}

#[async_trait]
impl ResponseBody for reqwest::Response {
    async fn read(self: Box<Self>) -> Result<Vec<u8>> {
        Ok((*self).bytes().await.map_err(FetchError::Transport)?.to_vec())
    }
}

/// A response whose status line has arrived; the body is read on demand.
pub struct TransportResponse {
    pub status: u16,
    body: Box<dyn ResponseBody>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Vec<u8>> {
        self.body.read().await
    }

    /// Read an error body. Error bodies are diagnostics only; an unreadable one is empty.
    pub async fn error_body(self, url: &str) -> Vec<u8> {
        match self.body.read().await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%url, error = %e, "could not read error body");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Anything that can carry a request to an upstream server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return as soon as the status line arrives.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport sharing one connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| FetchError::Other(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let headers = request.header_map()?;
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self
                .client
                .post(&request.url)
                .json(request.body.as_ref().unwrap_or(&serde_json::Value::Null)),
        };

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        Ok(TransportResponse::new(response.status().as_u16(), response))
    }
}
