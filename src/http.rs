//! Transport-level types and the reqwest-backed transport
//!
//! The pipeline only ever talks to a [`Transport`]; the default one wraps a
//! shared `reqwest::Client`. Tests substitute their own implementation.

use crate::error::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::fmt;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP verbs supported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully resolved outgoing request.
///
/// Built once per call by the client; request interceptors may hand back a
/// modified copy before the first send.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Already-serialized payload. Always `None` for GET.
    pub body: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

/// What came back over the wire, before any interpretation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Uniform success wrapper handed back to callers
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    pub data: T,
    pub status: u16,
    pub message: Option<String>,
    pub success: bool,
}

impl<T> ResponseEnvelope<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            data: f(self.data),
            status: self.status,
            message: self.message,
            success: self.success,
        }
    }
}

/// Executes one HTTP round-trip.
///
/// Implementations must not retry or apply timeouts themselves; the client
/// owns both. Dropping the returned future must abort the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError>;
}

/// Transport backed by a pooled `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("quickskills/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner: client })
    }

    pub fn from_client(inner: Client) -> Self {
        Self { inner }
    }

    pub fn client(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .inner
            .request(request.method.into(), &request.url)
            .headers(request.headers.clone());

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Network error: {e}")))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response body: {e}")))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
