//! Interceptor chain
//!
//! Interceptors are registered once when the client is built and run in
//! registration order. Request interceptors may rewrite the outgoing
//! descriptor, response interceptors may rewrite the success envelope, and
//! error interceptors only observe.

use crate::error::ApiError;
use crate::http::{RequestDescriptor, ResponseEnvelope};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;

/// Runs before the first send of a call
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Return the descriptor to send, or an error to abort the call
    async fn on_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, ApiError>;
}

/// Runs after every successful round-trip
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    fn name(&self) -> &str;

    async fn on_response(
        &self,
        response: ResponseEnvelope<Value>,
        request: &RequestDescriptor,
    ) -> Result<ResponseEnvelope<Value>, ApiError>;
}

/// Observes every failed round-trip
#[async_trait]
pub trait ErrorInterceptor: Send + Sync {
    fn name(&self) -> &str;

    async fn on_error(&self, error: &ApiError, request: &RequestDescriptor);
}

/// Ordered interceptor lists, frozen once handed to the client
#[derive(Clone, Default)]
pub struct InterceptorChain {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
    error: Vec<Arc<dyn ErrorInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        tracing::debug!("Registered request interceptor: {}", interceptor.name());
        self.request.push(interceptor);
        self
    }

    pub fn with_response(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        tracing::debug!("Registered response interceptor: {}", interceptor.name());
        self.response.push(interceptor);
        self
    }

    pub fn with_error(mut self, interceptor: Arc<dyn ErrorInterceptor>) -> Self {
        tracing::debug!("Registered error interceptor: {}", interceptor.name());
        self.error.push(interceptor);
        self
    }

    /// Register one object in all three stages
    pub fn with_observer<I>(self, interceptor: Arc<I>) -> Self
    where
        I: RequestInterceptor + ResponseInterceptor + ErrorInterceptor + 'static,
    {
        self.with_request(interceptor.clone())
            .with_response(interceptor.clone())
            .with_error(interceptor)
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty() && self.error.is_empty()
    }

    pub async fn execute_request_interceptors(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<RequestDescriptor, ApiError> {
        for interceptor in &self.request {
            request = interceptor.on_request(request).await?;
        }
        Ok(request)
    }

    pub async fn execute_response_interceptors(
        &self,
        mut response: ResponseEnvelope<Value>,
        request: &RequestDescriptor,
    ) -> Result<ResponseEnvelope<Value>, ApiError> {
        for interceptor in &self.response {
            response = interceptor.on_response(response, request).await?;
        }
        Ok(response)
    }

    /// Let every error interceptor see `error`, then hand it back unchanged
    pub async fn execute_error_interceptors(
        &self,
        error: ApiError,
        request: &RequestDescriptor,
    ) -> ApiError {
        for interceptor in &self.error {
            interceptor.on_error(&error, request).await;
        }
        error
    }
}

/// Emits a tracing breadcrumb around every call
#[derive(Debug, Default)]
pub struct TracingBreadcrumbs;

#[async_trait]
impl RequestInterceptor for TracingBreadcrumbs {
    fn name(&self) -> &str {
        "breadcrumbs"
    }

    async fn on_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "api request");
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for TracingBreadcrumbs {
    fn name(&self) -> &str {
        "breadcrumbs"
    }

    async fn on_response(
        &self,
        response: ResponseEnvelope<Value>,
        request: &RequestDescriptor,
    ) -> Result<ResponseEnvelope<Value>, ApiError> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "api response"
        );
        Ok(response)
    }
}

#[async_trait]
impl ErrorInterceptor for TracingBreadcrumbs {
    fn name(&self) -> &str {
        "breadcrumbs"
    }

    async fn on_error(&self, error: &ApiError, request: &RequestDescriptor) {
        tracing::info!(
            method = %request.method,
            url = %request.url,
            status = error.status,
            code = error.code.as_deref().unwrap_or(""),
            "api error: {}",
            error.message
        );
    }
}

/// Adds fixed headers to every outgoing request, overwriting existing values
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    headers: HeaderMap,
}

impl HeaderInterceptor {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    pub fn single(name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::unknown(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::unknown(format!("invalid header value: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(Self { headers })
    }
}

#[async_trait]
impl RequestInterceptor for HeaderInterceptor {
    fn name(&self) -> &str {
        "headers"
    }

    async fn on_request(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<RequestDescriptor, ApiError> {
        for (name, value) in &self.headers {
            request.headers.insert(name.clone(), value.clone());
        }
        Ok(request)
    }
}
