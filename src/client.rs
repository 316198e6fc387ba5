//! Request client
//!
//! `ApiClient` is the single entry point for talking to the backend: it
//! resolves endpoints, attaches default and auth headers, applies the
//! per-attempt timeout, and drives the retry loop. Clones share state.

use crate::config::ApiConfig;
use crate::error::{ApiError, ErrorKind};
use crate::http::{
    Method, RawResponse, ReqwestTransport, RequestDescriptor, ResponseEnvelope, Transport,
};
use crate::interceptor::InterceptorChain;
use crate::normalize;
use crate::retry::{retry_request, RetryPolicy};
use crate::session::{MemoryCredentialStore, SessionManager};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Per-call overrides; unset fields fall back to the client's [`ApiConfig`]
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Strings are sent verbatim, everything else is JSON-encoded
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

struct ClientInner {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    session: SessionManager,
    interceptors: InterceptorChain,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

pub struct ApiClientBuilder {
    config: ApiConfig,
    transport: Option<Arc<dyn Transport>>,
    session: Option<SessionManager>,
    interceptors: InterceptorChain,
}

impl ApiClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    pub fn interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let session = self
            .session
            .unwrap_or_else(|| SessionManager::new(Arc::new(MemoryCredentialStore::new())));

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                session,
                interceptors: self.interceptors,
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(config: ApiConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            transport: None,
            session: None,
            interceptors: InterceptorChain::new(),
        }
    }

    /// Client with the reqwest transport and an in-memory session
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Send a request and decode the payload into `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let descriptor = self.build_descriptor(endpoint, config);
        let descriptor = self
            .inner
            .interceptors
            .execute_request_interceptors(descriptor)
            .await?;

        let policy = RetryPolicy::new(descriptor.retries, descriptor.retry_delay)
            .with_max_delay(self.inner.config.max_retry_delay());

        let envelope = retry_request(policy, || self.attempt(&descriptor)).await?;
        normalize::decode(envelope)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        self.request(endpoint, config.method(Method::Get)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(endpoint, config.method(Method::Post).body(body))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(endpoint, config.method(Method::Put).body(body))
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(endpoint, config.method(Method::Patch).body(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        self.request(endpoint, config.method(Method::Delete)).await
    }

    /// POST `{query, variables}` to the GraphQL endpoint.
    ///
    /// A 200 carrying `errors` still resolves; see [`GraphqlResponse::into_result`].
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<ResponseEnvelope<GraphqlResponse<T>>, ApiError> {
        let body = json!({ "query": query, "variables": variables });
        let endpoint = self.inner.config.graphql_url.clone();
        self.request(&endpoint, RequestConfig::new().method(Method::Post).body(body))
            .await
    }

    /// Absolute URLs pass through, anything else is joined to `base_url`
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.inner.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn build_descriptor(&self, endpoint: &str, config: RequestConfig) -> RequestDescriptor {
        let defaults = &self.inner.config;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.inner.session.auth_token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    tracing::warn!("Stored access token is not a valid header value, skipping")
                }
            }
        }
        // caller values replace a default wholesale, repeated values are kept
        for name in config.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &config.headers {
            headers.append(name.clone(), value.clone());
        }

        let body = match config.method {
            Method::Get => None,
            _ => config.body.map(|body| match body {
                Value::String(text) => text,
                other => other.to_string(),
            }),
        };

        RequestDescriptor {
            url: self.resolve_url(endpoint),
            method: config.method,
            headers,
            body,
            timeout: config.timeout.unwrap_or_else(|| defaults.timeout()),
            retries: config.retries.unwrap_or(defaults.retries),
            retry_delay: config.retry_delay.unwrap_or_else(|| defaults.retry_delay()),
        }
    }

    /// One round-trip: send under timeout, normalize, run post interceptors.
    ///
    /// Failures from any of these steps, response interceptors included,
    /// pass through the 401 check and the error interceptors.
    async fn attempt(
        &self,
        request: &RequestDescriptor,
    ) -> Result<ResponseEnvelope<Value>, ApiError> {
        let result = match self.send_with_timeout(request).await.and_then(normalize::normalize) {
            Ok(envelope) => {
                self.inner
                    .interceptors
                    .execute_response_interceptors(envelope, request)
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(envelope) => Ok(envelope),
            Err(err) => {
                if err.is_unauthorized() {
                    self.inner.session.handle_unauthorized();
                }
                Err(self
                    .inner
                    .interceptors
                    .execute_error_interceptors(err, request)
                    .await)
            }
        }
    }

    async fn send_with_timeout(
        &self,
        request: &RequestDescriptor,
    ) -> Result<RawResponse, ApiError> {
        // Dropping the send future on expiry aborts the in-flight request.
        match tokio::time::timeout(request.timeout, self.inner.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(request.timeout.as_millis())),
        }
    }
}

/// Body of a GraphQL-over-HTTP response
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> GraphqlResponse<T> {
    /// Partial data wins over errors; errors without data become an `ApiError`
    pub fn into_result(self) -> Result<T, ApiError> {
        match self.data {
            Some(data) => {
                if !self.errors.is_empty() {
                    tracing::warn!(
                        "GraphQL returned partial data with {} error(s)",
                        self.errors.len()
                    );
                }
                Ok(data)
            }
            None if self.errors.is_empty() => {
                Err(ApiError::unknown("GraphQL response carried no data"))
            }
            None => {
                let message = self
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                let details = serde_json::to_value(&self.errors).unwrap_or(Value::Null);
                Err(ApiError::new(ErrorKind::Graphql, 200, message).with_details(details))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned `(status, body)` pairs and records every request
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<(u16, &'static str)>>,
        seen: Mutex<Vec<RequestDescriptor>>,
    }

    impl ScriptedTransport {
        fn new(replies: &[(u16, &'static str)]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().copied().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last(&self) -> RequestDescriptor {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
            self.seen.lock().unwrap().push(request.clone());
            let (status, body) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((200, "{}"));
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(RawResponse {
                status,
                headers,
                body: Bytes::from_static(body.as_bytes()),
            })
        }
    }

    /// Never answers; flags when its future is dropped
    struct HangingTransport {
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(&self, _request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
            let _guard = DropFlag(self.dropped.clone());
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn api_config() -> ApiConfig {
        ApiConfig {
            base_url: "http://api.test/v1/".to_string(),
            retry_delay_ms: 100,
            ..ApiConfig::default()
        }
    }

    fn client_with(transport: Arc<dyn Transport>) -> ApiClient {
        ApiClient::builder(api_config())
            .transport(transport)
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_url() {
        let client = client_with(ScriptedTransport::new(&[]));
        assert_eq!(client.resolve_url("/health"), "http://api.test/v1/health");
        assert_eq!(client.resolve_url("health"), "http://api.test/v1/health");
        assert_eq!(
            client.resolve_url("https://cdn.test/x.json"),
            "https://cdn.test/x.json"
        );
    }

    #[tokio::test]
    async fn test_default_headers_and_caller_precedence() {
        let transport = ScriptedTransport::new(&[(200, r#"{"ok":true}"#)]);
        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials {
            access_token: "tok".into(),
            refresh_token: "ref".into(),
        }));
        let client = ApiClient::builder(api_config())
            .transport(transport.clone())
            .session(SessionManager::new(store))
            .build()
            .unwrap();

        let config = RequestConfig::new().header(ACCEPT, HeaderValue::from_static("text/plain"));
        let _: ResponseEnvelope<Value> = client.get("/me", config).await.unwrap();

        let sent = transport.last();
        assert_eq!(sent.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(sent.headers.get(ACCEPT).unwrap(), "text/plain");
        assert_eq!(sent.headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[tokio::test]
    async fn test_repeated_caller_headers_are_kept() {
        let transport = ScriptedTransport::new(&[(200, "{}")]);
        let client = client_with(transport.clone());

        let mut config = RequestConfig::new();
        config.headers.append("x-tag", HeaderValue::from_static("a"));
        config.headers.append("x-tag", HeaderValue::from_static("b"));
        config.headers.append(ACCEPT, HeaderValue::from_static("text/plain"));
        config.headers.append(ACCEPT, HeaderValue::from_static("text/html"));
        let _: ResponseEnvelope<Value> = client.get("/tags", config).await.unwrap();

        let sent = transport.last();
        let tags: Vec<_> = sent.headers.get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["a", "b"]);
        let accept: Vec<_> = sent.headers.get_all(ACCEPT).iter().collect();
        assert_eq!(accept, vec!["text/plain", "text/html"]);
        assert_eq!(sent.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_no_auth_header_without_token() {
        let transport = ScriptedTransport::new(&[(200, "{}")]);
        let client = client_with(transport.clone());
        let _: ResponseEnvelope<Value> = client.get("/public", RequestConfig::new()).await.unwrap();
        assert!(transport.last().headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_body_serialization_rules() {
        let transport = ScriptedTransport::new(&[(200, "{}"), (200, "{}"), (200, "{}")]);
        let client = client_with(transport.clone());

        let _: ResponseEnvelope<Value> = client
            .post("/quiz", &json!({"answers": [1, 2]}), RequestConfig::new())
            .await
            .unwrap();
        assert_eq!(transport.last().body.as_deref(), Some(r#"{"answers":[1,2]}"#));

        let _: ResponseEnvelope<Value> = client
            .request("/raw", RequestConfig::new().method(Method::Put).body(json!("a=b")))
            .await
            .unwrap();
        assert_eq!(transport.last().body.as_deref(), Some("a=b"));

        let _: ResponseEnvelope<Value> = client
            .request("/ignored", RequestConfig::new().body(json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(transport.last().method, Method::Get);
        assert!(transport.last().body.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried_with_backoff() {
        let transport = ScriptedTransport::new(&[
            (500, "{}"),
            (500, "{}"),
            (500, "{}"),
            (200, r#"{"done":true}"#),
        ]);
        let client = client_with(transport.clone());
        let start = tokio::time::Instant::now();

        let env: ResponseEnvelope<Value> = client
            .get("/lessons/daily", RequestConfig::new().retries(3))
            .await
            .unwrap();

        assert_eq!(transport.calls(), 4);
        assert_eq!(env.data["done"], true);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100 + 200 + 400), "{waited:?}");
        assert!(waited < Duration::from_millis(800), "{waited:?}");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        for status in [400u16, 403, 404, 422] {
            let transport = ScriptedTransport::new(&[(status, "{}"), (200, "{}")]);
            let client = client_with(transport.clone());
            let err = client
                .get::<Value>("/x", RequestConfig::new().retries(5))
                .await
                .unwrap_err();
            assert_eq!(err.status, status);
            assert_eq!(transport.calls(), 1, "status {status}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let transport = ScriptedTransport::new(&[(503, "{}"), (502, "{}"), (408, "{}")]);
        let client = client_with(transport.clone());
        let err = client
            .get::<Value>("/x", RequestConfig::new().retries(2))
            .await
            .unwrap_err();
        assert_eq!(err.status, 408);
        assert_eq!(err.kind, ErrorKind::RequestTimeout);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_transport() {
        let dropped = Arc::new(AtomicBool::new(false));
        let client = client_with(Arc::new(HangingTransport {
            dropped: dropped.clone(),
        }));

        let err = client
            .get::<Value>(
                "/slow",
                RequestConfig::new()
                    .timeout(Duration::from_millis(250))
                    .retries(0),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.status, 0);
        assert_eq!(err.code.as_deref(), Some("TIMEOUT_ERROR"));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials {
            access_token: "stale".into(),
            refresh_token: "stale-r".into(),
        }));
        let session = SessionManager::new(store.clone()).with_unauthorized_hook(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let transport = ScriptedTransport::new(&[(401, r#"{"message":"Unauthorized"}"#)]);
        let client = ApiClient::builder(api_config())
            .transport(transport.clone())
            .session(session)
            .build()
            .unwrap();

        let err = client
            .get::<Value>("/me", RequestConfig::new().retries(3))
            .await
            .unwrap_err();

        assert_eq!(err.status, 401);
        assert_eq!(err.message, "Unauthorized");
        assert_eq!(transport.calls(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(client.session().auth_token().is_none());
    }

    /// Rejects every success envelope as an expired session
    struct ExpireSession;

    #[async_trait]
    impl crate::interceptor::ResponseInterceptor for ExpireSession {
        fn name(&self) -> &str {
            "expire-session"
        }

        async fn on_response(
            &self,
            _response: ResponseEnvelope<Value>,
            _request: &RequestDescriptor,
        ) -> Result<ResponseEnvelope<Value>, ApiError> {
            Err(ApiError::new(ErrorKind::Unauthorized, 401, "session expired"))
        }
    }

    struct CountErrors(Arc<AtomicUsize>);

    #[async_trait]
    impl crate::interceptor::ErrorInterceptor for CountErrors {
        fn name(&self) -> &str {
            "count-errors"
        }

        async fn on_error(&self, _error: &ApiError, _request: &RequestDescriptor) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_response_interceptor_error_reaches_error_stage() {
        let seen = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials {
            access_token: "tok".into(),
            refresh_token: "ref".into(),
        }));
        let chain = InterceptorChain::new()
            .with_response(Arc::new(ExpireSession))
            .with_error(Arc::new(CountErrors(seen.clone())));
        let transport = ScriptedTransport::new(&[(200, "{}")]);
        let client = ApiClient::builder(api_config())
            .transport(transport.clone())
            .session(SessionManager::new(store.clone()))
            .interceptors(chain)
            .build()
            .unwrap();

        let err = client
            .get::<Value>("/me", RequestConfig::new().retries(2))
            .await
            .unwrap_err();

        assert_eq!(err.message, "session expired");
        assert_eq!(transport.calls(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(client.session().auth_token().is_none());
    }

    #[tokio::test]
    async fn test_graphql_posts_query_and_variables() {
        let transport = ScriptedTransport::new(&[(
            200,
            r#"{"data":null,"errors":[{"message":"lesson not found"}]}"#,
        )]);
        let client = client_with(transport.clone());

        let env: ResponseEnvelope<GraphqlResponse<Value>> = client
            .graphql("query L($id: ID!) { lesson(id: $id) { title } }", json!({"id": "7"}))
            .await
            .unwrap();

        let sent = transport.last();
        assert_eq!(sent.url, "http://localhost:4000/graphql");
        assert_eq!(sent.method, Method::Post);
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["variables"]["id"], "7");

        assert_eq!(env.status, 200);
        let err = env.data.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Graphql);
        assert_eq!(err.message, "lesson not found");
    }

    #[test]
    fn test_graphql_partial_data_is_ok() {
        let resp: GraphqlResponse<Value> = serde_json::from_value(json!({
            "data": {"lesson": null},
            "errors": [{"message": "partial"}]
        }))
        .unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({"lesson": null}));

        let empty: GraphqlResponse<Value> = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.into_result().unwrap_err().kind, ErrorKind::Unknown);
    }
}
