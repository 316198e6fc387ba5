//! Quickskills - resilient API client for the Quick AI Skills backend
//!
//! A call flows through request interceptors, the transport (under a
//! per-attempt timeout), the response normalizer, response/error
//! interceptors, and the retry controller. A 401 clears the stored session
//! and notifies the host through a callback.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interceptor;
pub mod models;
pub mod normalize;
pub mod retry;
pub mod session;
pub mod stream;

pub use api::QuickSkillsApi;
pub use client::{ApiClient, ApiClientBuilder, GraphqlError, GraphqlResponse, RequestConfig};
pub use error::{ApiError, ErrorKind, StoreError};
pub use http::{
    Method, RawResponse, ReqwestTransport, RequestDescriptor, ResponseEnvelope, Transport,
};
pub use interceptor::{
    ErrorInterceptor, HeaderInterceptor, InterceptorChain, RequestInterceptor,
    ResponseInterceptor, TracingBreadcrumbs,
};
pub use retry::RetryPolicy;
pub use session::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, SessionManager,
};
pub use stream::{LessonStream, LessonStreamer, StreamEvent};
