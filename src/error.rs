//! Error taxonomy shared by every stage of the request pipeline

use serde_json::Value;
use thiserror::Error;

/// Semantic classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-side abort after the configured duration
    Timeout,
    /// Transport-level failure (DNS, connection refused, reset)
    Network,
    /// Unexpected failure or unparseable body
    Unknown,
    Unauthorized,
    Forbidden,
    NotFound,
    /// HTTP 408 from the server
    RequestTimeout,
    /// Any 5xx
    Server,
    /// Any other non-2xx status
    Http,
    /// A GraphQL response carrying an `errors` array
    Graphql,
}

impl ErrorKind {
    /// Machine-readable code attached to errors of this kind
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorKind::Server => "SERVER_ERROR",
            ErrorKind::Http => "HTTP_ERROR",
            ErrorKind::Graphql => "GRAPHQL_ERROR",
        }
    }

    /// Classify a non-2xx HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::RequestTimeout,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Http,
        }
    }
}

/// Uniform failure returned by the pipeline.
///
/// `status` is 0 for failures that never produced an HTTP response
/// (timeout, network, parse errors).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            code: Some(kind.code().to_string()),
            details: None,
        }
    }

    pub fn timeout(after_ms: u128) -> Self {
        Self::new(
            ErrorKind::Timeout,
            0,
            format!("Request timed out after {after_ms}ms"),
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, 0, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, 0, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::unknown(format!("JSON error: {err}"))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::unknown(format!("Failed to persist credentials: {err}"))
    }
}

/// Failure reading or writing persisted credentials
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode credentials: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("failed to decode credentials: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("no location available for the credential file")]
    NoLocation,
}
