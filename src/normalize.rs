//! Response normalization
//!
//! Turns a [`RawResponse`] into either a success envelope or an [`ApiError`].
//! Callers of the client never branch on the HTTP status themselves.

use crate::error::{ApiError, ErrorKind};
use crate::http::{RawResponse, ResponseEnvelope};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Interpret a raw response.
///
/// JSON content types are parsed as JSON (an empty body becomes `null`);
/// anything else is kept as a JSON string. Every non-2xx status yields `Err`
/// carrying that status, even when the error body does not parse.
pub fn normalize(raw: RawResponse) -> Result<ResponseEnvelope<Value>, ApiError> {
    if !raw.is_success() {
        let payload = parse_payload(&raw).unwrap_or(Value::Null);
        return Err(status_error(raw.status, payload));
    }

    let payload = parse_payload(&raw)?;
    let message = field_str(&payload, "message");
    Ok(ResponseEnvelope {
        data: payload,
        status: raw.status,
        message,
        success: true,
    })
}

/// Decode an untyped envelope into the caller's payload type
pub fn decode<T: DeserializeOwned>(
    envelope: ResponseEnvelope<Value>,
) -> Result<ResponseEnvelope<T>, ApiError> {
    let status = envelope.status;
    let data = serde_json::from_value(envelope.data).map_err(|e| {
        ApiError::unknown(format!("Failed to decode response payload: {e}"))
            .with_details(Value::from(status))
    })?;

    Ok(ResponseEnvelope {
        data,
        status,
        message: envelope.message,
        success: envelope.success,
    })
}

fn parse_payload(raw: &RawResponse) -> Result<Value, ApiError> {
    let text = String::from_utf8_lossy(&raw.body);
    let is_json = raw
        .content_type()
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if !is_json {
        return Ok(Value::String(text.into_owned()));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| {
        tracing::debug!("Unparseable JSON body (status {}): {}", raw.status, e);
        ApiError::unknown(format!("Failed to parse response body: {e}"))
            .with_details(Value::String(text.into_owned()))
    })
}

fn status_error(status: u16, payload: Value) -> ApiError {
    let kind = ErrorKind::from_status(status);
    let message = field_str(&payload, "message")
        .or_else(|| field_str(&payload, "error"))
        .unwrap_or_else(|| canned_message(kind, status));

    let mut err = ApiError::new(kind, status, message);
    if let Some(code) = field_str(&payload, "code") {
        err = err.with_code(code);
    }
    if !payload.is_null() {
        err = err.with_details(payload);
    }
    err
}

fn canned_message(kind: ErrorKind, status: u16) -> String {
    match kind {
        ErrorKind::Unauthorized => "Unauthorized - please log in again".to_string(),
        ErrorKind::Forbidden => "Access forbidden".to_string(),
        ErrorKind::NotFound => "Resource not found".to_string(),
        ErrorKind::RequestTimeout => "Request timeout".to_string(),
        ErrorKind::Server => "Server error - please try again later".to_string(),
        _ => format!("HTTP error {status}"),
    }
}

fn field_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key)?.as_str().map(str::to_string)
}
