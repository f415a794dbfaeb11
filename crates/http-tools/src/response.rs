//! Outcome of one HTTP call, classified by status.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// A successful (2xx) response with its decoded body.
///
/// JSON bodies are parsed; anything else is kept as a string. An empty body is `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 4xx: the request was rejected by the external system.
    #[error("{message}")]
    ClientError { status: u16, message: String },

    /// 5xx: the external system failed.
    #[error("{message}")]
    ServerError { status: u16, message: String },

    /// No status was received (connect, DNS, timeout, truncated body).
    #[error("http transport error: {message}")]
    Transport { message: String },

    /// 2xx, but the body does not have the shape the call requires.
    #[error("{message}")]
    UnexpectedPayload { status: u16, message: String },

    /// The client was released before the call was issued.
    #[error("http client is closed")]
    Closed,
}

impl TransportError {
    /// Status code received from the external system, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError { status, .. }
            | Self::ServerError { status, .. }
            | Self::UnexpectedPayload { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Closed => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Turn a received status + body into either a [`RawResponse`] or a classified failure.
///
/// `label` identifies the call in error messages (e.g. `GET /items/42`).
pub(crate) fn classify(status: StatusCode, body: Value, label: &str) -> Result<RawResponse> {
    if status.is_success() {
        return Ok(RawResponse {
            status: status.as_u16(),
            body,
        });
    }

    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let message = format!("{label} returned {code} {reason}: {}", body_for_message(&body));

    if status.is_server_error() {
        Err(TransportError::ServerError {
            status: code,
            message,
        })
    } else if status.is_client_error() {
        Err(TransportError::ClientError {
            status: code,
            message,
        })
    } else {
        // 1xx/3xx that reqwest did not resolve: the external system did not answer the request.
        Err(TransportError::UnexpectedPayload {
            status: code,
            message,
        })
    }
}

/// Decode a response body: JSON when it parses, otherwise lossy UTF-8 text.
pub(crate) fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn body_for_message(body: &Value) -> String {
    match body {
        Value::String(s) => s.trim().to_string(),
        Value::Null => "(empty body)".to_string(),
        other => other.to_string(),
    }
}
