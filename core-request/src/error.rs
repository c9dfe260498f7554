//! Request Errors
//!
//! Every failure the pipeline surfaces carries the same normalized
//! [`Failure`] shape: `{msg, message, url, status, code, statusText}`,
//! optionally merged with the response body that caused it. The
//! [`RequestError`] variant only classifies where in the pipeline it was
//! raised.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::status::status_message;

/// Normalized failure code.
///
/// Serializes as a number for HTTP statuses and envelope codes, and as the
/// well-known string codes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// HTTP status, business envelope code, or the synthetic `20` timeout
    Numeric(i64),
    /// Generic network failure (`transitional`)
    Transitional,
    /// `ERR_NETWORK`
    Network,
    /// `ERR_CANCELED`
    Canceled,
    /// `ERR_INVALID_URL`
    InvalidUrl,
    /// Non-numeric business code passed through from the envelope
    Other(String),
}

impl ErrorCode {
    /// Client-side timeout or abort.
    pub const TIMEOUT: ErrorCode = ErrorCode::Numeric(20);

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Interpret a business envelope `code` field: integral numbers and
    /// numeric strings become [`ErrorCode::Numeric`]. Fractional codes are
    /// kept verbatim as [`ErrorCode::Other`], so they never read as `0`.
    pub fn from_envelope(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(
                n.as_i64()
                    .or_else(|| n.as_f64().and_then(integral))
                    .map(Self::Numeric)
                    .unwrap_or_else(|| Self::Other(n.to_string())),
            ),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Some(Self::Numeric(0));
                }
                Some(
                    trimmed
                        .parse::<i64>()
                        .ok()
                        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
                        .map(Self::Numeric)
                        .unwrap_or_else(|| Self::Other(s.clone())),
                )
            }
            Value::Bool(b) => Some(Self::Numeric(i64::from(*b))),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Numeric(n) => Value::from(*n),
            other => Value::String(other.to_string()),
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Transitional => f.write_str("transitional"),
            Self::Network => f.write_str("ERR_NETWORK"),
            Self::Canceled => f.write_str("ERR_CANCELED"),
            Self::InvalidUrl => f.write_str("ERR_INVALID_URL"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(n) => serializer.serialize_i64(*n),
            other => serializer.collect_str(other),
        }
    }
}

/// Normalized failure shape handed to error handlers and callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// Human-readable message, never empty
    pub msg: String,
    /// Low-level message from the layer that failed
    pub message: String,
    pub url: String,
    pub status: Option<i64>,
    pub code: ErrorCode,
    pub status_text: String,
    /// Response body (business envelope or error body), when there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Failure {
    /// Failure whose `msg` comes from the status table.
    pub fn from_code(code: ErrorCode, url: impl Into<String>) -> Self {
        let msg = status_message(&code).unwrap_or("Request failed").to_string();
        Self {
            message: msg.clone(),
            status_text: msg.clone(),
            msg,
            url: url.into(),
            status: code.as_number(),
            code,
            body: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The failure as the caller sees it: the body's fields (when it is an
    /// object) overlaid with the normalized ones.
    pub fn to_value(&self) -> Value {
        let mut map = match &self.body {
            Some(Value::Object(body)) => body.clone(),
            _ => Map::new(),
        };
        map.insert("msg".into(), Value::String(self.msg.clone()));
        map.insert("message".into(), Value::String(self.message.clone()));
        map.insert("url".into(), Value::String(self.url.clone()));
        map.insert(
            "status".into(),
            self.status.map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("code".into(), self.code.to_value());
        map.insert("statusText".into(), Value::String(self.status_text.clone()));
        Value::Object(map)
    }
}

#[derive(Error, Debug, Clone)]
pub enum RequestError {
    #[error("Invalid request: {}", .0.msg)]
    Validation(Failure),

    #[error("Request failed with status {}: {}", .0.code, .0.msg)]
    Status(Failure),

    #[error("Transport error: {}", .0.msg)]
    Transport(Failure),

    #[error("Request timed out: {}", .0.msg)]
    Timeout(Failure),

    #[error("Business error {}: {}", .0.code, .0.msg)]
    Business(Failure),

    #[error("Stream error: {}", .0.msg)]
    Stream(Failure),

    #[error("Capability missing: {}", .0.msg)]
    Capability(Failure),
}

impl RequestError {
    pub fn empty_url() -> Self {
        let msg = "Request url must not be empty".to_string();
        Self::Validation(Failure {
            message: msg.clone(),
            status_text: msg.clone(),
            msg,
            url: String::new(),
            status: None,
            code: ErrorCode::InvalidUrl,
            body: None,
        })
    }

    pub fn capability(url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Capability(Failure {
            msg: message.clone(),
            message: message.clone(),
            url: url.into(),
            status: None,
            code: ErrorCode::Network,
            status_text: message,
            body: None,
        })
    }

    pub fn failure(&self) -> &Failure {
        match self {
            Self::Validation(f)
            | Self::Status(f)
            | Self::Transport(f)
            | Self::Timeout(f)
            | Self::Business(f)
            | Self::Stream(f)
            | Self::Capability(f) => f,
        }
    }

    pub fn into_failure(self) -> Failure {
        match self {
            Self::Validation(f)
            | Self::Status(f)
            | Self::Transport(f)
            | Self::Timeout(f)
            | Self::Business(f)
            | Self::Stream(f)
            | Self::Capability(f) => f,
        }
    }

    pub fn code(&self) -> &ErrorCode {
        &self.failure().code
    }

    pub fn msg(&self) -> &str {
        &self.failure().msg
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;
