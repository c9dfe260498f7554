//! Request outcome.

use bridge_traits::{ByteStream, RawResponse, ResponseBody};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// What a successful request resolves with.
pub enum Payload {
    /// Business result (or the whole parsed body when a callback is used)
    Json(Value),
    /// Download-mode body
    Binary(Bytes),
    /// Server-push byte stream
    Stream(ByteStream),
    /// External request: the transport's response, untouched
    Raw(RawResponse),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(RawResponse {
                body: ResponseBody::Json(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(RawResponse {
                body: ResponseBody::Json(value),
                ..
            }) => Some(value),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Raw(RawResponse {
                body: ResponseBody::Bytes(bytes),
                ..
            }) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Option<serde_json::Result<T>> {
        self.into_json().map(serde_json::from_value)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Binary(_) => "binary",
            Self::Stream(_) => "stream",
            Self::Raw(_) => "raw",
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Binary(bytes) => f.debug_tuple("Binary").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
