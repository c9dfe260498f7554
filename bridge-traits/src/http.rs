//! Transport Abstraction
//!
//! The resolved request descriptor handed to a transport, the raw response it
//! returns, and the [`Transport`] contract every platform adapter implements.

use async_trait::async_trait;
use bytes::Bytes;
use core_async::CancellationToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::platform::{ByteStream, PlatformSendSync};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = BridgeError;

    /// Case-insensitive: `get`, `Get` and `GET` are the same method.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            other => Err(BridgeError::OperationFailed(format!(
                "Unsupported HTTP method: {}",
                other
            ))),
        }
    }
}

/// Whether cookies travel with cross-origin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsMode {
    #[default]
    Omit,
    Include,
}

/// Fetch request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
}

/// How the transport should hand back the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Blob,
    Stream,
}

/// File content attached to a multipart part.
#[derive(Debug, Clone, PartialEq)]
pub enum FilePart {
    /// In-memory bytes (browser `File`/`Blob` shape).
    Blob {
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
    /// A reference the transport resolves itself (React-Native `{uri, type, name}` shape).
    Uri {
        uri: String,
        name: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text { name: String, value: String },
    File { name: String, file: FilePart },
}

/// Ordered multipart form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<MultipartField>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.parts.push(MultipartField::File {
            name: name.into(),
            file,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Encoded request body. Exactly one shape is populated per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` text.
    Form(String),
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Caller-suppliable status acceptance predicate.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl StatusValidator {
    pub fn new(f: impl Fn(u16) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Accepts every status.
    pub fn accept_all() -> Self {
        Self::new(|_| true)
    }

    /// Accepts only 2xx.
    pub fn success_only() -> Self {
        Self::new(|status| (200..300).contains(&status))
    }

    pub fn validate(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

/// Fully resolved, transport-ready request descriptor.
///
/// For GET requests the body is [`RequestBody::Empty`] and every parameter
/// lives in the query string of `url`.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub signal: Option<CancellationToken>,
    pub credentials: CredentialsMode,
    pub mode: RequestMode,
    pub response_type: ResponseType,
    pub validate_status: Option<StatusValidator>,
}

impl RequestConfig {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
            timeout: Duration::from_millis(6500),
            signal: None,
            credentials: CredentialsMode::Omit,
            mode: RequestMode::Cors,
            response_type: ResponseType::Json,
            validate_status: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn signal(mut self, token: CancellationToken) -> Self {
        self.signal = Some(token);
        self
    }

    /// Applies the configured validator, defaulting to "2xx only".
    pub fn accepts_status(&self, status: u16) -> bool {
        match &self.validate_status {
            Some(validator) => validator.validate(status),
            None => (200..300).contains(&status),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.signal
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Response body as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Already decoded by an HTTP-client style transport.
    Json(Value),
    /// Undecoded bytes.
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }
}

/// Raw transport response
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl RawResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            status_text: String::new(),
            url: String::new(),
            headers: HashMap::new(),
            body: ResponseBody::Json(body),
        }
    }

    pub fn bytes(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            url: String::new(),
            headers: HashMap::new(),
            body: ResponseBody::Bytes(body.into()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Which family of transport produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFlavor {
    /// Decodes JSON itself and enforces `validate_status`.
    HttpClient,
    /// Hands back raw bytes for any status.
    Fetch,
}

/// Common transport contract
///
/// Implemented by the reqwest and browser `fetch` adapters as well as the
/// callback-style mini-program adapter.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpMethod, RequestConfig, Transport};
///
/// async fn ping(transport: &dyn Transport) -> bridge_traits::error::Result<u16> {
///     let response = transport
///         .send(RequestConfig::new(HttpMethod::Get, "https://api.example.com/ping"))
///         .await?;
///     Ok(response.status)
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Transport: PlatformSendSync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn flavor(&self) -> TransportFlavor {
        TransportFlavor::Fetch
    }

    /// Execute a request and collect the whole response.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Aborted`] when the signal fires first,
    /// [`BridgeError::BadStatus`] when the transport validates statuses and
    /// rejects one, and [`BridgeError::Network`] for connection failures.
    async fn send(&self, request: RequestConfig) -> Result<RawResponse>;

    /// Execute a request and expose the body incrementally.
    async fn open_stream(&self, request: RequestConfig) -> Result<ByteStream> {
        let _ = request;
        Err(BridgeError::StreamUnavailable(format!(
            "{} does not expose a readable body",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("fetch".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_request_config_builder() {
        let token = CancellationToken::new();
        let request = RequestConfig::new(HttpMethod::Get, "https://example.com")
            .header("User-Agent", "test")
            .timeout(Duration::from_secs(30))
            .signal(token.clone());

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert!(request.body.is_empty());
        assert!(!request.is_aborted());

        token.cancel();
        assert!(request.is_aborted());
    }

    #[test]
    fn test_status_validation_defaults_to_2xx() {
        let mut request = RequestConfig::new(HttpMethod::Get, "/");
        assert!(request.accepts_status(204));
        assert!(!request.accepts_status(404));

        request.validate_status = Some(StatusValidator::accept_all());
        assert!(request.accepts_status(404));
    }

    #[test]
    fn test_multipart_builder_keeps_order() {
        let form = MultipartForm::new()
            .file(
                "file",
                FilePart::Blob {
                    file_name: "a.txt".into(),
                    content_type: None,
                    data: Bytes::from_static(b"a"),
                },
            )
            .text("fileId", "1");

        assert_eq!(form.parts.len(), 2);
        assert!(matches!(form.parts[1], MultipartField::Text { ref name, .. } if name == "fileId"));
    }

    #[test]
    fn test_raw_response_status_checks() {
        let response = RawResponse::json(200, json!({"code": 0}));
        assert!(response.is_success());
        assert!(!RawResponse::bytes(500, "oops").is_success());
    }
}
