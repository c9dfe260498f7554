//! Transport Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{
        CredentialsMode, FilePart, HttpMethod, MultipartField, MultipartForm, RawResponse, RequestBody,
        RequestConfig, ResponseBody, ResponseType, Transport, TransportFlavor,
    },
    platform::ByteStream,
    storage::CookieStore,
};
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{multipart, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reqwest-based transport
///
/// Comes in two flavours:
/// - [`ReqwestHttpClient::new`] behaves like a browser HTTP client: it
///   decodes JSON bodies itself and rejects statuses the request's
///   validator refuses.
/// - [`ReqwestHttpClient::fetch`] behaves like raw `fetch`: every status
///   resolves and the body is handed back as bytes. This flavour also
///   exposes streaming bodies.
///
/// With a cookie store attached, requests in credential mode carry the
/// jar as a `Cookie` header unless the request already sets one.
pub struct ReqwestHttpClient {
    client: Client,
    flavor: TransportFlavor,
    cookies: Option<Arc<dyn CookieStore>>,
}

impl ReqwestHttpClient {
    /// HTTP-client flavour with default configuration
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Self::build_client()?, TransportFlavor::HttpClient))
    }

    /// Raw-fetch flavour with default configuration
    pub fn fetch() -> Result<Self> {
        Ok(Self::with_client(Self::build_client()?, TransportFlavor::Fetch))
    }

    /// Wrap a pre-configured reqwest client
    pub fn with_client(client: Client, flavor: TransportFlavor) -> Self {
        Self {
            client,
            flavor,
            cookies: None,
        }
    }

    /// Share a cookie jar for credentialed requests
    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    fn credential_cookies(&self, request: &RequestConfig) -> Option<String> {
        if request.credentials != CredentialsMode::Include {
            return None;
        }
        if request
            .headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case("cookie"))
        {
            return None;
        }
        self.cookies.as_ref()?.cookie_header()
    }

    fn build_client() -> Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("unireq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Trace => reqwest::Method::TRACE,
        }
    }

    fn map_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout
        } else {
            BridgeError::Network(e.to_string())
        }
    }

    /// Build reqwest request from the resolved config
    async fn build_request(&self, request: &RequestConfig) -> Result<reqwest::RequestBuilder> {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);
        let multipart = matches!(request.body, RequestBody::Multipart(_));

        for (key, value) in &request.headers {
            // reqwest writes its own boundary
            if multipart
                && key.eq_ignore_ascii_case("content-type")
                && value.to_ascii_lowercase().starts_with("multipart/form-data")
            {
                continue;
            }
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(cookies) = self.credential_cookies(request) {
            req = req.header(reqwest::header::COOKIE, cookies);
        }

        req = match &request.body {
            RequestBody::Empty => req,
            RequestBody::Form(encoded) => req.body(encoded.clone()),
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(value).map_err(|e| {
                    BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
                })?;
                req.body(bytes)
            }
            RequestBody::Multipart(form) => req.multipart(Self::build_form(form).await?),
        };

        if !request.timeout.is_zero() {
            req = req.timeout(request.timeout);
        }

        Ok(req)
    }

    async fn build_form(form: &MultipartForm) -> Result<multipart::Form> {
        let mut out = multipart::Form::new();
        for field in &form.parts {
            out = match field {
                MultipartField::Text { name, value } => out.text(name.clone(), value.clone()),
                MultipartField::File { name, file } => {
                    out.part(name.clone(), Self::build_part(file).await?)
                }
            };
        }
        Ok(out)
    }

    async fn build_part(file: &FilePart) -> Result<multipart::Part> {
        let (data, file_name, content_type) = match file {
            FilePart::Blob {
                file_name,
                content_type,
                data,
            } => (data.to_vec(), file_name.clone(), content_type.clone()),
            FilePart::Uri {
                uri,
                name,
                content_type,
            } => {
                let path = uri.strip_prefix("file://").unwrap_or(uri);
                let data = tokio::fs::read(path).await?;
                (data, name.clone(), Some(content_type.clone()))
            }
        };

        let part = multipart::Part::bytes(data).file_name(file_name);
        match content_type {
            Some(mime) => part
                .mime_str(&mime)
                .map_err(|e| BridgeError::OperationFailed(format!("Invalid content type: {}", e))),
            None => Ok(part),
        }
    }

    /// Decode a collected body the way an HTTP client would: JSON when it
    /// parses, the text otherwise, `null` when empty.
    fn decode_body(bytes: Bytes, response_type: ResponseType) -> ResponseBody {
        if response_type != ResponseType::Json {
            return ResponseBody::Bytes(bytes);
        }
        if bytes.is_empty() {
            return ResponseBody::Json(Value::Null);
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Json(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }

    async fn dispatch(&self, request: &RequestConfig) -> Result<reqwest::Response> {
        debug!(
            transport = self.name(),
            method = %request.method,
            url = %request.url,
            "Executing HTTP request"
        );

        let pending = async {
            self.build_request(request)
                .await?
                .send()
                .await
                .map_err(Self::map_error)
        };

        match &request.signal {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(BridgeError::Aborted),
                result = pending => result,
            },
            None => pending.await,
        }
    }

    async fn collect(&self, request: &RequestConfig, response: reqwest::Response) -> Result<RawResponse> {
        let status = response.status();
        let url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let bytes = match &request.signal {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(BridgeError::Aborted),
                body = response.bytes() => body.map_err(Self::map_error)?,
            },
            None => response.bytes().await.map_err(Self::map_error)?,
        };

        let body = match self.flavor {
            TransportFlavor::HttpClient => Self::decode_body(bytes, request.response_type),
            TransportFlavor::Fetch => ResponseBody::Bytes(bytes),
        };

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestHttpClient {
    fn name(&self) -> &'static str {
        match self.flavor {
            TransportFlavor::HttpClient => "reqwest-http-client",
            TransportFlavor::Fetch => "reqwest-fetch",
        }
    }

    fn flavor(&self) -> TransportFlavor {
        self.flavor
    }

    async fn send(&self, request: RequestConfig) -> Result<RawResponse> {
        let response = self.dispatch(&request).await?;
        let raw = self.collect(&request, response).await?;

        if self.flavor == TransportFlavor::HttpClient && !request.accepts_status(raw.status) {
            warn!(status = raw.status, url = %request.url, "Status rejected by validator");
            return Err(BridgeError::bad_status(raw));
        }

        Ok(raw)
    }

    async fn open_stream(&self, request: RequestConfig) -> Result<ByteStream> {
        let response = self.dispatch(&request).await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), url = %request.url, "Streaming request returned non-2xx status");
        }

        let body = response.bytes_stream().map_err(Self::map_error);
        match request.signal {
            Some(token) => Ok(Box::pin(body.take_until(token.cancelled_owned()))),
            None => Ok(Box::pin(body)),
        }
    }
}
