//! WebAssembly implementation of the `Transport` bridge trait.
//!
//! Requests go through the browser's `fetch`. Cancellation is wired to an
//! `AbortController` whose `abort()` fires when the request's token is
//! cancelled; streaming bodies are read through a
//! `ReadableStreamDefaultReader`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{
        CredentialsMode, FilePart, MultipartField, MultipartForm, RawResponse, RequestBody,
        RequestConfig, RequestMode, ResponseBody, ResponseType, Transport, TransportFlavor,
    },
    platform::ByteStream,
};
use bytes::Bytes;
use futures::{
    future::{select, Either},
    pin_mut, stream,
};
use js_sys::{try_iter, Array, Reflect, Uint8Array};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AbortController, Blob, BlobPropertyBag, FormData, ReadableStreamDefaultReader, Request,
    RequestCredentials, RequestInit, Response, Window,
};

use crate::error::{js_error, WasmError};

/// WebAssembly transport backed by the browser's `fetch` API.
pub struct WasmFetchTransport {
    window: Window,
    flavor: TransportFlavor,
}

impl WasmFetchTransport {
    /// HTTP-client flavour: JSON decoding and status validation.
    pub fn http_client() -> BridgeResult<Self> {
        Self::with_flavor(TransportFlavor::HttpClient)
    }

    /// Raw `fetch` flavour: bytes for every status, streaming supported.
    pub fn fetch() -> BridgeResult<Self> {
        Self::with_flavor(TransportFlavor::Fetch)
    }

    fn with_flavor(flavor: TransportFlavor) -> BridgeResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".to_string()))?;
        Ok(Self { window, flavor })
    }

    fn build_request(
        &self,
        request: &RequestConfig,
        signal: Option<&web_sys::AbortSignal>,
    ) -> BridgeResult<Request> {
        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_mode(match request.mode {
            RequestMode::Cors => web_sys::RequestMode::Cors,
            RequestMode::NoCors => web_sys::RequestMode::NoCors,
        });
        init.set_credentials(match request.credentials {
            CredentialsMode::Omit => RequestCredentials::Omit,
            CredentialsMode::Include => RequestCredentials::Include,
        });

        if let Some(signal) = signal {
            init.set_signal(Some(signal));
        }

        let multipart = matches!(request.body, RequestBody::Multipart(_));
        let headers = web_sys::Headers::new().map_err(|err| js_error("create headers", err))?;
        for (key, value) in &request.headers {
            // The browser writes the boundary itself.
            if multipart && key.eq_ignore_ascii_case("content-type") {
                continue;
            }
            headers
                .set(key, value)
                .map_err(|err| js_error("set header", err))?;
        }
        init.set_headers(&headers);

        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Form(encoded) => init.set_body(&JsValue::from_str(encoded)),
            RequestBody::Json(value) => {
                let text = serde_json::to_string(value).map_err(WasmError::from)?;
                init.set_body(&JsValue::from_str(&text));
            }
            RequestBody::Multipart(form) => init.set_body(&build_form_data(form)?),
        }

        Request::new_with_str_and_init(&request.url, &init)
            .map_err(|err| js_error("build request", err))
    }

    /// Run `fetch`, aborting through the controller when the token fires.
    async fn dispatch(&self, request: &RequestConfig) -> BridgeResult<Response> {
        debug!(
            transport = self.name(),
            method = %request.method,
            url = %request.url,
            "Executing fetch request"
        );

        let controller = match &request.signal {
            Some(_) => Some(
                AbortController::new().map_err(|err| js_error("create abort controller", err))?,
            ),
            None => None,
        };
        let signal = controller.as_ref().map(|c| c.signal());
        let req = self.build_request(request, signal.as_ref())?;
        let fetch = JsFuture::from(self.window.fetch_with_request(&req));

        let result = match (&request.signal, controller) {
            (Some(token), Some(controller)) => {
                let cancelled = token.cancelled();
                pin_mut!(fetch);
                pin_mut!(cancelled);
                match select(fetch, cancelled).await {
                    Either::Left((response, _)) => response,
                    Either::Right((_, pending_fetch)) => {
                        controller.abort();
                        // Let the fetch observe the abort before returning.
                        let _ = pending_fetch.await;
                        return Err(BridgeError::Aborted);
                    }
                }
            }
            _ => fetch.await,
        };

        let js_value = result.map_err(|err| BridgeError::from(WasmError::from_fetch_rejection(err)))?;
        js_value
            .dyn_into::<Response>()
            .map_err(|_| BridgeError::OperationFailed("fetch returned non-Response".into()))
    }

    async fn read_body(response: &Response) -> BridgeResult<Bytes> {
        let promise = response
            .array_buffer()
            .map_err(|err| js_error("response.array_buffer", err))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|err| js_error("response buffer", err))?;
        Ok(Bytes::from(Uint8Array::new(&buffer).to_vec()))
    }

    fn collect_headers(response: &Response) -> BridgeResult<HashMap<String, String>> {
        let headers = response.headers();
        let iterator = try_iter(&JsValue::from(headers))
            .map_err(|err| js_error("iterate headers", err))?
            .ok_or_else(|| BridgeError::OperationFailed("Headers iterator unavailable".into()))?;

        let mut map = HashMap::new();
        for entry in iterator {
            let entry = entry.map_err(|err| js_error("header iteration", err))?;
            let pair = Array::from(&entry);
            if pair.length() >= 2 {
                if let (Some(key), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string())
                {
                    map.insert(key, value);
                }
            }
        }

        Ok(map)
    }

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
}

fn build_form_data(form: &MultipartForm) -> BridgeResult<FormData> {
    let data = FormData::new().map_err(|err| js_error("create form data", err))?;
    for field in &form.parts {
        match field {
            MultipartField::Text { name, value } => data
                .append_with_str(name, value)
                .map_err(|err| js_error("append form field", err))?,
            MultipartField::File {
                name,
                file:
                    FilePart::Blob {
                        file_name,
                        content_type,
                        data: bytes,
                    },
            } => {
                let parts = Array::of1(&Uint8Array::from(bytes.as_ref()));
                let options = BlobPropertyBag::new();
                if let Some(mime) = content_type {
                    options.set_type(mime);
                }
                let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
                    .map_err(|err| js_error("create blob", err))?;
                data.append_with_blob_and_filename(name, &blob, file_name)
                    .map_err(|err| js_error("append form file", err))?;
            }
            MultipartField::File {
                file: FilePart::Uri { uri, .. },
                ..
            } => {
                return Err(WasmError::Unsupported(format!(
                    "browser fetch cannot upload by uri: {uri}"
                ))
                .into());
            }
        }
    }
    Ok(data)
}

async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Option<BridgeResult<Bytes>> {
    let result = match JsFuture::from(reader.read()).await {
        Ok(result) => result,
        Err(err) => return Some(Err(BridgeError::from(WasmError::from_fetch_rejection(err)))),
    };
    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    if done {
        return None;
    }
    match Reflect::get(&result, &JsValue::from_str("value")) {
        Ok(value) => Some(Ok(Bytes::from(Uint8Array::new(&value).to_vec()))),
        Err(err) => Some(Err(js_error("read chunk", err))),
    }
}

#[async_trait(?Send)]
impl Transport for WasmFetchTransport {
    fn name(&self) -> &'static str {
        match self.flavor {
            TransportFlavor::HttpClient => "fetch-http-client",
            TransportFlavor::Fetch => "fetch",
        }
    }

    fn flavor(&self) -> TransportFlavor {
        self.flavor
    }

    async fn send(&self, request: RequestConfig) -> BridgeResult<RawResponse> {
        let response = self.dispatch(&request).await?;
        let headers = Self::collect_headers(&response)?;
        let bytes = Self::read_body(&response).await?;

        let body = match self.flavor {
            TransportFlavor::HttpClient => Self::decode_body(bytes, request.response_type),
            TransportFlavor::Fetch => ResponseBody::Bytes(bytes),
        };
        let raw = RawResponse {
            status: response.status(),
            status_text: response.status_text(),
            url: response.url(),
            headers,
            body,
        };

        if self.flavor == TransportFlavor::HttpClient && !request.accepts_status(raw.status) {
            warn!(status = raw.status, url = %request.url, "Status rejected by validator");
            return Err(BridgeError::bad_status(raw));
        }
        Ok(raw)
    }

    async fn open_stream(&self, request: RequestConfig) -> BridgeResult<ByteStream> {
        let response = self.dispatch(&request).await?;
        let body = response
            .body()
            .ok_or_else(|| BridgeError::StreamUnavailable("response has no body".into()))?;
        let reader = body
            .get_reader()
            .dyn_into::<ReadableStreamDefaultReader>()
            .map_err(|_| BridgeError::StreamUnavailable("reader unavailable".into()))?;

        let chunks = stream::unfold(reader, |reader| async move {
            let chunk = read_chunk(&reader).await?;
            Some((chunk, reader))
        });
        Ok(Box::pin(chunks))
    }
}
