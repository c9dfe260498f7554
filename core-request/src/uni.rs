//! # Mini-Program Transport
//!
//! Adapts a callback-style mini-program request primitive (`uni.request`
//! and friends) to the common [`Transport`] interface. The primitive reports
//! through `success` / `fail` / `complete` callbacks; the adapter settles a
//! oneshot channel from whichever of `success` or `fail` fires first and
//! awaits it, racing the request's abort signal.
//!
//! Status handling follows the HTTP-client contract:
//! - non-2xx ⇒ `BadStatus` categorized `ERR_BAD_RESPONSE`
//! - 2xx refused by the request's validator ⇒ `BadStatus` categorized by
//!   status (`ERR_BAD_REQUEST` for 4xx, `ERR_BAD_RESPONSE` otherwise)

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    PlatformSendSync, RawResponse, RequestBody, RequestConfig, ResponseBody, ResponseType,
    StatusCategory, Transport, TransportFlavor,
};
use core_async::sync::oneshot;
use futures::future::{select, Either};
use futures::pin_mut;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Options handed to the primitive, shaped like `uni.request`'s argument.
#[derive(Debug, Clone, PartialEq)]
pub struct UniRequestOptions {
    /// Uppercase HTTP verb
    pub method: String,
    pub url: String,
    pub header: HashMap<String, String>,
    pub data: Value,
    /// `text` or `arraybuffer`
    pub response_type: &'static str,
    pub timeout_ms: u64,
}

/// What the primitive passes to `success`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniResponse {
    pub status_code: u16,
    pub data: ResponseBody,
    pub header: HashMap<String, String>,
    pub err_msg: String,
}

/// What the primitive passes to `fail`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniFailure {
    pub err_msg: String,
}

#[cfg(not(target_arch = "wasm32"))]
type Callback<T> = Box<dyn FnOnce(T) + Send>;
#[cfg(target_arch = "wasm32")]
type Callback<T> = Box<dyn FnOnce(T)>;

/// Callbacks the primitive must invoke. `success` or `fail` settles the
/// request; `complete` is informational.
pub struct UniCallbacks {
    pub success: Callback<UniResponse>,
    pub fail: Callback<UniFailure>,
    pub complete: Callback<()>,
}

/// Callback-style request primitive provided by the mini-program host.
pub trait MiniProgramPrimitive: PlatformSendSync {
    fn request(&self, options: UniRequestOptions, callbacks: UniCallbacks);
}

type Settlement = Result<UniResponse, UniFailure>;

/// [`Transport`] over a [`MiniProgramPrimitive`].
pub struct UniTransport<P> {
    primitive: P,
}

impl<P: MiniProgramPrimitive> UniTransport<P> {
    pub fn new(primitive: P) -> Self {
        Self { primitive }
    }

    fn build_options(request: &RequestConfig) -> BridgeResult<UniRequestOptions> {
        let data = match &request.body {
            RequestBody::Empty => Value::Null,
            RequestBody::Form(encoded) => Value::String(encoded.clone()),
            RequestBody::Json(value) => value.clone(),
            RequestBody::Multipart(_) => {
                return Err(BridgeError::NotAvailable(
                    "multipart uploads over the mini-program request primitive".to_string(),
                ))
            }
        };
        Ok(UniRequestOptions {
            method: request.method.as_str().to_uppercase(),
            url: request.url.clone(),
            header: request.headers.clone(),
            data,
            response_type: match request.response_type {
                ResponseType::Json => "text",
                ResponseType::Blob | ResponseType::Stream => "arraybuffer",
            },
            timeout_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    fn settle(request: &RequestConfig, response: UniResponse) -> BridgeResult<RawResponse> {
        let raw = RawResponse {
            status: response.status_code,
            status_text: response.err_msg,
            url: request.url.clone(),
            headers: response.header,
            body: response.data,
        };

        if !raw.is_success() {
            warn!(status = raw.status, url = %request.url, "Mini-program request returned non-2xx status");
            return Err(BridgeError::BadStatus {
                status: raw.status,
                category: StatusCategory::BadResponse,
                response: Box::new(raw),
            });
        }
        if !request.accepts_status(raw.status) {
            return Err(BridgeError::bad_status(raw));
        }
        Ok(raw)
    }
}

fn callbacks() -> (UniCallbacks, oneshot::Receiver<Settlement>) {
    let (tx, rx) = oneshot::channel::<Settlement>();
    let slot = Arc::new(Mutex::new(Some(tx)));
    let fail_slot = slot.clone();

    let callbacks = UniCallbacks {
        success: Box::new(move |response| {
            if let Some(tx) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                let _ = tx.send(Ok(response));
            }
        }),
        fail: Box::new(move |failure| {
            if let Some(tx) = fail_slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                let _ = tx.send(Err(failure));
            }
        }),
        complete: Box::new(|()| debug!("Mini-program request completed")),
    };
    (callbacks, rx)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<P: MiniProgramPrimitive> Transport for UniTransport<P> {
    fn name(&self) -> &'static str {
        "uni-request"
    }

    fn flavor(&self) -> TransportFlavor {
        TransportFlavor::HttpClient
    }

    async fn send(&self, request: RequestConfig) -> BridgeResult<RawResponse> {
        let options = Self::build_options(&request)?;
        debug!(method = %options.method, url = %options.url, "Dispatching mini-program request");

        let (callbacks, rx) = callbacks();
        self.primitive.request(options, callbacks);

        let settled = match &request.signal {
            Some(token) => {
                let cancelled = token.cancelled();
                pin_mut!(cancelled);
                match select(rx, cancelled).await {
                    Either::Left((settled, _)) => settled,
                    Either::Right(_) => return Err(BridgeError::Aborted),
                }
            }
            None => rx.await,
        };

        match settled {
            Ok(Ok(response)) => Self::settle(&request, response),
            Ok(Err(failure)) => Err(BridgeError::Network(failure.err_msg)),
            Err(_) => Err(BridgeError::OperationFailed(
                "mini-program primitive dropped its callbacks".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{HttpMethod, StatusValidator};
    use core_async::CancellationToken;
    use serde_json::json;
    use std::time::Duration;

    /// Answers every request synchronously with a fixed status and body.
    struct Immediate {
        status: u16,
        body: Value,
        seen: Mutex<Vec<UniRequestOptions>>,
    }

    impl Immediate {
        fn new(status: u16, body: Value) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl MiniProgramPrimitive for Immediate {
        fn request(&self, options: UniRequestOptions, callbacks: UniCallbacks) {
            self.seen.lock().unwrap().push(options);
            (callbacks.success)(UniResponse {
                status_code: self.status,
                data: ResponseBody::Json(self.body.clone()),
                header: HashMap::new(),
                err_msg: "request:ok".into(),
            });
            (callbacks.complete)(());
        }
    }

    struct Failing;

    impl MiniProgramPrimitive for Failing {
        fn request(&self, _options: UniRequestOptions, callbacks: UniCallbacks) {
            (callbacks.fail)(UniFailure {
                err_msg: "request:fail timeout".into(),
            });
        }
    }

    /// Keeps the callbacks alive without ever calling them.
    struct Silent(Mutex<Vec<UniCallbacks>>);

    impl MiniProgramPrimitive for Silent {
        fn request(&self, _options: UniRequestOptions, callbacks: UniCallbacks) {
            self.0.lock().unwrap().push(callbacks);
        }
    }

    #[tokio::test]
    async fn test_success_resolves_with_body() {
        let transport = UniTransport::new(Immediate::new(200, json!({"code": 0})));
        let request = RequestConfig::new(HttpMethod::Post, "https://api.test/x")
            .body(RequestBody::Json(json!({"a": 1})));

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, ResponseBody::Json(json!({"code": 0})));

        let seen = transport.primitive.seen.lock().unwrap();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].data, json!({"a": 1}));
        assert_eq!(seen[0].response_type, "text");
    }

    #[tokio::test]
    async fn test_non_2xx_is_bad_response() {
        let transport = UniTransport::new(Immediate::new(404, json!({})));
        let err = transport
            .send(RequestConfig::new(HttpMethod::Get, "/x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BadStatus { status: 404, category: StatusCategory::BadResponse, .. }
        ));
    }

    #[tokio::test]
    async fn test_validator_rejection_is_categorized() {
        let transport = UniTransport::new(Immediate::new(204, Value::Null));
        let mut request = RequestConfig::new(HttpMethod::Get, "/x");
        request.validate_status = Some(StatusValidator::new(|status| status == 200));

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::BadStatus { status: 204, category: StatusCategory::BadResponse, .. }
        ));
    }

    #[tokio::test]
    async fn test_fail_callback_is_network_error() {
        let transport = UniTransport::new(Failing);
        let err = transport
            .send(RequestConfig::new(HttpMethod::Get, "/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Network(ref msg) if msg.contains("timeout")));
    }

    #[tokio::test]
    async fn test_abort_signal_settles_pending_request() {
        let transport = UniTransport::new(Silent(Mutex::new(Vec::new())));
        let token = CancellationToken::new();
        let request = RequestConfig::new(HttpMethod::Get, "/x").signal(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, BridgeError::Aborted));
    }

    #[tokio::test]
    async fn test_multipart_is_not_supported() {
        let transport = UniTransport::new(Immediate::new(200, Value::Null));
        let request = RequestConfig::new(HttpMethod::Post, "/upload")
            .body(RequestBody::Multipart(Default::default()));
        assert!(matches!(
            transport.send(request).await.unwrap_err(),
            BridgeError::NotAvailable(_)
        ));
    }
}
