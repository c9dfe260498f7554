//! End-to-end tests for the request pipeline over mocked transports.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    ByteStream, HttpMethod, KeyValueStorage, ManualClock, PlatformFeatures, RawResponse,
    RequestBody, RequestConfig, Transport,
};
use bytes::Bytes;
use core_request::{
    client::{Callback, Client, ErrorHandler},
    error::{ErrorCode, Failure, RequestError},
    log_queue::LogSnapshot,
    options::{ReqEnv, RequestOptions},
    payload::Payload,
};
use core_runtime::config::CoreConfig;
use futures::StreamExt;
use mockall::mock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mock! {
    Transport {}

    #[async_trait]
    impl Transport for Transport {
        fn name(&self) -> &'static str;
        async fn send(&self, request: RequestConfig) -> BridgeResult<RawResponse>;
    }
}

fn mock_transport() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.expect_name().return_const("mock");
    transport
}

fn client_with(transport: impl Transport + 'static) -> Client {
    client_sharing(Arc::new(transport))
}

fn client_sharing(transport: Arc<dyn Transport>) -> Client {
    let config = CoreConfig::builder()
        .http_client(transport)
        .features(PlatformFeatures::default())
        .build()
        .unwrap();
    Client::new(config)
}

fn ok(result: Value) -> BridgeResult<RawResponse> {
    Ok(RawResponse::json(200, json!({"code": 0, "result": result})))
}

/// Never answers before the abort signal fires; records the signal it saw.
struct Slow {
    delay: Duration,
    signals: Mutex<Vec<Option<core_async::CancellationToken>>>,
}

impl Slow {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            signals: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for Slow {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn send(&self, request: RequestConfig) -> BridgeResult<RawResponse> {
        self.signals.lock().unwrap().push(request.signal.clone());
        tokio::time::sleep(self.delay).await;
        ok(json!("late"))
    }
}

/// Applies `RequestConfig::timeout` itself, the way the native transports do.
struct SelfTimed {
    delay: Duration,
}

#[async_trait]
impl Transport for SelfTimed {
    fn name(&self) -> &'static str {
        "self-timed"
    }

    async fn send(&self, request: RequestConfig) -> BridgeResult<RawResponse> {
        let reply = tokio::time::sleep(self.delay);
        if request.timeout.is_zero() {
            reply.await;
        } else {
            tokio::time::timeout(request.timeout, reply)
                .await
                .map_err(|_| BridgeError::Timeout)?;
        }
        ok(json!("late"))
    }
}

#[derive(Default)]
struct MapStorage(Mutex<HashMap<String, String>>);

impl MapStorage {
    fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let storage = Self::default();
        for (key, value) in entries {
            storage.set_item(key, value).unwrap();
        }
        Arc::new(storage)
    }
}

impl KeyValueStorage for MapStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.0.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> BridgeResult<()> {
        self.0.lock().unwrap().remove(key);
        Ok(())
    }
}

#[tokio::test]
async fn test_get_drops_empty_params_from_query() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .withf(|request| request.url == "/api/list?b=2" && request.method == HttpMethod::Get)
        .times(1)
        .returning(|_| ok(json!([1, 2])));

    let client = client_with(transport);
    let options = RequestOptions::get().with_params(json!({"a": "", "b": 2, "c": null}));

    let payload = client.request("/api/list", options).await.unwrap();
    assert_eq!(payload.into_json(), Some(json!([1, 2])));
}

#[tokio::test]
async fn test_post_form_body() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .withf(|request| {
            request.url == "/api/save"
                && request.body == RequestBody::Form("name=a%20b&tags=1&tags=2".to_string())
        })
        .times(1)
        .returning(|_| ok(Value::Null));

    let client = client_with(transport);
    let options = RequestOptions::post().with_params(json!({"name": "a b", "tags": [1, 2]}));
    client.request("/api/save", options).await.unwrap();
}

#[tokio::test]
async fn test_cached_response_skips_transport() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| ok(json!({"rows": 3})));

    let client = client_with(transport);
    let options = || RequestOptions::get().with_params(json!({"id": 1})).with_cache(60_000);

    let first = client.request("/api/item", options()).await.unwrap();
    let second = client.request("/api/item", options()).await.unwrap();
    assert_eq!(first.into_json(), Some(json!({"rows": 3})));
    assert_eq!(second.into_json(), Some(json!({"rows": 3})));
}

#[tokio::test]
async fn test_cache_expires_with_clock() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(2)
        .returning(|_| ok(json!("fresh")));

    let clock = Arc::new(ManualClock::new(0));
    let config = CoreConfig::builder()
        .http_client(Arc::new(transport))
        .features(PlatformFeatures::default())
        .clock(clock.clone())
        .build()
        .unwrap();
    let client = Client::new(config);
    let options = || RequestOptions::get().with_cache(1_000);

    client.request("/api/ttl", options()).await.unwrap();
    clock.advance_millis(999);
    client.request("/api/ttl", options()).await.unwrap();
    clock.advance_millis(2);
    client.request("/api/ttl", options()).await.unwrap();
}

#[tokio::test]
async fn test_log_queue_keeps_latest_correlations() {
    let mut transport = mock_transport();
    transport.expect_send().times(3).returning(|_| ok(json!(1)));

    let persisted = Arc::new(Mutex::new(Vec::new()));
    let sink = persisted.clone();
    let client = client_with(transport);

    for url in ["/a", "/b", "/c"] {
        let sink = sink.clone();
        let options = RequestOptions::new()
            .with_cache_log(2)
            .with_cache_method(move |snapshot: &LogSnapshot| {
                sink.lock().unwrap().push(snapshot.len());
            });
        client.request(url, options).await.unwrap();
    }

    let snapshot = client.log_queue().unwrap().snapshot();
    assert_eq!(snapshot.len(), 2);
    let urls: Vec<Value> = snapshot
        .iter()
        .map(|(_, records)| records[0].payload.clone())
        .collect();
    assert_eq!(urls, vec![json!("/b"), json!("/c")]);

    let persisted = persisted.lock().unwrap();
    assert!(!persisted.is_empty());
    assert!(persisted.iter().all(|len| *len <= 2));
}

#[tokio::test]
async fn test_business_error_rejects_with_envelope() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(RawResponse::json(200, json!({"code": 1, "msg": "invalid"}))));

    let client = client_with(transport);
    let seen = Arc::new(Mutex::new(Vec::<Failure>::new()));
    let record = seen.clone();
    let handler: ErrorHandler = Arc::new(move |failure: &Failure, _: &RequestOptions| {
        record.lock().unwrap().push(failure.clone());
    });

    let err = client
        .request_with("/api/check", RequestOptions::new(), Some(handler), None)
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Business(_)));
    assert_eq!(err.code(), &ErrorCode::Numeric(1));
    assert_eq!(err.msg(), "invalid");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url, "/api/check");
    assert_eq!(seen[0].to_value()["msg"], json!("invalid"));
}

#[tokio::test]
async fn test_http_status_rejects_with_table_message() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(RawResponse::json(500, Value::Null)));

    let client = client_with(transport);
    let err = client.request("/api/fail", RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, RequestError::Status(_)));
    assert_eq!(err.failure().status, Some(500));
    assert!(!err.msg().is_empty());
}

#[tokio::test]
async fn test_transport_failure_is_transitional() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Err(BridgeError::Network("connection refused".into())));

    let client = client_with(transport);
    let err = client.request("/api/down", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.code(), &ErrorCode::Transitional);
}

#[tokio::test]
async fn test_timeout_rejects_with_code_20() {
    let transport = Slow::new(Duration::from_secs(5));
    let client = client_sharing(transport.clone());

    let started = Instant::now();
    let err = client
        .request(
            "/api/slow",
            RequestOptions::new().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(err.is_timeout());
    assert_eq!(err.code(), &ErrorCode::TIMEOUT);

    let signals = transport.signals.lock().unwrap();
    let token = signals[0].as_ref().unwrap();
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_rn_requests_have_no_timer() {
    let transport = Slow::new(Duration::from_millis(100));
    let config = CoreConfig::builder()
        .fetch(transport.clone())
        .features(PlatformFeatures::default())
        .build()
        .unwrap();
    let client = Client::new(config);

    let payload = client
        .request(
            "/api/slow",
            RequestOptions::new()
                .with_env(ReqEnv::Rn)
                .with_timeout(Duration::from_millis(10)),
        )
        .await
        .unwrap();
    assert_eq!(payload.into_json(), Some(json!("late")));
    assert!(transport.signals.lock().unwrap()[0].is_none());
}

#[tokio::test]
async fn test_rn_requests_clear_transport_timeout() {
    let config = CoreConfig::builder()
        .fetch(Arc::new(SelfTimed {
            delay: Duration::from_millis(200),
        }))
        .features(PlatformFeatures::default())
        .build()
        .unwrap();
    let client = Client::new(config);

    let payload = client
        .request(
            "/api/slow",
            RequestOptions::new()
                .with_env(ReqEnv::Rn)
                .with_timeout(Duration::from_millis(20)),
        )
        .await
        .unwrap();
    assert_eq!(payload.into_json(), Some(json!("late")));
}

#[tokio::test]
async fn test_jwt_attached_for_matching_url() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .withf(|request| request.headers.get("Authorization").map(String::as_str) == Some("jwt-1"))
        .times(1)
        .returning(|_| ok(Value::Null));
    transport
        .expect_send()
        .withf(|request| !request.headers.contains_key("Authorization"))
        .times(1)
        .returning(|_| ok(Value::Null));

    let config = CoreConfig::builder()
        .http_client(Arc::new(transport))
        .features(PlatformFeatures::default())
        .session_storage(MapStorage::with(&[("tokenUrl", "/secure")]))
        .local_storage(MapStorage::with(&[("jwtToken", "jwt-1")]))
        .build()
        .unwrap();
    let client = Client::new(config);

    client.request("/secure/me", RequestOptions::new()).await.unwrap();
    client.request("/public/list", RequestOptions::new()).await.unwrap();
}

#[tokio::test]
async fn test_null_replacement_applies_to_result() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| ok(json!({"name": null, "items": [{"title": ""}]})));

    let client = client_with(transport);
    let payload = client
        .request("/api/detail", RequestOptions::new().with_null_replace("--"))
        .await
        .unwrap();

    assert_eq!(
        payload.into_json(),
        Some(json!({"name": "--", "items": [{"title": "--"}]}))
    );
}

#[tokio::test]
async fn test_file_download_skips_business_check() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(RawResponse::bytes(200, Bytes::from_static(b"PK\x03\x04"))));

    let client = client_with(transport);
    let payload = client
        .request("/api/export", RequestOptions::get().file_download())
        .await
        .unwrap();
    assert_eq!(payload.into_bytes(), Some(Bytes::from_static(b"PK\x03\x04")));
}

#[tokio::test]
async fn test_callback_result_resolves_request() {
    let mut transport = mock_transport();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(RawResponse::json(200, json!({"code": 5}))));

    let client = client_with(transport);
    let callback: Callback = Arc::new(|_| Payload::Json(json!("handled")));
    let payload = client
        .request_with("/api/raw", RequestOptions::new(), None, Some(callback))
        .await
        .unwrap();
    assert_eq!(payload.into_json(), Some(json!("handled")));
}

struct Events;

#[async_trait]
impl Transport for Events {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn send(&self, _request: RequestConfig) -> BridgeResult<RawResponse> {
        Err(BridgeError::OperationFailed("streaming only".into()))
    }

    async fn open_stream(&self, _request: RequestConfig) -> BridgeResult<ByteStream> {
        let chunks: Vec<BridgeResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: \xE2\x9C")),
            Ok(Bytes::from_static(b"\x93\n\n")),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[tokio::test]
async fn test_sse_returns_reencoded_stream() {
    let client = client_with(Events);
    let payload = client
        .request("/api/events", RequestOptions::sse())
        .await
        .unwrap();

    let stream = payload.into_stream().unwrap();
    let text: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(text.concat(), "data: \u{2713}\n\n".as_bytes());
}
