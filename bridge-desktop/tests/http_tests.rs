//! Integration tests for the reqwest transport against a loopback server.

use bridge_desktop::{MemoryCookieJar, ReqwestHttpClient};
use bridge_traits::{
    error::BridgeError,
    http::{
        CredentialsMode, HttpMethod, RequestBody, RequestConfig, ResponseBody, StatusValidator, Transport,
    },
    storage::CookieStore,
    StatusCategory,
};
use core_async::CancellationToken;
use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve exactly one request with the given status line and body, handing the
/// raw request text back to the test.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });

    (format!("http://{}", addr), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

#[tokio::test]
async fn test_http_client_decodes_json() {
    let (base, seen) = serve_once("200 OK", r#"{"code":0,"result":[1,2]}"#).await;
    let client = ReqwestHttpClient::new().unwrap();

    let request = RequestConfig::new(HttpMethod::Post, format!("{}/api/list", base))
        .header("Content-Type", "application/json;charset=utf-8")
        .body(RequestBody::Json(json!({"page": 1})));
    let response = client.send(request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, ResponseBody::Json(json!({"code": 0, "result": [1, 2]})));

    let raw_request = seen.await.unwrap();
    assert!(raw_request.starts_with("POST /api/list"));
    assert!(raw_request.ends_with(r#"{"page":1}"#));
}

#[tokio::test]
async fn test_http_client_rejects_invalid_status() {
    let (base, _seen) = serve_once("404 Not Found", r#"{"msg":"missing"}"#).await;
    let client = ReqwestHttpClient::new().unwrap();

    let err = client
        .send(RequestConfig::new(HttpMethod::Get, base))
        .await
        .unwrap_err();

    match err {
        BridgeError::BadStatus {
            status,
            category,
            response,
        } => {
            assert_eq!(status, 404);
            assert_eq!(category, StatusCategory::BadRequest);
            assert_eq!(response.body, ResponseBody::Json(json!({"msg": "missing"})));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_client_honours_accept_all_validator() {
    let (base, _seen) = serve_once("500 Internal Server Error", "{}").await;
    let client = ReqwestHttpClient::new().unwrap();

    let mut request = RequestConfig::new(HttpMethod::Get, base);
    request.validate_status = Some(StatusValidator::accept_all());
    let response = client.send(request).await.unwrap();

    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn test_fetch_flavour_returns_bytes_for_any_status() {
    let (base, _seen) = serve_once("502 Bad Gateway", r#"{"code":1}"#).await;
    let client = ReqwestHttpClient::fetch().unwrap();

    let response = client
        .send(RequestConfig::new(HttpMethod::Get, base))
        .await
        .unwrap();

    assert_eq!(response.status, 502);
    assert!(matches!(response.body, ResponseBody::Bytes(ref b) if b.as_ref() == br#"{"code":1}"#));
}

#[tokio::test]
async fn test_fetch_flavour_streams_body() {
    let (base, _seen) = serve_once("200 OK", "data: hello\n\n").await;
    let client = ReqwestHttpClient::fetch().unwrap();

    let mut stream = client
        .open_stream(RequestConfig::new(HttpMethod::Post, base))
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(collected, b"data: hello\n\n");
}

#[tokio::test]
async fn test_cancellation_aborts_pending_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hold the connection without ever answering.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let client = ReqwestHttpClient::new().unwrap();
    let token = CancellationToken::new();
    let request = RequestConfig::new(HttpMethod::Get, format!("http://{}", addr))
        .timeout(Duration::from_secs(30))
        .signal(token.clone());

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = client.send(request).await.unwrap_err();
    assert!(matches!(err, BridgeError::Aborted));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_credentialed_request_carries_cookie_jar() {
    let (base, seen) = serve_once("200 OK", r#"{"code":0}"#).await;
    let jar = Arc::new(MemoryCookieJar::new());
    jar.write("sid", "abc").unwrap();
    let client = ReqwestHttpClient::fetch().unwrap().with_cookie_store(jar);

    let mut request = RequestConfig::new(HttpMethod::Get, format!("{}/api", base));
    request.credentials = CredentialsMode::Include;
    client.send(request).await.unwrap();

    let raw_request = seen.await.unwrap().to_ascii_lowercase();
    assert!(raw_request.starts_with("get /api"));
    assert!(raw_request.contains("cookie: sid=abc\r\n"));
}

#[tokio::test]
async fn test_uncredentialed_request_omits_cookie_jar() {
    let (base, seen) = serve_once("200 OK", r#"{"code":0}"#).await;
    let jar = Arc::new(MemoryCookieJar::new());
    jar.write("sid", "abc").unwrap();
    let client = ReqwestHttpClient::fetch().unwrap().with_cookie_store(jar);

    client
        .send(RequestConfig::new(HttpMethod::Get, format!("{}/api", base)))
        .await
        .unwrap();

    let raw_request = seen.await.unwrap().to_ascii_lowercase();
    assert!(!raw_request.contains("cookie:"));
}
