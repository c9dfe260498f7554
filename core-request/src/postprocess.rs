//! # Response Postprocessor
//!
//! Two stages run on every dispatched (non-streaming) response:
//!
//! 1. **Status check**: 2xx passes the decoded body on; anything else
//!    rejects with a normalized [`Failure`] built from the status table.
//! 2. **Business check** (skipped in download mode): the body is read as a
//!    `{code, msg?, errmsg?, result?}` envelope. `code == 0` resolves with
//!    `result` (writing the cache when enabled); any other code rejects.
//!
//! Successful results are then scrubbed according to the request's
//! [`ResponsePolicy`].

use bridge_traits::{BridgeError, RawResponse, ResponseBody};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::RequestCache;
use crate::error::{ErrorCode, Failure, RequestError, Result};
use crate::preprocess::ResponsePolicy;
use crate::scrub::{replace_empty, replace_fields_empty, DEFAULT_PLACEHOLDER};
use crate::status::{http_status_message, status_message};

/// Body that passed the status check.
#[derive(Debug, Clone, PartialEq)]
pub enum Checked {
    Json(Value),
    Binary(Bytes),
}

/// Decode a response body into JSON. Empty bodies are `null`; bodies that
/// are not JSON become a string.
pub fn parse_body(body: &ResponseBody) -> Value {
    match body {
        ResponseBody::Json(value) => value.clone(),
        ResponseBody::Bytes(bytes) if bytes.is_empty() => Value::Null,
        ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Failure for a response whose HTTP status was rejected.
pub fn status_failure(raw: &RawResponse, url: &str) -> Failure {
    let body = parse_body(&raw.body);
    let table = http_status_message(raw.status);
    let message = format!("Request failed with status code {}", raw.status);
    let msg = non_empty_str(&body, "msg")
        .map(str::to_string)
        .or_else(|| table.map(str::to_string))
        .unwrap_or_else(|| message.clone());
    let status_text = table
        .map(str::to_string)
        .unwrap_or_else(|| raw.status_text.clone());

    Failure {
        msg,
        message,
        url: url.to_string(),
        status: Some(i64::from(raw.status)),
        code: ErrorCode::Numeric(i64::from(raw.status)),
        status_text,
        body: (!body.is_null()).then_some(body),
    }
}

/// Stage one: HTTP status.
pub fn check_status(raw: &RawResponse, url: &str, is_file: bool) -> Result<Checked> {
    if !raw.is_success() {
        warn!(status = raw.status, url, "Response status rejected");
        return Err(RequestError::Status(status_failure(raw, url)));
    }

    if is_file {
        let bytes = match &raw.body {
            ResponseBody::Bytes(bytes) => bytes.clone(),
            ResponseBody::Json(value) => Bytes::from(value.to_string()),
        };
        return Ok(Checked::Binary(bytes));
    }
    Ok(Checked::Json(parse_body(&raw.body)))
}

/// Stage two: business envelope.
pub fn check_business(
    data: Value,
    url: &str,
    policy: &ResponsePolicy,
    cache: &RequestCache,
) -> Result<Value> {
    let code = data
        .get("code")
        .and_then(ErrorCode::from_envelope)
        .or_else(|| data.get("status").and_then(ErrorCode::from_envelope));

    let Some(code) = code else {
        let missing = ErrorCode::Numeric(504);
        let msg = status_message(&missing).unwrap_or_default().to_string();
        warn!(url, "Response carried no business envelope");
        return Err(RequestError::Business(
            Failure {
                msg: msg.clone(),
                message: msg.clone(),
                url: url.to_string(),
                status: Some(504),
                code: missing,
                status_text: msg.clone(),
                body: None,
            }
            .with_body(json!({"code": 504, "msg": msg})),
        ));
    };

    if code == ErrorCode::Numeric(0) {
        let result = data.get("result").cloned().unwrap_or(Value::Null);
        if let Some(key) = &policy.cache_key {
            debug!(key, ttl_ms = policy.cache_ttl_ms, "Caching business result");
            cache.set(key.clone(), result.clone(), policy.cache_ttl_ms);
        }
        return Ok(result);
    }

    let msg = non_empty_str(&data, "msg")
        .or_else(|| non_empty_str(&data, "errmsg"))
        .or_else(|| status_message(&code))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with code {}", code));
    let status = data
        .get("code")
        .and_then(Value::as_i64)
        .or_else(|| data.get("status").and_then(Value::as_i64))
        .or_else(|| code.as_number());
    let status_text = data
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    warn!(url, code = %code, msg = %msg, "Business error");
    Err(RequestError::Business(Failure {
        message: msg.clone(),
        msg,
        url: url.to_string(),
        status,
        code,
        status_text,
        body: Some(data),
    }))
}

/// Map a transport failure onto the normalized shape: aborts and timeouts
/// become code `20`, connection-level failures `transitional`, and statuses
/// the transport refused go through the status table. Code `20` and
/// `transitional` carry their table message; the cause is only logged.
pub fn normalize_bridge_error(err: BridgeError, url: &str) -> RequestError {
    match err {
        BridgeError::Aborted | BridgeError::Timeout => {
            debug!(url, cause = %err, "Request aborted");
            RequestError::Timeout(Failure::from_code(ErrorCode::TIMEOUT, url))
        }
        BridgeError::BadStatus { response, .. } => {
            RequestError::Status(status_failure(&response, url))
        }
        BridgeError::StreamUnavailable(reason) => RequestError::Stream(
            Failure::from_code(ErrorCode::Network, url).with_message(reason),
        ),
        BridgeError::NotAvailable(capability) => RequestError::capability(url, capability),
        BridgeError::Network(_) | BridgeError::OperationFailed(_) | BridgeError::Io(_) => {
            warn!(url, cause = %err, "Transport failure");
            RequestError::Transport(Failure::from_code(ErrorCode::Transitional, url))
        }
    }
}

/// Apply the policy's null replacement and field scrubbing to a result.
pub fn scrub(mut value: Value, policy: &ResponsePolicy) -> Value {
    if let Some(replacement) = &policy.res_null_replace {
        replace_empty(&mut value, replacement);
    }
    if !policy.res_replace_field.is_empty() {
        let replacement = policy
            .res_null_replace
            .as_deref()
            .unwrap_or(DEFAULT_PLACEHOLDER);
        replace_fields_empty(&mut value, &policy.res_replace_field, replacement);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;
    use std::sync::Arc;

    fn policy() -> ResponsePolicy {
        ResponsePolicy {
            is_file: false,
            cache_key: None,
            cache_ttl_ms: 30_000,
            res_null_replace: None,
            res_replace_field: Vec::new(),
            error_continue: false,
            show_log: false,
        }
    }

    fn cache() -> RequestCache {
        RequestCache::new(Arc::new(ManualClock::new(0)))
    }

    #[test]
    fn test_status_check_parses_bytes() {
        let raw = RawResponse::bytes(200, Bytes::from_static(br#"{"code":0,"result":1}"#));
        assert_eq!(
            check_status(&raw, "/x", false).unwrap(),
            Checked::Json(json!({"code": 0, "result": 1}))
        );

        let raw = RawResponse::bytes(200, Bytes::new());
        assert_eq!(check_status(&raw, "/x", false).unwrap(), Checked::Json(Value::Null));
    }

    #[test]
    fn test_status_check_download_mode() {
        let raw = RawResponse::bytes(200, Bytes::from_static(b"\x89PNG"));
        assert_eq!(
            check_status(&raw, "/f", true).unwrap(),
            Checked::Binary(Bytes::from_static(b"\x89PNG"))
        );
    }

    #[test]
    fn test_status_failure_prefers_body_msg() {
        let raw = RawResponse::json(500, json!({"msg": "db down"}));
        let failure = check_status(&raw, "/x", false).unwrap_err().into_failure();
        assert_eq!(failure.msg, "db down");
        assert_eq!(failure.code, ErrorCode::Numeric(500));
        assert_eq!(failure.status, Some(500));
        assert_eq!(failure.status_text, http_status_message(500).unwrap());

        let raw = RawResponse::json(404, Value::Null);
        let failure = check_status(&raw, "/x", false).unwrap_err().into_failure();
        assert_eq!(failure.msg, http_status_message(404).unwrap());
    }

    #[test]
    fn test_business_success_returns_result_and_caches() {
        let cache = cache();
        let policy = ResponsePolicy {
            cache_key: Some("k".into()),
            cache_ttl_ms: 1_000,
            ..policy()
        };
        let result = check_business(json!({"code": "0", "result": [1]}), "/x", &policy, &cache);
        assert_eq!(result.unwrap(), json!([1]));
        assert_eq!(cache.get("k"), Some(json!([1])));
    }

    #[test]
    fn test_business_error_shape() {
        let err = check_business(json!({"code": 1, "msg": "invalid"}), "/x", &policy(), &cache())
            .unwrap_err();
        assert!(matches!(err, RequestError::Business(_)));
        let value = err.failure().to_value();
        assert_eq!(value["code"], json!(1));
        assert_eq!(value["msg"], json!("invalid"));
        assert_eq!(value["url"], json!("/x"));
    }

    #[test]
    fn test_fractional_code_is_a_business_error() {
        let data = json!({"code": 0.5, "msg": "half", "result": "leak"});
        let err = check_business(data, "/x", &policy(), &cache()).unwrap_err();
        assert!(matches!(err, RequestError::Business(_)));
        assert_eq!(err.msg(), "half");
        assert_eq!(err.code(), &ErrorCode::Other("0.5".into()));
    }

    #[test]
    fn test_business_error_falls_back_to_errmsg() {
        let err = check_business(json!({"code": 40001, "errmsg": "bad token"}), "/x", &policy(), &cache())
            .unwrap_err();
        assert_eq!(err.msg(), "bad token");
        assert_eq!(err.failure().status_text, "");
    }

    #[test]
    fn test_missing_envelope_is_504() {
        let err = check_business(Value::Null, "/x", &policy(), &cache()).unwrap_err();
        assert_eq!(err.code(), &ErrorCode::Numeric(504));
        assert!(!err.msg().is_empty());
    }

    #[test]
    fn test_bridge_errors_are_normalized() {
        let err = normalize_bridge_error(BridgeError::Aborted, "/x");
        assert!(err.is_timeout());
        assert_eq!(err.code(), &ErrorCode::TIMEOUT);

        let err = normalize_bridge_error(BridgeError::Network("connection refused".into()), "/x");
        assert_eq!(err.code(), &ErrorCode::Transitional);
        assert_eq!(
            err.failure().message,
            status_message(&ErrorCode::Transitional).unwrap()
        );

        let err = normalize_bridge_error(
            BridgeError::bad_status(RawResponse::json(401, Value::Null)),
            "/x",
        );
        assert!(matches!(err, RequestError::Status(_)));
        assert_eq!(err.code(), &ErrorCode::Numeric(401));
    }

    #[test]
    fn test_scrub_applies_policy() {
        let policy = ResponsePolicy {
            res_null_replace: Some("N/A".into()),
            res_replace_field: vec!["title".into()],
            ..policy()
        };
        assert_eq!(
            scrub(json!({"name": null, "title": ""}), &policy),
            json!({"name": "N/A", "title": "N/A"})
        );

        let policy = ResponsePolicy {
            res_replace_field: vec!["title".into()],
            ..super::tests::policy()
        };
        assert_eq!(
            scrub(json!({"name": null, "title": ""}), &policy),
            json!({"name": null, "title": "-"})
        );
    }
}
