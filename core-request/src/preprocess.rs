//! # Request Preprocessor
//!
//! Turns a URL plus [`RequestOptions`] into a transport-ready
//! [`RequestConfig`]. Resolution is pure: the caller's options are borrowed,
//! never modified, and everything the pipeline needs later (cache key, scrub
//! rules, cookie writes) travels in the returned [`ResolvedRequest`].
//!
//! ## Steps
//!
//! 1. Reject an empty URL
//! 2. Pick the response type (`is_file` ⇒ blob, SSE ⇒ stream)
//! 3. Filter parameters (skipped for multipart uploads)
//! 4. Apply the cookie policy and CSRF header
//! 5. Inject the bearer token for URLs under the session's token URL
//! 6. Encode by method and manner: query string, JSON, form or multipart

use bridge_traits::{
    CredentialsMode, FilePart, MultipartForm, RequestBody, RequestConfig, ResponseType,
};
use core_runtime::logging::strip_path;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::cache::{RequestCache, DEFAULT_CACHE_TTL_MS};
use crate::error::{RequestError, Result};
use crate::options::{FileItem, FileSource, Manner, ReqEnv, ReqType, RequestOptions, TIME_FIELDS};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data;charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Characters `encodeURIComponent` leaves alone: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Host state read by the preprocessor, gathered by the orchestrator from the
/// cookie store and web storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Value of the CSRF cookie, when present
    pub csrf_token: Option<String>,
    /// Session `tokenUrl`; `None` when session storage is unavailable.
    /// An empty string matches every URL.
    pub token_url: Option<String>,
    /// `jwtToken` from session storage, falling back to local storage
    pub jwt_token: Option<String>,
}

/// What the postprocessor needs to know about a resolved request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePolicy {
    pub is_file: bool,
    /// Cache key when caching is enabled
    pub cache_key: Option<String>,
    pub cache_ttl_ms: u64,
    pub res_null_replace: Option<String>,
    pub res_replace_field: Vec<String>,
    pub error_continue: bool,
    pub show_log: bool,
}

impl ResponsePolicy {
    fn from_options(url: &str, options: &RequestOptions) -> Self {
        Self {
            is_file: options.is_file,
            cache_key: options.cache_data.then(|| cache_key(url, options)),
            cache_ttl_ms: options.cache_control.unwrap_or(DEFAULT_CACHE_TTL_MS),
            res_null_replace: options.res_null_replace.clone(),
            res_replace_field: options.res_replace_field.clone(),
            error_continue: options.error_continue,
            show_log: options.show_log,
        }
    }
}

/// Fully resolved request.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub config: RequestConfig,
    /// URL as the caller passed it, before query encoding
    pub request_url: String,
    pub env: ReqEnv,
    pub policy: ResponsePolicy,
    /// Cookies to write through the cookie store (credential mode)
    pub cookie_writes: Vec<(String, String)>,
}

/// Cache key for a request: the explicit `cache_key` option, or the URL
/// followed by the serialized parameters.
pub fn cache_key(url: &str, options: &RequestOptions) -> String {
    options
        .cache_key
        .clone()
        .unwrap_or_else(|| RequestCache::cache_key(url, options.params.as_ref()))
}

/// Resolve `url` and `options` into a transport-ready request.
pub fn resolve(
    url: &str,
    options: &RequestOptions,
    env: ReqEnv,
    context: &RequestContext,
) -> Result<ResolvedRequest> {
    if url.is_empty() {
        return Err(RequestError::empty_url());
    }

    let params = match (&options.params, options.manner) {
        (Some(params), manner) if manner != Manner::File => Some(filter_params(params, options)),
        (params, _) => params.clone(),
    };

    let mut headers = options.headers.clone();

    let credentials = if options.cookie_mode.uses_credentials() || options.with_credentials {
        CredentialsMode::Include
    } else {
        CredentialsMode::Omit
    };
    let mut cookie_writes = Vec::new();
    if !options.cookies.is_empty() {
        if options.cookie_mode.uses_credentials() {
            cookie_writes = options
                .cookies
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
        }
        if options.cookie_mode.uses_header() {
            let cookie_line = options
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert(options.cookie_header_name.clone(), cookie_line);
        }
    }
    if options.auto_csrf {
        if let Some(token) = context.csrf_token.as_deref().filter(|t| !t.is_empty()) {
            headers.insert(options.csrf_header_name.clone(), token.to_string());
        }
    }

    apply_auth(url, context, &mut headers);

    let (request_url, body) = encode(url, options, params.as_ref(), env, &mut headers);

    let response_type = if options.is_file {
        ResponseType::Blob
    } else if options.req_type == ReqType::Sse {
        ResponseType::Stream
    } else {
        ResponseType::Json
    };

    let mut config = RequestConfig::new(options.method, request_url)
        .body(body)
        .timeout(options.timeout);
    config.headers = headers;
    config.credentials = credentials;
    config.mode = options.mode;
    config.response_type = response_type;
    config.validate_status = options.validate_status.clone();

    debug!(
        env = env.as_str(),
        method = %config.method,
        url = %config.url,
        manner = ?options.manner,
        "Resolved request"
    );

    Ok(ResolvedRequest {
        config,
        request_url: url.to_string(),
        env,
        policy: ResponsePolicy::from_options(url, options),
        cookie_writes,
    })
}

/// Build the request for an external call: parameters unfiltered, headers
/// verbatim, no cookie or token handling.
pub fn external(url: &str, options: &RequestOptions, env: ReqEnv) -> Result<RequestConfig> {
    if url.is_empty() {
        return Err(RequestError::empty_url());
    }
    let mut headers = options.headers.clone();
    let (request_url, body) = encode(url, options, options.params.as_ref(), env, &mut headers);

    let mut config = RequestConfig::new(options.method, request_url)
        .body(body)
        .timeout(options.timeout);
    config.headers = headers;
    config.mode = options.mode;
    config.response_type = if options.is_file {
        ResponseType::Blob
    } else {
        ResponseType::Json
    };
    config.validate_status = options.validate_status.clone();
    Ok(config)
}

/// Drop `""`/`null` values (keeping `0` and `false`), the `delete_field`
/// names and, with `delete_time_field`, the fixed time fields. Values named
/// in `no_filter_field` come back untouched.
pub fn filter_params(params: &Value, options: &RequestOptions) -> Value {
    let Value::Object(map) = params else {
        return params.clone();
    };

    let preserved: Vec<(String, Value)> = options
        .no_filter_field
        .iter()
        .filter_map(|key| map.get(key).map(|v| (key.clone(), v.clone())))
        .collect();

    let mut filtered: Map<String, Value> = if options.is_filter {
        map.iter()
            .filter(|(key, value)| {
                let empty = match value {
                    Value::Null => true,
                    Value::String(s) => s.is_empty(),
                    _ => false,
                };
                !empty
                    && !options.delete_field.iter().any(|f| f == *key)
                    && !(options.delete_time_field && TIME_FIELDS.contains(&key.as_str()))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    } else {
        map.clone()
    };

    for (key, value) in preserved {
        filtered.insert(key, value);
    }
    Value::Object(filtered)
}

fn apply_auth(url: &str, context: &RequestContext, headers: &mut HashMap<String, String>) {
    let Some(token_url) = &context.token_url else {
        return;
    };

    if url.contains(token_url.as_str()) {
        let has_auth = headers
            .get("Authorization")
            .is_some_and(|value| !value.is_empty());
        if !has_auth {
            if let Some(jwt) = context.jwt_token.as_deref().filter(|t| !t.is_empty()) {
                headers.insert("Authorization".to_string(), jwt.to_string());
            }
            headers.remove("authorization");
        }
    } else {
        headers.remove("usertoken");
    }
}

fn encode(
    url: &str,
    options: &RequestOptions,
    params: Option<&Value>,
    env: ReqEnv,
    headers: &mut HashMap<String, String>,
) -> (String, RequestBody) {
    if options.manner == Manner::File {
        headers.insert(CONTENT_TYPE.to_string(), MULTIPART_CONTENT_TYPE.to_string());
        let items = options
            .files
            .as_ref()
            .map(|files| files.items())
            .unwrap_or_default();
        return (url.to_string(), RequestBody::Multipart(build_multipart(items, env)));
    }

    if options.method == bridge_traits::HttpMethod::Get {
        let query = match params {
            Some(Value::Object(map)) => build_query(map),
            _ => String::new(),
        };
        return (append_query(url, &query), RequestBody::Empty);
    }

    match options.manner {
        Manner::Json => {
            headers.insert(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string());
            let body = params
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            (url.to_string(), RequestBody::Json(body))
        }
        Manner::Form => match params {
            Some(Value::Object(map)) if !map.is_empty() => {
                headers.insert(CONTENT_TYPE.to_string(), FORM_CONTENT_TYPE.to_string());
                (url.to_string(), RequestBody::Form(build_query(map)))
            }
            _ => (url.to_string(), RequestBody::Empty),
        },
        Manner::File => (url.to_string(), RequestBody::Empty),
    }
}

fn build_multipart(items: &[FileItem], env: ReqEnv) -> MultipartForm {
    let mut form = MultipartForm::new();
    for item in items {
        let part = match &item.source {
            FileSource::Uri(uri) => {
                debug!(file = %strip_path(uri), "Attaching upload by uri");
                FilePart::Uri {
                    uri: uri.clone(),
                    name: item.name.clone(),
                    content_type: OCTET_STREAM.to_string(),
                }
            }
            FileSource::Bytes { data, content_type } => FilePart::Blob {
                file_name: item.name.clone(),
                content_type: match env {
                    ReqEnv::Rn => Some(OCTET_STREAM.to_string()),
                    _ => content_type.clone(),
                },
                data: data.clone(),
            },
        };
        form = form.file("file", part);
        if let Some(file_id) = &item.file_id {
            form = form.text("fileId", file_id.clone());
        }
    }
    form
}

/// `encodeURIComponent`-compatible percent encoding.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Query-string form of an object: keys and values URI-encoded, arrays
/// repeating their key, nested objects as JSON.
pub fn build_query(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        let key = encode_component(key);
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push(format!("{}={}", key, encode_component(&scalar_to_string(item))));
                }
            }
            other => pairs.push(format!("{}={}", key, encode_component(&scalar_to_string(other)))),
        }
    }
    pairs.join("&")
}

fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query)
    } else {
        format!("{}?{}", url, query)
    }
}
