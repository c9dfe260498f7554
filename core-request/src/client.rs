//! # Request Client
//!
//! The orchestrator. One [`Client::request`] call runs the whole pipeline:
//!
//! 1. open a diagnostic correlation entry (`cache_log`)
//! 2. reject an empty URL
//! 3. answer from the response cache (`cache_data`)
//! 4. pick the transport for the environment
//! 5. external calls go straight to the transport, unprocessed
//! 6. preprocess, arm the abort signal and timeout timer
//! 7. streaming requests hand back the re-encoded body
//! 8. dispatch, check the status, then the business envelope
//! 9. scrub the result
//!
//! Failures from preprocessing onward are normalized into a [`Failure`] and
//! passed to the caller's error handler when one was supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_request::{client::Client, options::RequestOptions};
//! use core_runtime::config::CoreConfig;
//! use serde_json::json;
//!
//! let client = Client::new(CoreConfig::builder().build()?);
//! let list = client
//!     .request("/api/list", RequestOptions::get().with_params(json!({"page": 1})))
//!     .await?;
//! ```

use bridge_traits::{Clock, CookieStore, KeyValueStorage, RawResponse, Transport};
use core_async::CancellationToken;
use core_runtime::config::CoreConfig;
use core_runtime::logging::redact_headers;
use futures::future::{select, Either};
use futures::pin_mut;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::RequestCache;
use crate::error::{ErrorCode, Failure, RequestError, Result};
use crate::log_queue::DiagnosticLogQueue;
use crate::options::{ReqEnv, ReqType, RequestOptions};
use crate::payload::Payload;
use crate::postprocess::{
    check_business, check_status, normalize_bridge_error, parse_body, scrub, Checked,
};
use crate::preprocess::{self, RequestContext, ResolvedRequest};
use crate::stream;
use crate::transport::TransportSelector;

/// Session storage key holding the URL fragment that receives the JWT.
pub const TOKEN_URL_KEY: &str = "tokenUrl";
/// Session/local storage key holding the JWT.
pub const JWT_TOKEN_KEY: &str = "jwtToken";

/// Called with the normalized failure and the caller's options before the
/// request rejects (or resolves `{code: 0}` under `error_continue`).
#[cfg(not(target_arch = "wasm32"))]
pub type ErrorHandler = Arc<dyn Fn(&Failure, &RequestOptions) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub type ErrorHandler = Arc<dyn Fn(&Failure, &RequestOptions)>;

/// Receives the status-checked body and replaces the business check: its
/// return value resolves the request. External calls pass the decoded body.
#[cfg(not(target_arch = "wasm32"))]
pub type Callback = Arc<dyn Fn(Payload) -> Payload + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub type Callback = Arc<dyn Fn(Payload) -> Payload>;

/// Correlation entry opened for a `cache_log` request.
struct Correlation {
    queue: Arc<DiagnosticLogQueue>,
    id: String,
}

impl Correlation {
    fn record(&self, payload: Value) {
        self.queue.add(payload, Some(&self.id));
    }
}

/// Cross-environment request client.
///
/// Cheap to share behind an `Arc`; the cache and the diagnostic queue are
/// internally synchronized.
pub struct Client {
    selector: TransportSelector,
    cache: RequestCache,
    cookie_store: Option<Arc<dyn CookieStore>>,
    session_storage: Option<Arc<dyn KeyValueStorage>>,
    local_storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Arc<dyn Clock>,
    log_queue: OnceLock<Arc<DiagnosticLogQueue>>,
    log_queue_length: usize,
}

impl Client {
    pub fn new(config: CoreConfig) -> Self {
        let selector = TransportSelector::from_config(&config);
        debug!(?selector, "Request client created");
        Self {
            selector,
            cache: RequestCache::new(config.clock.clone()),
            cookie_store: config.cookie_store,
            session_storage: config.session_storage,
            local_storage: config.local_storage,
            clock: config.clock,
            log_queue: OnceLock::new(),
            log_queue_length: config.log_queue_length,
        }
    }

    /// Use `queue` for diagnostics instead of creating one lazily.
    pub fn with_log_queue(self, queue: Arc<DiagnosticLogQueue>) -> Self {
        Self {
            log_queue: OnceLock::from(queue),
            ..self
        }
    }

    /// The diagnostic queue, once a `cache_log` request has created it.
    pub fn log_queue(&self) -> Option<Arc<DiagnosticLogQueue>> {
        self.log_queue.get().cloned()
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn transports(&self) -> &TransportSelector {
        &self.selector
    }

    /// Run a request without an error handler or callback.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Payload> {
        self.request_with(url, options, None, None).await
    }

    /// Run a request and decode its JSON result into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let payload = self.request(url, options).await?;
        let kind = payload.kind();
        let value = payload.into_json().ok_or_else(|| {
            RequestError::Transport(
                Failure::from_code(ErrorCode::Other("ERR_BAD_RESPONSE".into()), url)
                    .with_message(format!("Expected a JSON result, got {}", kind)),
            )
        })?;
        serde_json::from_value(value).map_err(|e| {
            RequestError::Transport(
                Failure::from_code(ErrorCode::Other("ERR_BAD_RESPONSE".into()), url)
                    .with_message(format!("Failed to decode result: {}", e)),
            )
        })
    }

    /// Run a request with an optional error handler and result callback.
    #[instrument(skip_all, fields(url = %url, method = %options.method))]
    pub async fn request_with(
        &self,
        url: &str,
        options: RequestOptions,
        error_handler: Option<ErrorHandler>,
        callback: Option<Callback>,
    ) -> Result<Payload> {
        let correlation = options.cache_log.then(|| self.open_correlation(url, &options));

        if url.is_empty() {
            return Err(RequestError::empty_url());
        }

        if options.cache_data {
            let key = preprocess::cache_key(url, &options);
            if let Some(data) = self.cache.get(&key) {
                debug!(key = %key, "Serving response from cache");
                return Ok(Payload::Json(data));
            }
        }

        let env = self.selector.resolve_env(options.req_env);
        let transport = self.selector.select(env)?;

        if options.is_external {
            return self.dispatch_external(url, &options, env, transport, callback).await;
        }

        let outcome = match preprocess::resolve(url, &options, env, &self.context(&options)) {
            Ok(resolved) => {
                self.write_cookies(&resolved.cookie_writes);
                self.execute(transport, resolved, &options, callback, correlation.as_ref())
                    .await
            }
            Err(err) => Err(err),
        };

        outcome.or_else(|err| self.fail(err, &options, error_handler, correlation.as_ref()))
    }

    fn open_correlation(&self, url: &str, options: &RequestOptions) -> Correlation {
        let queue = self
            .log_queue
            .get_or_init(|| {
                let length = options.max_cache_log.unwrap_or(self.log_queue_length);
                debug!(length, "Creating diagnostic log queue");
                Arc::new(DiagnosticLogQueue::with_clock(
                    length,
                    options.cache_method.clone(),
                    self.clock.clone(),
                ))
            })
            .clone();
        let id = Uuid::new_v4().to_string();
        queue.add(Value::String(url.to_string()), Some(&id));
        queue.add(options.to_log_value(), Some(&id));
        Correlation { queue, id }
    }

    /// Gather CSRF and JWT state from the host's cookie store and storages.
    fn context(&self, options: &RequestOptions) -> RequestContext {
        let csrf_token = if options.auto_csrf {
            self.cookie_store
                .as_ref()
                .and_then(|store| store.read(&options.csrf_cookie_name))
        } else {
            None
        };

        let token_url = self
            .session_storage
            .as_ref()
            .map(|session| session.get_item(TOKEN_URL_KEY).unwrap_or_default());
        let jwt_token = token_url.as_ref().and_then(|_| {
            self.session_storage
                .as_ref()
                .and_then(|session| session.get_item(JWT_TOKEN_KEY))
                .or_else(|| {
                    self.local_storage
                        .as_ref()
                        .and_then(|local| local.get_item(JWT_TOKEN_KEY))
                })
        });

        RequestContext {
            csrf_token,
            token_url,
            jwt_token,
        }
    }

    fn write_cookies(&self, cookies: &[(String, String)]) {
        if cookies.is_empty() {
            return;
        }
        let Some(store) = &self.cookie_store else {
            warn!(count = cookies.len(), "No cookie store configured, dropping cookies");
            return;
        };
        for (name, value) in cookies {
            if let Err(e) = store.write(name, value) {
                warn!(cookie = %name, error = %e, "Failed to write cookie");
            }
        }
    }

    async fn dispatch_external(
        &self,
        url: &str,
        options: &RequestOptions,
        env: ReqEnv,
        transport: Arc<dyn Transport>,
        callback: Option<Callback>,
    ) -> Result<Payload> {
        let config = preprocess::external(url, options, env)?;
        debug!(transport = transport.name(), "Dispatching external request");
        let raw = transport
            .send(config)
            .await
            .map_err(|e| normalize_bridge_error(e, url))?;

        Ok(match callback {
            Some(callback) => callback(Payload::Json(parse_body(&raw.body))),
            None => Payload::Raw(raw),
        })
    }

    async fn execute(
        &self,
        transport: Arc<dyn Transport>,
        resolved: ResolvedRequest,
        options: &RequestOptions,
        callback: Option<Callback>,
        correlation: Option<&Correlation>,
    ) -> Result<Payload> {
        let ResolvedRequest {
            mut config,
            request_url,
            env,
            policy,
            ..
        } = resolved;

        let deadline = if !self.selector.supports_cancellation(env) {
            // No timer at all, not even the transport's own.
            config.timeout = Duration::ZERO;
            None
        } else if config.timeout.is_zero() {
            None
        } else {
            let token = CancellationToken::new();
            config.signal = Some(token.clone());
            Some((token, config.timeout))
        };

        if options.req_type == ReqType::Sse {
            // The timer only bounds stream establishment.
            config.timeout = Duration::ZERO;
            let opening = stream::open(transport.as_ref(), config);
            let body = match &deadline {
                Some((token, timeout)) => with_deadline(opening, token, *timeout, &request_url).await?,
                None => opening.await?,
            };
            return Ok(Payload::Stream(body));
        }

        let headers = policy.show_log.then(|| redact_headers(&config.headers));
        debug!(transport = transport.name(), url = %config.url, "Dispatching request");
        let sending = async {
            transport
                .send(config)
                .await
                .map_err(|e| normalize_bridge_error(e, &request_url))
        };
        let raw: RawResponse = match &deadline {
            Some((token, timeout)) => with_deadline(sending, token, *timeout, &request_url).await?,
            None => sending.await?,
        };

        if let Some(correlation) = correlation.filter(|_| !policy.is_file) {
            correlation.record(json!({
                "status": raw.status,
                "statusText": raw.status_text,
                "url": raw.url,
            }));
        }

        match check_status(&raw, &request_url, policy.is_file)? {
            Checked::Binary(bytes) => Ok(match callback {
                Some(callback) => callback(Payload::Binary(bytes)),
                None => Payload::Binary(bytes),
            }),
            Checked::Json(data) => {
                if let Some(correlation) = correlation {
                    correlation.record(data.clone());
                }
                if let Some(headers) = headers {
                    let params = options.params.clone().unwrap_or_default();
                    info!(
                        url = %request_url,
                        ?headers,
                        params = %params,
                        response = %data,
                        "Request completed"
                    );
                }
                if let Some(callback) = callback {
                    return Ok(callback(Payload::Json(data)));
                }
                let result = check_business(data, &request_url, &policy, &self.cache)?;
                Ok(Payload::Json(scrub(result, &policy)))
            }
        }
    }

    fn fail(
        &self,
        err: RequestError,
        options: &RequestOptions,
        error_handler: Option<ErrorHandler>,
        correlation: Option<&Correlation>,
    ) -> Result<Payload> {
        if let Some(correlation) = correlation {
            correlation.record(err.failure().to_value());
        }

        let Some(handler) = error_handler else {
            return Err(err);
        };
        handler(err.failure(), options);
        if options.error_continue {
            debug!(code = %err.code(), "Error handled, continuing with an empty result");
            Ok(Payload::Json(json!({"code": 0})))
        } else {
            Err(err)
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("selector", &self.selector)
            .field("cache", &self.cache)
            .field("log_queue", &self.log_queue.get().map(|q| q.len()))
            .finish()
    }
}

/// Race `fut` against a timer. When the timer wins the token is cancelled,
/// so the transport can abandon the request, and the race settles with a
/// code `20` timeout without waiting for the transport.
async fn with_deadline<T, F>(
    fut: F,
    token: &CancellationToken,
    timeout: Duration,
    url: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let timer = core_async::time::sleep(timeout);
    pin_mut!(fut);
    pin_mut!(timer);
    match select(fut, timer).await {
        Either::Left((outcome, _)) => outcome,
        Either::Right(((), _)) => {
            token.cancel();
            warn!(url, timeout_ms = timeout.as_millis() as u64, "Request timed out");
            Err(RequestError::Timeout(Failure::from_code(ErrorCode::TIMEOUT, url)))
        }
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
impl Client {
    /// Build a client over the browser's fetch, cookies and web storage.
    pub fn from_browser() -> Result<Self> {
        let bridges = bridge_wasm::build_wasm_bridges()
            .map_err(|e| RequestError::capability("", e.to_string()))?;

        let mut builder = CoreConfig::builder().features(bridges.features);
        if let Some(transport) = bridges.http_client {
            builder = builder.http_client(transport);
        }
        if let Some(transport) = bridges.fetch {
            builder = builder.fetch(transport);
        }
        if let Some(store) = bridges.cookie_store {
            builder = builder.cookie_store(store);
        }
        if let Some(storage) = bridges.session_storage {
            builder = builder.session_storage(storage);
        }
        if let Some(storage) = bridges.local_storage {
            builder = builder.local_storage(storage);
        }
        let config = builder
            .build()
            .map_err(|e| RequestError::capability("", e.to_string()))?;
        Ok(Self::new(config))
    }
}
