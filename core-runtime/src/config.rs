//! # Core Configuration Module
//!
//! Provides configuration management for the request core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every host capability the request pipeline may use. The
//! host declares its capabilities once, at start-up, instead of the pipeline
//! probing globals on each call. Validation is fail-fast: a configuration
//! that can never dispatch a request is rejected by
//! [`build()`](CoreConfigBuilder::build).
//!
//! ## Capabilities
//!
//! - `http_client` - HTTP-client style transport (browser environment)
//! - `fetch` - raw `fetch` transport (React-Native and fetch environments, SSE)
//! - `mini_program` - callback-style mini-program transport
//! - `cookie_store` - cookie reads (CSRF) and writes (credential mode)
//! - `session_storage` / `local_storage` - bearer-token lookup
//! - `clock` - time source for cache expiry (defaults to the system clock)
//!
//! At least one transport is required. When the `desktop-shims` feature is
//! enabled, reqwest transports and in-memory stores are injected for any slot
//! left empty.
//!
//! ## Usage
//!
//! ### Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("desktop defaults");
//! ```
//!
//! ### Custom Bridges
//!
//! ```ignore
//! use bridge_traits::PlatformFeatures;
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .features(PlatformFeatures { mini_program: true, ..Default::default() })
//!     .mini_program(Arc::new(UniTransport::new(MyPrimitive)))
//!     .session_storage(Arc::new(MyStorage))
//!     .log_queue_length(50)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```ignore
//! use bridge_traits::PlatformFeatures;
//! use core_runtime::config::CoreConfig;
//!
//! // Declares a mini-program primitive without providing one
//! let err = CoreConfig::builder()
//!     .features(PlatformFeatures { mini_program: true, ..Default::default() })
//!     .build()
//!     .unwrap_err();
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, CookieStore, KeyValueStorage, PlatformFeatures, SystemClock, Transport,
};
use std::sync::Arc;

/// Default number of correlation ids kept by the diagnostic log queue.
pub const DEFAULT_LOG_QUEUE_LENGTH: usize = 30;

/// Core configuration for the request pipeline.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP-client style transport
    pub http_client: Option<Arc<dyn Transport>>,

    /// Raw `fetch` transport
    pub fetch: Option<Arc<dyn Transport>>,

    /// Mini-program adapter
    pub mini_program: Option<Arc<dyn Transport>>,

    /// Host capabilities, resolved once
    pub features: PlatformFeatures,

    /// Cookie primitive (optional)
    pub cookie_store: Option<Arc<dyn CookieStore>>,

    /// Session-scoped storage (optional)
    pub session_storage: Option<Arc<dyn KeyValueStorage>>,

    /// Persistent storage (optional)
    pub local_storage: Option<Arc<dyn KeyValueStorage>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Default bound for the diagnostic log queue
    pub log_queue_length: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &self.http_client.as_ref().map(|t| t.name()))
            .field("fetch", &self.fetch.as_ref().map(|t| t.name()))
            .field("mini_program", &self.mini_program.as_ref().map(|t| t.name()))
            .field("features", &self.features)
            .field(
                "cookie_store",
                &self.cookie_store.as_ref().map(|_| "CookieStore { ... }"),
            )
            .field(
                "session_storage",
                &self
                    .session_storage
                    .as_ref()
                    .map(|_| "KeyValueStorage { ... }"),
            )
            .field(
                "local_storage",
                &self
                    .local_storage
                    .as_ref()
                    .map(|_| "KeyValueStorage { ... }"),
            )
            .field("log_queue_length", &self.log_queue_length)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - At least one transport is provided
    /// - Feature flags are backed by the transports they promise
    /// - The log queue bound is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.http_client.is_none() && self.fetch.is_none() && self.mini_program.is_none() {
            return Err(transport_missing_error());
        }

        if self.features.mini_program && self.mini_program.is_none() {
            return Err(Error::Config(
                "Mini-program capability declared but no mini-program transport provided. \
                 Disable the feature or inject a UniTransport."
                    .to_string(),
            ));
        }

        if self.features.fetch && self.fetch.is_none() {
            return Err(Error::Config(
                "fetch capability declared but no fetch transport provided. \
                 Disable the feature or inject a fetch transport."
                    .to_string(),
            ));
        }

        if self.features.browser_window && self.http_client.is_none() {
            return Err(Error::Config(
                "Browser window declared but no HTTP client transport provided. \
                 Disable the feature or inject an HTTP client transport."
                    .to_string(),
            ));
        }

        if self.log_queue_length == 0 {
            return Err(Error::Config(
                "Log queue length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn transport_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "Transport".to_string(),
        message: "No transport implementation provided. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the reqwest transports. \
                 Web: inject the fetch transports from bridge-wasm. \
                 Mini-program: inject a UniTransport over the host request primitive."
            .to_string(),
    }
}

/// Slots filled in by `desktop-shims` when the host left them empty.
struct Defaults {
    http_client: Option<Arc<dyn Transport>>,
    fetch: Option<Arc<dyn Transport>>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    session_storage: Option<Arc<dyn KeyValueStorage>>,
    local_storage: Option<Arc<dyn KeyValueStorage>>,
    features: PlatformFeatures,
}

/// The reqwest transports share the configured cookie store (or a fresh
/// in-memory jar) so credential-mode requests send what was written to it.
#[cfg(feature = "desktop-shims")]
fn provide_defaults(cookie_store: Option<Arc<dyn CookieStore>>) -> Result<Defaults> {
    use bridge_desktop::{MemoryCookieJar, MemoryStorage, ReqwestHttpClient};

    let jar: Arc<dyn CookieStore> =
        cookie_store.unwrap_or_else(|| Arc::new(MemoryCookieJar::new()));
    let http_client = ReqwestHttpClient::new().map_err(|e| {
        Error::CapabilityMissing {
            capability: "http_client".to_string(),
            message: format!("Failed to initialize default HTTP client: {}", e),
        }
    })?;
    let fetch = ReqwestHttpClient::fetch().map_err(|e| {
        Error::CapabilityMissing {
            capability: "fetch".to_string(),
            message: format!("Failed to initialize default fetch transport: {}", e),
        }
    })?;

    Ok(Defaults {
        http_client: Some(Arc::new(http_client.with_cookie_store(jar.clone()))),
        fetch: Some(Arc::new(fetch.with_cookie_store(jar.clone()))),
        cookie_store: Some(jar),
        session_storage: Some(Arc::new(MemoryStorage::new())),
        local_storage: Some(Arc::new(MemoryStorage::new())),
        features: PlatformFeatures::native(),
    })
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_defaults(cookie_store: Option<Arc<dyn CookieStore>>) -> Result<Defaults> {
    Ok(Defaults {
        http_client: None,
        fetch: None,
        cookie_store,
        session_storage: None,
        local_storage: None,
        features: PlatformFeatures::default(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn Transport>>,
    fetch: Option<Arc<dyn Transport>>,
    mini_program: Option<Arc<dyn Transport>>,
    features: Option<PlatformFeatures>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    session_storage: Option<Arc<dyn KeyValueStorage>>,
    local_storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Option<Arc<dyn Clock>>,
    log_queue_length: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP-client style transport.
    ///
    /// If not provided, the reqwest transport is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, transport: Arc<dyn Transport>) -> Self {
        self.http_client = Some(transport);
        self
    }

    /// Sets the raw `fetch` transport.
    pub fn fetch(mut self, transport: Arc<dyn Transport>) -> Self {
        self.fetch = Some(transport);
        self
    }

    /// Sets the mini-program transport.
    pub fn mini_program(mut self, transport: Arc<dyn Transport>) -> Self {
        self.mini_program = Some(transport);
        self
    }

    /// Declares the host capabilities.
    ///
    /// Default: [`PlatformFeatures::native`] with `desktop-shims`, nothing
    /// otherwise.
    pub fn features(mut self, features: PlatformFeatures) -> Self {
        self.features = Some(features);
        self
    }

    /// Sets the cookie primitive.
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Sets session-scoped storage, consulted first for the bearer token.
    pub fn session_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Sets persistent storage, consulted after session storage.
    pub fn local_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.local_storage = Some(storage);
        self
    }

    /// Overrides the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the default bound of the diagnostic log queue.
    ///
    /// Default: 30
    pub fn log_queue_length(mut self, length: usize) -> Self {
        self.log_queue_length = Some(length);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - No transport is available
    /// - Feature flags promise a transport that was not provided
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = provide_defaults(self.cookie_store)?;

        let config = CoreConfig {
            http_client: self.http_client.or(defaults.http_client),
            fetch: self.fetch.or(defaults.fetch),
            mini_program: self.mini_program,
            features: self.features.unwrap_or(defaults.features),
            cookie_store: defaults.cookie_store,
            session_storage: self.session_storage.or(defaults.session_storage),
            local_storage: self.local_storage.or(defaults.local_storage),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            log_queue_length: self.log_queue_length.unwrap_or(DEFAULT_LOG_QUEUE_LENGTH),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult, http::RequestConfig, BridgeError, ManualClock,
        RawResponse,
    };
    use serde_json::json;

    struct StubTransport(&'static str);

    #[async_trait]
    impl Transport for StubTransport {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn send(&self, _request: RequestConfig) -> BridgeResult<RawResponse> {
            Ok(RawResponse::json(200, json!({"code": 0})))
        }
    }

    struct StubStorage;

    impl KeyValueStorage for StubStorage {
        fn get_item(&self, _key: &str) -> Option<String> {
            None
        }

        fn set_item(&self, _key: &str, _value: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        fn remove_item(&self, _key: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn stub(name: &'static str) -> Arc<dyn Transport> {
        Arc::new(StubTransport(name))
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.http_client.is_some());
        assert!(config.fetch.is_some());
        assert!(config.mini_program.is_none());
        assert!(config.cookie_store.is_some());
        assert!(config.session_storage.is_some());
        assert_eq!(config.features, PlatformFeatures::native());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_keep_injected_transport() {
        let config = CoreConfig::builder()
            .fetch(stub("custom-fetch"))
            .build()
            .unwrap();

        assert_eq!(config.fetch.as_ref().map(|t| t.name()), Some("custom-fetch"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_a_transport() {
        let result = CoreConfig::builder().build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "Transport"
        ));
    }

    #[test]
    fn test_builder_with_single_transport() {
        let config = CoreConfig::builder()
            .features(PlatformFeatures::default())
            .http_client(stub("http"))
            .build()
            .unwrap();

        assert_eq!(config.log_queue_length, DEFAULT_LOG_QUEUE_LENGTH);
        assert!(config.mini_program.is_none());
    }

    #[test]
    fn test_validate_mini_program_requires_transport() {
        let result = CoreConfig::builder()
            .http_client(stub("http"))
            .features(PlatformFeatures {
                mini_program: true,
                ..Default::default()
            })
            .build();

        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Mini-program")));
    }

    #[test]
    fn test_validate_browser_requires_http_client() {
        let config = CoreConfig {
            http_client: None,
            fetch: Some(stub("fetch")),
            mini_program: None,
            features: PlatformFeatures::browser(),
            cookie_store: None,
            session_storage: None,
            local_storage: None,
            clock: Arc::new(SystemClock),
            log_queue_length: 30,
        };

        assert!(matches!(config.validate(), Err(Error::Config(msg)) if msg.contains("HTTP client")));
    }

    #[test]
    fn test_validate_rejects_zero_log_queue_length() {
        let result = CoreConfig::builder()
            .features(PlatformFeatures::default())
            .http_client(stub("http"))
            .log_queue_length(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_all_capabilities() {
        let clock = Arc::new(ManualClock::new(42));
        let config = CoreConfig::builder()
            .features(PlatformFeatures {
                browser_window: true,
                fetch: true,
                mini_program: true,
                abort_controller: true,
            })
            .http_client(stub("http"))
            .fetch(stub("fetch"))
            .mini_program(stub("uni"))
            .session_storage(Arc::new(StubStorage))
            .local_storage(Arc::new(StubStorage))
            .clock(clock)
            .log_queue_length(5)
            .build()
            .unwrap();

        assert_eq!(config.clock.unix_timestamp_millis(), 42);
        assert_eq!(config.log_queue_length, 5);
        assert_eq!(config.mini_program.as_ref().map(|t| t.name()), Some("uni"));
    }

    #[test]
    fn test_config_is_cloneable_and_debuggable() {
        let config = CoreConfig::builder()
            .features(PlatformFeatures::default())
            .mini_program(stub("uni"))
            .build()
            .unwrap();

        let cloned = config.clone();
        let rendered = format!("{:?}", cloned);
        assert!(rendered.contains("uni"));
        assert!(rendered.contains("log_queue_length"));
    }
}
