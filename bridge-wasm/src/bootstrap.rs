//! Convenience helpers for wiring the wasm bridge implementations together.
//!
//! Host shells call [`build_wasm_bridges`] once during start-up. The browser
//! globals are probed a single time here and the result travels with the
//! bridge set as [`PlatformFeatures`], so the request core never sniffs
//! globals itself. This mirrors the role `bridge-desktop` plays for native
//! targets.

use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult,
    http::Transport,
    platform::PlatformFeatures,
    storage::{CookieStore, KeyValueStorage},
};
use js_sys::{global, Reflect};
use tracing::debug;
use wasm_bindgen::JsValue;

use crate::{
    http::WasmFetchTransport,
    storage::{BrowserStorage, DocumentCookies},
};

/// Fully constructed wasm bridge objects ready for injection into the core.
pub struct WasmBridgeSet {
    /// Capabilities detected at start-up.
    pub features: PlatformFeatures,
    /// `fetch` in HTTP-client flavour.
    pub http_client: Option<Arc<dyn Transport>>,
    /// `fetch` in raw flavour.
    pub fetch: Option<Arc<dyn Transport>>,
    /// `document.cookie`, when a document exists.
    pub cookie_store: Option<Arc<dyn CookieStore>>,
    /// `sessionStorage`
    pub session_storage: Option<Arc<dyn KeyValueStorage>>,
    /// `localStorage`
    pub local_storage: Option<Arc<dyn KeyValueStorage>>,
}

fn has_global(path: &[&str]) -> bool {
    let mut current: JsValue = global().into();
    for segment in path {
        match Reflect::get(&current, &JsValue::from_str(segment)) {
            Ok(value) if !value.is_undefined() && !value.is_null() => current = value,
            _ => return false,
        }
    }
    true
}

/// Probe the browser globals once.
pub fn probe_features() -> PlatformFeatures {
    PlatformFeatures {
        browser_window: has_global(&["window"]),
        fetch: has_global(&["fetch"]),
        mini_program: has_global(&["uni", "request"]),
        abort_controller: has_global(&["AbortController"]),
    }
}

/// Route Rust panics to the browser console.
pub fn install_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Build the default wasm bridge stack.
///
/// Missing globals leave the corresponding slot empty rather than failing;
/// `CoreConfig::validate` decides whether the remaining set is usable.
pub fn build_wasm_bridges() -> BridgeResult<WasmBridgeSet> {
    let features = probe_features();
    debug!(?features, "Probed browser capabilities");

    let (http_client, fetch) = if features.fetch && features.browser_window {
        (
            Some(Arc::new(WasmFetchTransport::http_client()?) as Arc<dyn Transport>),
            Some(Arc::new(WasmFetchTransport::fetch()?) as Arc<dyn Transport>),
        )
    } else {
        (None, None)
    };

    let cookie_store = DocumentCookies::new()
        .ok()
        .map(|c| Arc::new(c) as Arc<dyn CookieStore>);
    let session_storage = BrowserStorage::session()
        .ok()
        .map(|s| Arc::new(s) as Arc<dyn KeyValueStorage>);
    let local_storage = BrowserStorage::local()
        .ok()
        .map(|s| Arc::new(s) as Arc<dyn KeyValueStorage>);

    Ok(WasmBridgeSet {
        features,
        http_client,
        fetch,
        cookie_store,
        session_storage,
        local_storage,
    })
}
