//! Error types for WebAssembly bridge implementations

use bridge_traits::error::BridgeError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Result type for WebAssembly bridge operations
pub type WasmResult<T> = Result<T, WasmError>;

/// Errors that can occur in WebAssembly bridge implementations
#[derive(Error, Debug)]
pub enum WasmError {
    /// JavaScript error from web-sys
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// A browser global is missing
    #[error("Browser API not available: {0}")]
    NotAvailable(String),

    /// `fetch` rejected with a `TypeError` (DNS, CORS, offline)
    #[error("Failed to fetch: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request was aborted through its `AbortController`
    #[error("Operation cancelled")]
    Cancelled,

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl WasmError {
    /// Classify a rejected `fetch` promise.
    pub fn from_fetch_rejection(js_value: JsValue) -> Self {
        if let Some(exception) = js_value.dyn_ref::<web_sys::DomException>() {
            if exception.name() == "AbortError" {
                return WasmError::Cancelled;
            }
        }
        if let Some(error) = js_value.dyn_ref::<js_sys::TypeError>() {
            return WasmError::Network(String::from(error.message()));
        }
        WasmError::from(js_value)
    }
}

impl From<WasmError> for BridgeError {
    fn from(err: WasmError) -> Self {
        match err {
            WasmError::Cancelled => BridgeError::Aborted,
            WasmError::NotAvailable(what) => BridgeError::NotAvailable(what),
            WasmError::Network(message) => BridgeError::Network(message),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<JsValue> for WasmError {
    fn from(js_value: JsValue) -> Self {
        let msg = if js_value.is_string() {
            js_value
                .as_string()
                .unwrap_or_else(|| "Unknown error".to_string())
        } else if let Some(error) = js_value.dyn_ref::<js_sys::Error>() {
            error.message().into()
        } else {
            format!("{:?}", js_value)
        };
        WasmError::JavaScript(msg)
    }
}

/// Wrap a JS exception with the operation that raised it.
pub(crate) fn js_error(context: &str, err: JsValue) -> BridgeError {
    BridgeError::OperationFailed(format!("{context}: {}", WasmError::from(err)))
}
