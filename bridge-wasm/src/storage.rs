//! Browser `sessionStorage`/`localStorage` and `document.cookie` adapters.

use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::{CookieStore, KeyValueStorage},
};
use wasm_bindgen::JsCast;
use web_sys::HtmlDocument;

use crate::error::js_error;

/// Web Storage backed key-value store.
#[derive(Clone)]
pub struct BrowserStorage {
    storage: web_sys::Storage,
}

impl BrowserStorage {
    /// The tab-scoped `sessionStorage`.
    pub fn session() -> BridgeResult<Self> {
        let window = web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".into()))?;
        let storage = window
            .session_storage()
            .map_err(|err| js_error("sessionStorage", err))?
            .ok_or_else(|| BridgeError::NotAvailable("sessionStorage".into()))?;
        Ok(Self { storage })
    }

    /// The persistent `localStorage`.
    pub fn local() -> BridgeResult<Self> {
        let window = web_sys::window().ok_or_else(|| BridgeError::NotAvailable("window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|err| js_error("localStorage", err))?
            .ok_or_else(|| BridgeError::NotAvailable("localStorage".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStorage for BrowserStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|err| js_error("storage.setItem", err))
    }

    fn remove_item(&self, key: &str) -> BridgeResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|err| js_error("storage.removeItem", err))
    }
}

/// `document.cookie` reader/writer.
#[derive(Clone)]
pub struct DocumentCookies {
    document: HtmlDocument,
}

impl DocumentCookies {
    /// Bind to the current document.
    pub fn new() -> BridgeResult<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| BridgeError::NotAvailable("document".into()))?
            .dyn_into::<HtmlDocument>()
            .map_err(|_| BridgeError::NotAvailable("HtmlDocument".into()))?;
        Ok(Self { document })
    }
}

/// Find `name` in a `a=1; b=2` cookie string, URI-decoding the value.
pub(crate) fn find_cookie(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key != name {
            return None;
        }
        Some(
            js_sys::decode_uri_component(value)
                .map(String::from)
                .unwrap_or_else(|_| value.to_string()),
        )
    })
}

impl CookieStore for DocumentCookies {
    fn read(&self, name: &str) -> Option<String> {
        let cookies = self.document.cookie().ok()?;
        find_cookie(&cookies, name)
    }

    fn write(&self, name: &str, value: &str) -> BridgeResult<()> {
        let encoded = String::from(js_sys::encode_uri_component(value));
        self.document
            .set_cookie(&format!("{name}={encoded}; path=/"))
            .map_err(|err| js_error("document.cookie", err))
    }
}
