//! Cookie and Web-Storage Abstractions
//!
//! Both primitives are synchronous on every host that provides them
//! (`document.cookie`, `sessionStorage`, `localStorage`), so the traits are
//! too.

use crate::{error::Result, platform::PlatformSendSync};

/// Cookie read/write primitive
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::CookieStore;
///
/// fn csrf_token(cookies: &dyn CookieStore) -> Option<String> {
///     cookies.read("csrftoken")
/// }
/// ```
pub trait CookieStore: PlatformSendSync {
    /// Read a cookie by name. Missing cookies are `None`.
    fn read(&self, name: &str) -> Option<String>;

    /// Write (or overwrite) a cookie.
    fn write(&self, name: &str, value: &str) -> Result<()>;

    /// The jar rendered as a `Cookie` header value, for transports that
    /// have to attach credentials themselves. Hosts whose runtime sends
    /// cookies on its own (browsers) keep the default.
    fn cookie_header(&self) -> Option<String> {
        None
    }
}

/// Key-value storage trait
///
/// Mirrors the Web Storage API: session-scoped on one instance, persistent
/// ("local") on another.
pub trait KeyValueStorage: PlatformSendSync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    fn has_item(&self, key: &str) -> bool {
        self.get_item(key).is_some()
    }
}
