//! Platform-specific helper abstractions used to keep trait bounds aligned with
//! the threading guarantees of each target.
//!
//! Native targets require `Send + Sync` so transports can be shared across
//! async tasks. WebAssembly builds run on a single thread and cannot satisfy
//! those bounds because browser objects (`web_sys` types) are not thread-safe.

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::BridgeError;

/// Marker trait that applies `Send + Sync` on native targets while becoming a
/// no-op on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}

/// Incrementally delivered response body.
#[cfg(not(target_arch = "wasm32"))]
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

#[cfg(target_arch = "wasm32")]
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>>>>;

/// Host capabilities, declared once at start-up.
///
/// The host fills this in (or lets `bridge-wasm` probe the browser globals)
/// instead of having the core sniff globals on every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFeatures {
    /// A browser `window` is present.
    pub browser_window: bool,
    /// A global `fetch` is present.
    pub fetch: bool,
    /// A mini-program request primitive is present.
    pub mini_program: bool,
    /// Requests can be aborted through a signal.
    pub abort_controller: bool,
}

impl PlatformFeatures {
    /// Features of a regular browser tab.
    pub fn browser() -> Self {
        Self {
            browser_window: true,
            fetch: true,
            mini_program: false,
            abort_controller: true,
        }
    }

    /// Features of a native process driving reqwest.
    pub fn native() -> Self {
        Self {
            browser_window: false,
            fetch: true,
            mini_program: false,
            abort_controller: true,
        }
    }
}
