//! WebAssembly Bridge Implementations
//!
//! Browser implementations of the traits defined in `bridge-traits`, built
//! on `web-sys` and `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! It compiles to nothing on native targets.
//!
//! # Implementations
//!
//! - `WasmFetchTransport`: `fetch` with `AbortController` cancellation and `ReadableStream` bodies
//! - `BrowserStorage`: `sessionStorage` / `localStorage`
//! - `DocumentCookies`: `document.cookie`
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::build_wasm_bridges;
//!
//! let bridges = build_wasm_bridges()?;
//! let mut builder = CoreConfig::builder().features(bridges.features);
//! if let Some(fetch) = bridges.fetch {
//!     builder = builder.fetch(fetch);
//! }
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod error;
pub mod http;
pub mod storage;

// Re-export commonly used types
pub use bootstrap::{build_wasm_bridges, install_panic_hook, probe_features, WasmBridgeSet};
pub use error::{WasmError, WasmResult};
pub use http::WasmFetchTransport;
pub use storage::{BrowserStorage, DocumentCookies};
