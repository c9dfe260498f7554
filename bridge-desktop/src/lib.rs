//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for native platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `Transport` using `reqwest`, in HTTP-client and raw-fetch flavours
//! - `KeyValueStorage` backed by an in-memory map (session/local storage stand-in)
//! - `CookieStore` backed by an in-memory jar
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MemoryStorage, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let fetch = Arc::new(ReqwestHttpClient::fetch()?);
//!     let session = Arc::new(MemoryStorage::new());
//!
//!     // Hand these to CoreConfig::builder()
//!     Ok(())
//! }
//! ```

mod http;
mod storage;

pub use http::ReqwestHttpClient;
pub use storage::{MemoryCookieJar, MemoryStorage};
