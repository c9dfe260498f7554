//! Runtime-agnostic async seam for the request pipeline.
//!
//! Every other crate in the workspace goes through this crate instead of
//! naming an executor directly:
//! - Native platforms: Tokio (`tokio::time`, `tokio::task`, `tokio_util::sync`)
//! - WebAssembly: the browser event loop through `gloo-timers` and
//!   `wasm-bindgen-futures`
//!
//! # Modules
//!
//! - `runtime`: driving a future to completion
//! - `task`: fire-and-forget task spawning
//! - `time`: sleep, timeout, wall clock helpers
//! - `sync`: cancellation tokens used as abort signals
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{timeout, Duration};
//!
//! async fn example(token: CancellationToken) {
//!     let guarded = timeout(Duration::from_millis(50), token.cancelled()).await;
//!     assert!(guarded.is_err() || token.is_cancelled());
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use sync::CancellationToken;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
