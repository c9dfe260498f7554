//! # Request Module
//!
//! Cross-environment HTTP request pipeline.
//!
//! ## Overview
//!
//! A single [`Client::request`](client::Client::request) call preprocesses
//! the caller's options (parameter filtering, cookies, CSRF and JWT headers,
//! body encoding), dispatches through whichever transport the host declared
//! for the environment, and normalizes the response: HTTP status first, then
//! the `{code, msg, result}` business envelope, then empty-value scrubbing.
//!
//! ## Features
//!
//! - Environment tags (`browser`, `rn`, `uni`, `fetch`) mapped to injected transports
//! - Form, JSON and multipart encodings
//! - TTL response cache keyed by URL and parameters
//! - Bounded diagnostic log queue with a pluggable persistence sink
//! - Timeouts and aborts normalized to code `20`
//! - Server-push streaming with UTF-8 re-encoding
//! - Callback-style mini-program request primitive adapter

pub mod cache;
pub mod client;
pub mod error;
pub mod log_queue;
pub mod options;
pub mod payload;
pub mod postprocess;
pub mod preprocess;
pub mod scrub;
pub mod status;
pub mod stream;
pub mod transport;
pub mod uni;

pub use client::{Callback, Client, ErrorHandler};
pub use error::{ErrorCode, Failure, RequestError, Result};
pub use options::RequestOptions;
pub use payload::Payload;
