//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the request pipeline and the
//! platform-specific network primitives. Each trait represents a capability
//! the core requires but that is implemented differently per host (native
//! process, browser tab, mini-program).
//!
//! ## Traits
//!
//! ### Networking
//! - [`Transport`](http::Transport) - Send a resolved [`RequestConfig`](http::RequestConfig), optionally as a byte stream
//!
//! ### Storage
//! - [`CookieStore`](storage::CookieStore) - Read/write cookies by name
//! - [`KeyValueStorage`](storage::KeyValueStorage) - Session and local web storage
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//! - [`PlatformFeatures`](platform::PlatformFeatures) - Capabilities declared once at start-up
//!
//! ## Platform Requirements
//!
//! | Platform     | Implementation Crate | Transports |
//! |--------------|----------------------|------------|
//! | Native       | `bridge-desktop`     | reqwest (HTTP-client and fetch flavours) |
//! | Browser      | `bridge-wasm`        | `fetch` + `AbortController` |
//! | Mini-program | host-provided        | `UniTransport` over a callback primitive |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let transport = selector.select(ReqEnv::Uni)?; // CapabilityMissing when no mini-program primitive was injected
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! convert platform errors into it, reporting cancellation as
//! [`BridgeError::Aborted`] and rejected statuses as
//! [`BridgeError::BadStatus`] so the core can normalize them.
//!
//! ## Thread Safety
//!
//! Traits carry the [`PlatformSendSync`](platform::PlatformSendSync) bound:
//! `Send + Sync` on native targets, nothing on `wasm32`.

pub mod error;
pub mod http;
pub mod platform;
pub mod storage;
pub mod time;

pub use error::{BridgeError, StatusCategory};

// Re-export commonly used types
pub use http::{
    CredentialsMode, FilePart, HttpMethod, MultipartField, MultipartForm, RawResponse,
    RequestBody, RequestConfig, RequestMode, ResponseBody, ResponseType, StatusValidator,
    Transport, TransportFlavor,
};
pub use platform::{ByteStream, PlatformFeatures, PlatformSendSync};
pub use storage::{CookieStore, KeyValueStorage};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
