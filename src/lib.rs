//! Workspace facade crate.
//!
//! Re-exports the request pipeline so host applications can depend on
//! `unireq` alone and pick their platform through feature flags:
//! `desktop-shims` wires the reqwest transports and in-memory stores, while
//! `wasm` pulls in the browser adapters from `bridge-wasm`.
//!
//! ```ignore
//! use unireq::{Client, CoreConfig, RequestOptions};
//!
//! let client = Client::new(CoreConfig::builder().build()?);
//! let list = client
//!     .request("/api/list", RequestOptions::get().with_params(json!({ "page": 1 })))
//!     .await?;
//! ```

pub use bridge_traits::{
    BridgeError, Clock, CookieStore, HttpMethod, KeyValueStorage, PlatformFeatures, RawResponse,
    RequestConfig, SystemClock, Transport,
};
pub use core_request::{
    cache::RequestCache,
    client::{Callback, Client, ErrorHandler},
    error::{ErrorCode, Failure, RequestError, Result},
    log_queue::{DiagnosticLogQueue, LogSink, LogSnapshot},
    options::{CookieMode, FileItem, FileSource, FileUpload, Manner, ReqEnv, ReqType, RequestOptions},
    payload::Payload,
    uni::{MiniProgramPrimitive, UniTransport},
};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
