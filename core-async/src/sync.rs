//! Synchronization primitives shared by transports and the orchestrator.
//!
//! The abort signal handed to transports is a `tokio_util` cancellation
//! token on every target: it only relies on `tokio::sync`, which runs on the
//! single-threaded browser event loop as well. The oneshot channel comes from
//! `futures` so callback-style adapters see one API everywhere.

pub use futures::channel::oneshot;
pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
