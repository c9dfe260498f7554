//! Task spawning.
//!
//! - Native: `tokio::task::spawn`, the task may run on another worker thread
//! - WASM: `wasm_bindgen_futures::spawn_local`, single threaded and detached

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::task::{JoinError, JoinHandle};

/// Spawns a detached task on the Tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawns a detached task on the browser event loop.
///
/// There is no join handle on WASM; communicate results through a channel.
#[cfg(target_arch = "wasm32")]
pub fn spawn<F>(future: F)
where
    F: std::future::Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future)
}
