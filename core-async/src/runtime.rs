//! Runtime utilities that abstract over the underlying async executor.
//!
//! On native targets we wrap Tokio's runtime primitives. On WebAssembly the
//! browser owns the event loop, so `block_on` can only drive futures that do
//! not wait on browser APIs (timers, `fetch`).

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a current-thread runtime.
///
/// Panics if the runtime cannot be built, which only happens when the OS
/// refuses to hand out the timer/IO drivers.
#[cfg(not(target_arch = "wasm32"))]
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Drives an already-ready future on a local pool.
///
/// Futures that depend on the browser event loop never complete here; keep
/// those `async` and `.await` them instead.
#[cfg(target_arch = "wasm32")]
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    futures::executor::LocalPool::new().run_until(future)
}
