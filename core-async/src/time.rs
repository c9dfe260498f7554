//! Time-related abstractions.
//!
//! - Native: `tokio::time` on top of the Tokio timer wheel
//! - WASM: `gloo-timers` (`setTimeout`) and `performance.now()`
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, timeout, Duration};
//!
//! async fn example() {
//!     let slow = sleep(Duration::from_secs(5));
//!     assert!(timeout(Duration::from_millis(10), slow).await.is_err());
//! }
//! ```

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::{sleep, timeout};

#[cfg(not(target_arch = "wasm32"))]
pub use tokio::time::error::Elapsed as TimeoutError;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[cfg(target_arch = "wasm32")]
pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sleeps for the specified duration using the browser's `setTimeout`.
#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await
}

/// Requires a future to complete before `duration` has elapsed.
#[cfg(target_arch = "wasm32")]
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: std::future::Future,
{
    let sleep_fut = sleep(duration);

    futures::pin_mut!(future);
    futures::pin_mut!(sleep_fut);

    match futures::future::select(future, sleep_fut).await {
        futures::future::Either::Left((output, _)) => Ok(output),
        futures::future::Either::Right(_) => Err(TimeoutError),
    }
}

/// Error returned when a timeout expires.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError;

#[cfg(target_arch = "wasm32")]
impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

#[cfg(target_arch = "wasm32")]
impl std::error::Error for TimeoutError {}

/// A monotonic instant backed by `performance.now()`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Instant {
    millis: f64,
}

#[cfg(target_arch = "wasm32")]
impl Instant {
    /// Returns the current instant, or the epoch origin when the performance
    /// API is unavailable (workers without a window).
    pub fn now() -> Self {
        let millis = web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or_default();
        Self { millis }
    }

    /// Time elapsed since this instant, saturating at zero.
    pub fn elapsed(&self) -> Duration {
        let delta = (Self::now().millis - self.millis).max(0.0);
        Duration::from_micros((delta * 1000.0) as u64)
    }
}

/// Milliseconds since UNIX_EPOCH, zero if the clock is set before 1970.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Milliseconds since UNIX_EPOCH from `Date.now()`.
#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> u64 {
    js_sys::Date::now() as u64
}
