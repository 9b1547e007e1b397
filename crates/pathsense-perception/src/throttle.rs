//! [`RequestThrottle`] – single-slot pacing for outbound detection calls.
//!
//! One throttle is shared (via [`Arc`][std::sync::Arc]) by every pipeline
//! invocation in the process.  [`RequestThrottle::acquire`] suspends the
//! caller until at least `min_interval` has elapsed since the previous
//! permitted call, then records the new departure time before releasing the
//! slot.  The slot is held for the whole wait, so concurrent callers leave
//! one at a time and no two departures are ever closer than `min_interval`.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pathsense_perception::throttle::RequestThrottle;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let throttle = RequestThrottle::new(Duration::from_millis(10));
//!     let first = throttle.acquire().await; // departs immediately
//!     let second = throttle.acquire().await; // waits ~10 ms
//!     assert!(second - first >= Duration::from_millis(10));
//! });
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Minimum spacing between two outbound detection calls.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Process-wide pacing state for outbound detection calls.
///
/// Uses the monotonic [`tokio::time::Instant`] clock.  The last departure is
/// never reset; a fresh throttle starts with "no prior call".
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the slot, then stamp it with the current time.
    ///
    /// Returns the recorded departure time.
    pub async fn acquire(&self) -> Instant {
        let mut last_call = self.last_call.lock().await;
        let start = Instant::now();

        if let Some(previous) = *last_call {
            let ready_at = previous + self.min_interval;
            if ready_at > start {
                debug!(wait_ms = (ready_at - start).as_millis() as u64, "throttling outbound call");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let departed = Instant::now();
        *last_call = Some(departed);
        departed
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(MIN_REQUEST_INTERVAL)
    }
}
