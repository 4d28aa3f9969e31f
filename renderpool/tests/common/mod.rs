//! Shared helpers for the integration tests.

use std::time::{Duration, Instant};

/// Polls `cond` until it holds or `timeout` elapses. Returns whether the
/// condition was met.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
