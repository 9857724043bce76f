//! Retry policy for transfer operations
//!
//! Serial links occasionally drop a byte under load, which surfaces as a
//! protocol error mid-transfer. `put`/`get` are wrapped in this policy;
//! destructive operations never are. A retried transfer restarts from
//! offset zero (no resume), matching the observed behavior of the protocol.

use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::Result;

/// Bounded retry with exponential backoff, applied at the call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts (1 = no retry)
    pub tries: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            tries: 3,
            delay: Duration::from_secs(1),
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying while it fails with a protocol-class error.
    ///
    /// Remote I/O and connection errors propagate immediately: a missing
    /// file will not reappear on a second attempt.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut delay = self.delay;
        let mut remaining = self.tries.max(1);
        loop {
            match op() {
                Err(e) if remaining > 1 && e.is_protocol() => {
                    warn!("{}, retrying in {:?} ({} attempts left)", e, delay, remaining - 1);
                    thread::sleep(delay);
                    delay *= self.backoff;
                    remaining -= 1;
                }
                other => return other,
            }
        }
    }
}
