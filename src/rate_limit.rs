//! Per-sink rate limiting.
//!
//! [`WindowedRateLimiter`] is a windowed quota, not a leaky bucket: every
//! refill tick resets the available permit count back to capacity rather
//! than accumulating unused permits across windows. An initial full bucket
//! lets the first second absorb a burst up to capacity.
//!
//! The refill tick is *not* started by the constructor — see
//! [`WindowedRateLimiter::refill`] and [`crate::orchestrator`], which owns
//! the background task that calls it once per second.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

/// Capability for acquiring a send permit before a sink attempt.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Blocks until one permit is available, then consumes it.
    ///
    /// Cancellable: if the calling task is dropped while waiting, no permit
    /// is consumed.
    async fn acquire(&self);
}

/// A per-second windowed quota: at most `capacity` permits may be acquired
/// per one-second window, with unused permits discarded at each refill.
#[derive(Debug)]
pub struct WindowedRateLimiter {
    capacity: i64,
    available: AtomicI64,
    notify: Notify,
}

impl WindowedRateLimiter {
    /// Creates a limiter with a full bucket of `capacity` permits.
    pub fn new(capacity: u32) -> Arc<Self> {
        let capacity = capacity as i64;
        Arc::new(Self { capacity, available: AtomicI64::new(capacity), notify: Notify::new() })
    }

    /// Resets available permits to capacity. Called once per second by the
    /// orchestrator's refill task; a missed tick is not compensated.
    pub fn refill(&self) {
        self.available.store(self.capacity, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None })
            .is_ok()
    }

    /// Permits currently available, for diagnostics and tests.
    pub fn available(&self) -> i64 {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for WindowedRateLimiter {
    async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            // Register for the next refill's notification before re-checking,
            // so a refill landing between the failed try and the wait isn't missed.
            let notified = self.notify.notified();
            if self.try_acquire() {
                return;
            }
            notified.await;
        }
    }
}
