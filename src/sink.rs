//! Delivery targets.
//!
//! A sink must acquire one rate-limiter permit before initiating work. Its
//! resolved boolean distinguishes success (`true`) from soft failure
//! (`false`); a thrown error is also a soft failure. Both are retried by the
//! orchestrator up to the configured ceiling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::rate_limit::RateLimiter;
use crate::role::SinkRole;

/// Capability for delivering one payload to a downstream target.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sends `payload`, acquiring a rate-limiter permit first. Returns
    /// `true` on success, `false` on soft failure.
    async fn send(&self, payload: &[u8]) -> bool;

    fn role(&self) -> SinkRole;
}

/// REST role: POSTs the payload to a configured URL. Non-2xx responses and
/// transport errors are mapped to a soft failure.
pub struct HttpSink {
    role: SinkRole,
    url: String,
    client: reqwest::Client,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl HttpSink {
    pub fn new(role: SinkRole, url: impl Into<String>, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self { role, url: url.into(), client: reqwest::Client::new(), rate_limiter }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, payload: &[u8]) -> bool {
        self.rate_limiter.acquire().await;

        match self.client.post(&self.url).body(payload.to_vec()).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(role = %self.role, error = %err, "http sink send failed");
                false
            }
        }
    }

    fn role(&self) -> SinkRole {
        self.role
    }
}

/// Scripted or fixed-outcome sink used as the bundled default for the
/// GRPC/MQ/DB roles, and for tests of every role.
pub struct MockSink {
    role: SinkRole,
    rate_limiter: Arc<dyn RateLimiter>,
    outcomes: Vec<bool>,
    cursor: AtomicUsize,
}

impl MockSink {
    /// A sink that always resolves to `outcome`.
    pub fn fixed(role: SinkRole, rate_limiter: Arc<dyn RateLimiter>, outcome: bool) -> Self {
        Self { role, rate_limiter, outcomes: vec![outcome], cursor: AtomicUsize::new(0) }
    }

    /// A sink that replays `outcomes` in order, repeating the last entry
    /// once exhausted.
    pub fn scripted(role: SinkRole, rate_limiter: Arc<dyn RateLimiter>, outcomes: Vec<bool>) -> Self {
        assert!(!outcomes.is_empty(), "MockSink::scripted requires at least one outcome");
        Self { role, rate_limiter, outcomes, cursor: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn send(&self, _payload: &[u8]) -> bool {
        self.rate_limiter.acquire().await;
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.outcomes[index.min(self.outcomes.len() - 1)]
    }

    fn role(&self) -> SinkRole {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::WindowedRateLimiter;

    #[tokio::test]
    async fn mock_sink_fixed_always_returns_same_outcome() {
        let sink = MockSink::fixed(SinkRole::Db, WindowedRateLimiter::new(10), true);
        assert!(sink.send(b"x").await);
        assert!(sink.send(b"x").await);
    }

    #[tokio::test]
    async fn mock_sink_scripted_replays_then_repeats_last() {
        let sink = MockSink::scripted(SinkRole::Mq, WindowedRateLimiter::new(10), vec![false, false, true]);
        assert!(!sink.send(b"x").await);
        assert!(!sink.send(b"x").await);
        assert!(sink.send(b"x").await);
        assert!(sink.send(b"x").await, "should repeat the last scripted outcome once exhausted");
    }

    #[tokio::test]
    async fn mock_sink_reports_its_role() {
        let sink = MockSink::fixed(SinkRole::Grpc, WindowedRateLimiter::new(10), true);
        assert_eq!(sink.role(), SinkRole::Grpc);
    }

    #[tokio::test]
    async fn mock_sink_respects_rate_limit() {
        let limiter = WindowedRateLimiter::new(1);
        let sink = MockSink::fixed(SinkRole::Rest, limiter.clone(), true);
        sink.send(b"x").await;
        assert_eq!(limiter.available(), 0);
    }
}
