//! Process-wide monotonic counters and their periodic presentation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::role::SinkRole;

/// `processed` is a single atomic counter; `success`/`fail` are per-role
/// atomic counters created lazily on first increment.
pub struct Metrics {
    processed: AtomicU64,
    success: Mutex<HashMap<SinkRole, AtomicU64>>,
    fail: Mutex<HashMap<SinkRole, AtomicU64>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            success: Mutex::new(HashMap::new()),
            fail: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self, role: SinkRole) {
        increment(&self.success, role);
    }

    pub fn record_failure(&self, role: SinkRole) {
        increment(&self.fail, role);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn success_count(&self, role: SinkRole) -> u64 {
        read(&self.success, role)
    }

    pub fn fail_count(&self, role: SinkRole) -> u64 {
        read(&self.fail, role)
    }

    /// `processed / max(1, seconds elapsed since construction)`.
    pub fn throughput(&self) -> f64 {
        let seconds = self.start_time.elapsed().as_secs_f64().max(1.0);
        self.processed() as f64 / seconds
    }

    /// Emits one structured log line summarizing current counters.
    pub fn report(&self) {
        let success: HashMap<&'static str, u64> =
            SinkRole::ALL.iter().map(|role| (role.as_str(), self.success_count(*role))).collect();
        let fail: HashMap<&'static str, u64> =
            SinkRole::ALL.iter().map(|role| (role.as_str(), self.fail_count(*role))).collect();

        tracing::info!(
            processed = self.processed(),
            throughput = self.throughput(),
            ?success,
            ?fail,
            "dispatcher metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn increment(map: &Mutex<HashMap<SinkRole, AtomicU64>>, role: SinkRole) {
    let mut guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.entry(role).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::SeqCst);
}

fn read(map: &Mutex<HashMap<SinkRole, AtomicU64>>, role: SinkRole) -> u64 {
    let guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.get(&role).map(|counter| counter.load(Ordering::SeqCst)).unwrap_or(0)
}

/// Spawns a task that calls [`Metrics::report`] once per `interval`, until
/// `stop` is notified.
pub fn spawn_reporter(
    metrics: std::sync::Arc<Metrics>,
    interval: Duration,
    mut stop: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => metrics.report(),
                _ = &mut stop => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.processed(), 0);
        assert_eq!(metrics.success_count(SinkRole::Rest), 0);
        assert_eq!(metrics.fail_count(SinkRole::Rest), 0);
    }

    #[test]
    fn increments_are_isolated_per_role() {
        let metrics = Metrics::new();
        metrics.record_success(SinkRole::Rest);
        metrics.record_success(SinkRole::Rest);
        metrics.record_failure(SinkRole::Grpc);

        assert_eq!(metrics.success_count(SinkRole::Rest), 2);
        assert_eq!(metrics.success_count(SinkRole::Grpc), 0);
        assert_eq!(metrics.fail_count(SinkRole::Grpc), 1);
    }

    #[test]
    fn record_processed_increments_the_single_counter() {
        let metrics = Metrics::new();
        metrics.record_processed();
        metrics.record_processed();
        assert_eq!(metrics.processed(), 2);
    }

    #[tokio::test]
    async fn reporter_stops_when_signalled() {
        let metrics = std::sync::Arc::new(Metrics::new());
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = spawn_reporter(metrics, Duration::from_millis(10), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_millis(200), handle).await.unwrap().unwrap();
    }
}
