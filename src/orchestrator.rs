//! Wires every component together and drives the dispatch loop.
//!
//! One task runs the record source, one task runs the periodic metrics
//! reporter, one task per sink runs that sink's rate-limiter refill tick,
//! one task runs the DLQ's durable writer (owned inside [`crate::dlq`]),
//! and one task is spawned per (record, sink) dispatch. See §5 of the
//! design for the full scheduling model this mirrors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::config::Config;
use crate::dlq::DeadLetterSink;
use crate::error::SetupError;
use crate::metrics::Metrics;
use crate::queue::BoundedRecordQueue;
use crate::rate_limit::{RateLimiter, WindowedRateLimiter};
use crate::role::SinkRole;
use crate::sink::{HttpSink, MockSink, Sink};
use crate::source::{CsvSource, FixedWidthColumn, FixedWidthSource, JsonArraySource, JsonlSource, RecordSource};
use crate::transform::TransformerRegistry;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);
const REFILL_INTERVAL: Duration = Duration::from_secs(1);

/// How many records the orchestrator should process before stopping.
#[derive(Debug, Clone, Copy)]
pub enum RunMode {
    /// Run until the queue has been idle for [`IDLE_TIMEOUT`].
    Streaming,
    /// Process at most `n` records, then drain outstanding dispatches and stop.
    BoundedTest { count: u64 },
}

/// Final counters reported once the orchestrator has drained.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: u64,
    pub dlq_failures: usize,
    /// Per-role successful deliveries, keyed by [`SinkRole`].
    pub success: HashMap<SinkRole, u64>,
    /// Per-role terminal failures (retries exhausted or transform failed).
    pub fail: HashMap<SinkRole, u64>,
}

struct RoleWiring {
    role: SinkRole,
    sink: Arc<dyn Sink>,
    rate_limiter: Arc<WindowedRateLimiter>,
    max_retries: u32,
}

/// Owns every long-lived collaborator and runs the fan-out dispatch loop.
pub struct Orchestrator {
    config: Config,
    metrics: Arc<Metrics>,
    dlq: Arc<DeadLetterSink>,
    transformers: TransformerRegistry,
    roles: Vec<RoleWiring>,
    queue: Arc<BoundedRecordQueue>,
}

impl Orchestrator {
    /// Validates configuration and constructs every collaborator. Does not
    /// start any background task; call [`Orchestrator::run`] for that.
    pub async fn new(config: Config) -> Result<Self, SetupError> {
        if config.queue.capacity == 0 {
            return Err(SetupError::InvalidQueueCapacity);
        }

        let mut roles = Vec::new();
        for (role, rate_limit, url) in [
            (SinkRole::Rest, config.sinks.rest.rate_limit, config.sinks.rest.url.clone()),
            (SinkRole::Grpc, config.sinks.grpc.rate_limit, config.sinks.grpc.url.clone()),
            (SinkRole::Mq, config.sinks.mq.rate_limit, config.sinks.mq.url.clone()),
            (SinkRole::Db, config.sinks.db.rate_limit, config.sinks.db.url.clone()),
        ] {
            if rate_limit == 0 {
                return Err(SetupError::InvalidRateLimit { role: role.as_str().to_lowercase() });
            }
            let rate_limiter = WindowedRateLimiter::new(rate_limit);
            let limiter_handle: Arc<dyn RateLimiter> = rate_limiter.clone();
            let sink: Arc<dyn Sink> = match (role, url) {
                (SinkRole::Rest, Some(url)) => Arc::new(HttpSink::new(role, url, limiter_handle)),
                _ => Arc::new(MockSink::fixed(role, limiter_handle, true)),
            };
            roles.push(RoleWiring { role, sink, rate_limiter, max_retries: config.dlq.max_retries });
        }

        let input_path = PathBuf::from(&config.input.file_path);
        tokio::fs::metadata(&input_path)
            .await
            .map_err(|source| SetupError::InputUnreadable { path: input_path.clone(), source })?;

        let dlq = if config.dlq.enabled {
            Arc::new(DeadLetterSink::enabled(&config.dlq.file_path).await)
        } else {
            Arc::new(DeadLetterSink::disabled())
        };

        Ok(Self {
            queue: Arc::new(BoundedRecordQueue::new(config.queue.capacity)),
            transformers: TransformerRegistry::with_builtin_defaults(),
            metrics: Arc::new(Metrics::new()),
            dlq,
            roles,
            config,
        })
    }

    /// Selects the record source built-in named by `input.format` (§4.6/§6).
    /// Unrecognized formats fall back to `jsonl`, the documented default.
    fn build_source(&self) -> Box<dyn RecordSource> {
        let path = PathBuf::from(&self.config.input.file_path);
        match self.config.input.format.as_str() {
            "json" => Box::new(JsonArraySource::new(path)),
            "csv" => Box::new(CsvSource::new(path)),
            "fixedwidth" => {
                let columns = self
                    .config
                    .input
                    .fixedwidth
                    .columns
                    .iter()
                    .map(|column| FixedWidthColumn { name: column.name.clone(), start: column.start, end: column.end })
                    .collect();
                Box::new(FixedWidthSource::new(path, columns))
            }
            _ => Box::new(JsonlSource::new(path)),
        }
    }

    /// Runs the source, dispatch loop, and metrics reporter to completion
    /// and returns final counters.
    pub async fn run(self, mode: RunMode) -> RunSummary {
        let producer = self.queue.producer();
        let source_done = Arc::new(Notify::new());

        let source = self.build_source();
        tokio::spawn({
            let source_done = source_done.clone();
            async move { source.run(producer, source_done).await }
        });

        let refill_handles: Vec<_> = self
            .roles
            .iter()
            .map(|wiring| spawn_refill_task(wiring.rate_limiter.clone()))
            .collect();

        let (stop_reporter_tx, stop_reporter_rx) = tokio::sync::oneshot::channel();
        let reporter_handle = crate::metrics::spawn_reporter(
            self.metrics.clone(),
            Duration::from_secs(self.config.metrics.interval_seconds),
            stop_reporter_rx,
        );

        let mut dispatch_tasks = tokio::task::JoinSet::new();
        let mut processed: u64 = 0;
        let target = match mode {
            RunMode::BoundedTest { count } => Some(count),
            RunMode::Streaming => None,
        };

        loop {
            if let Some(target) = target {
                if processed >= target {
                    break;
                }
            }

            match self.queue.poll(IDLE_TIMEOUT).await {
                Some(record) => {
                    processed += 1;
                    self.metrics.record_processed();
                    for wiring in &self.roles {
                        dispatch_tasks.spawn(dispatch_one(
                            record.clone(),
                            wiring.sink.clone(),
                            self.transformers.for_role(wiring.role),
                            wiring.role,
                            wiring.max_retries,
                            self.metrics.clone(),
                            self.dlq.clone(),
                        ));
                    }
                }
                None if target.is_none() => break,
                None => continue,
            }
        }

        let _ = tokio::time::timeout(SHUTDOWN_BUDGET, async {
            while dispatch_tasks.join_next().await.is_some() {}
        })
        .await;

        let _ = stop_reporter_tx.send(());
        let _ = reporter_handle.await;
        for handle in refill_handles {
            handle.abort();
        }

        let success = SinkRole::ALL.iter().map(|role| (*role, self.metrics.success_count(*role))).collect();
        let fail = SinkRole::ALL.iter().map(|role| (*role, self.metrics.fail_count(*role))).collect();

        RunSummary { processed, dlq_failures: self.dlq.failed_count(), success, fail }
    }
}

fn spawn_refill_task(rate_limiter: Arc<WindowedRateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFILL_INTERVAL);
        loop {
            ticker.tick().await;
            rate_limiter.refill();
        }
    })
}

/// Implements the per-(record, sink) dispatch algorithm from §4.7: transform,
/// then retry the send up to `max_retries` times, then report success or
/// write a dead letter.
async fn dispatch_one(
    record: String,
    sink: Arc<dyn Sink>,
    transformer: Arc<dyn crate::transform::Transformer>,
    role: SinkRole,
    max_retries: u32,
    metrics: Arc<Metrics>,
    dlq: Arc<DeadLetterSink>,
) {
    let payload = match transformer.transform(&record) {
        Ok(payload) => payload,
        Err(reason) => {
            dlq.record_failure(record, role, 0, format!("Transformation failed: {}", reason));
            metrics.record_failure(role);
            return;
        }
    };

    for _attempt in 1..=max_retries {
        if sink.send(&payload).await {
            metrics.record_success(role);
            return;
        }
    }

    dlq.record_failure(record, role, max_retries, format!("Max retries ({}) exceeded", max_retries));
    metrics.record_failure(role);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlq::DeadLetterSink;
    use crate::rate_limit::WindowedRateLimiter;
    use crate::sink::MockSink;
    use crate::transform::PassthroughTransformer;

    #[tokio::test]
    async fn dispatch_one_records_success_on_first_good_send() {
        let sink: Arc<dyn Sink> = Arc::new(MockSink::fixed(SinkRole::Rest, WindowedRateLimiter::new(10), true));
        let metrics = Arc::new(Metrics::new());
        let dlq = Arc::new(DeadLetterSink::disabled());

        dispatch_one(
            "rec".to_string(),
            sink,
            Arc::new(PassthroughTransformer),
            SinkRole::Rest,
            3,
            metrics.clone(),
            dlq.clone(),
        )
        .await;

        assert_eq!(metrics.success_count(SinkRole::Rest), 1);
        assert_eq!(metrics.fail_count(SinkRole::Rest), 0);
        assert_eq!(dlq.failed_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_one_writes_dlq_entry_after_exhausting_retries() {
        let sink: Arc<dyn Sink> = Arc::new(MockSink::fixed(SinkRole::Mq, WindowedRateLimiter::new(10), false));
        let metrics = Arc::new(Metrics::new());
        let dlq = Arc::new(DeadLetterSink::disabled());

        dispatch_one(
            "rec".to_string(),
            sink,
            Arc::new(PassthroughTransformer),
            SinkRole::Mq,
            3,
            metrics.clone(),
            dlq.clone(),
        )
        .await;

        assert_eq!(metrics.fail_count(SinkRole::Mq), 1);
        assert_eq!(metrics.success_count(SinkRole::Mq), 0);
    }

    #[tokio::test]
    async fn dispatch_one_succeeds_after_one_retry() {
        let sink: Arc<dyn Sink> =
            Arc::new(MockSink::scripted(SinkRole::Grpc, WindowedRateLimiter::new(10), vec![false, true]));
        let metrics = Arc::new(Metrics::new());
        let dlq = Arc::new(DeadLetterSink::disabled());

        dispatch_one(
            "rec".to_string(),
            sink,
            Arc::new(PassthroughTransformer),
            SinkRole::Grpc,
            3,
            metrics.clone(),
            dlq.clone(),
        )
        .await;

        assert_eq!(metrics.success_count(SinkRole::Grpc), 1);
    }

    struct FailingTransformer;
    impl crate::transform::Transformer for FailingTransformer {
        fn transform(&self, _record: &str) -> Result<Vec<u8>, String> {
            Err("bad input".to_string())
        }
    }

    #[tokio::test]
    async fn dispatch_one_never_sends_when_transform_fails() {
        let sink: Arc<dyn Sink> = Arc::new(MockSink::fixed(SinkRole::Db, WindowedRateLimiter::new(10), true));
        let metrics = Arc::new(Metrics::new());
        let dlq = Arc::new(DeadLetterSink::disabled());

        dispatch_one(
            "rec".to_string(),
            sink,
            Arc::new(FailingTransformer),
            SinkRole::Db,
            3,
            metrics.clone(),
            dlq.clone(),
        )
        .await;

        assert_eq!(metrics.fail_count(SinkRole::Db), 1);
        assert_eq!(metrics.success_count(SinkRole::Db), 0);
    }

    #[tokio::test]
    async fn invalid_queue_capacity_is_rejected_at_construction() {
        let mut config = Config::default();
        config.queue.capacity = 0;
        let result = Orchestrator::new(config).await;
        assert!(matches!(result, Err(SetupError::InvalidQueueCapacity)));
    }

    #[tokio::test]
    async fn invalid_rate_limit_is_rejected_at_construction() {
        let mut config = Config::default();
        config.sinks.rest.rate_limit = 0;
        let result = Orchestrator::new(config).await;
        assert!(matches!(result, Err(SetupError::InvalidRateLimit { .. })));
    }

    #[tokio::test]
    async fn bounded_test_mode_processes_exactly_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.jsonl");
        tokio::fs::write(&input_path, "{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n{\"a\":4}\n").await.unwrap();

        let mut config = Config::default();
        config.input.file_path = input_path.to_string_lossy().into_owned();
        config.dlq.enabled = false;
        config.sinks.rest.url = None;

        let orchestrator = Orchestrator::new(config).await.unwrap();
        let summary = orchestrator.run(RunMode::BoundedTest { count: 2 }).await;

        assert_eq!(summary.processed, 2);
    }

    #[tokio::test]
    async fn full_run_reports_per_sink_success_and_failure_counts() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.jsonl");
        tokio::fs::write(&input_path, "{\"a\":1}\n{\"a\":2}\n").await.unwrap();

        let mut config = Config::default();
        config.input.file_path = input_path.to_string_lossy().into_owned();
        config.dlq.enabled = false;
        config.sinks.rest.url = None;

        let mut orchestrator = Orchestrator::new(config).await.unwrap();

        // S2: MQ's sink always rejects, so every MQ dispatch exhausts retries.
        for wiring in orchestrator.roles.iter_mut() {
            if wiring.role == SinkRole::Mq {
                wiring.sink = Arc::new(MockSink::fixed(SinkRole::Mq, wiring.rate_limiter.clone(), false));
            }
        }
        // S3: DB's transformer always errors, so no send is ever attempted.
        orchestrator.transformers.register(SinkRole::Db, Arc::new(FailingTransformer));

        let summary = orchestrator.run(RunMode::BoundedTest { count: 2 }).await;

        assert_eq!(summary.processed, 2);
        // S1: REST and GRPC keep their default always-succeed sink.
        assert_eq!(summary.success[&SinkRole::Rest], 2);
        assert_eq!(summary.fail[&SinkRole::Rest], 0);
        assert_eq!(summary.success[&SinkRole::Grpc], 2);
        assert_eq!(summary.fail[&SinkRole::Grpc], 0);
        assert_eq!(summary.success[&SinkRole::Mq], 0);
        assert_eq!(summary.fail[&SinkRole::Mq], 2);
        assert_eq!(summary.success[&SinkRole::Db], 0);
        assert_eq!(summary.fail[&SinkRole::Db], 2);
    }
}
