//! Process configuration.
//!
//! Loaded once at startup by merging environment variables over an optional
//! TOML file (figment's later-provider-wins semantics, with the file layered
//! on top of the environment). Every recognized key has a documented default;
//! a config file present but unparseable is logged and its section falls
//! back to defaults rather than aborting the process.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

fn default_input_file_path() -> String {
    "sample-data/input.json".to_string()
}
fn default_input_format() -> String {
    "jsonl".to_string()
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_rest_rate() -> u32 {
    50
}
fn default_grpc_rate() -> u32 {
    200
}
fn default_mq_rate() -> u32 {
    500
}
fn default_db_rate() -> u32 {
    1000
}
fn default_dlq_enabled() -> bool {
    true
}
fn default_dlq_file_path() -> String {
    "dlq/failed-records.jsonl".to_string()
}
fn default_dlq_max_retries() -> u32 {
    3
}
fn default_metrics_interval_seconds() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_file_path")]
    pub file_path: String,
    #[serde(default = "default_input_format")]
    pub format: String,
    /// Column spans for `input.format = "fixedwidth"`. Ignored by every
    /// other format. Empty by default, since fixed-width layout is
    /// artifact-specific and cannot be guessed.
    #[serde(default)]
    pub fixedwidth: FixedWidthInputConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file_path: default_input_file_path(),
            format: default_input_format(),
            fixedwidth: FixedWidthInputConfig::default(),
        }
    }
}

/// One named column span, `start` inclusive and `end` exclusive, in bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct FixedWidthColumnSpec {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixedWidthInputConfig {
    #[serde(default)]
    pub columns: Vec<FixedWidthColumnSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: default_queue_capacity() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkRateConfig {
    #[serde(default = "default_rest_rate")]
    pub rate_limit: u32,
    /// Target URL for the bundled `HttpSink`. Only consulted for the REST
    /// role; the other roles use the bundled `MockSink` regardless.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinksConfig {
    #[serde(default = "rest_default")]
    pub rest: SinkRateConfig,
    #[serde(default = "grpc_default")]
    pub grpc: SinkRateConfig,
    #[serde(default = "mq_default")]
    pub mq: SinkRateConfig,
    #[serde(default = "db_default")]
    pub db: SinkRateConfig,
}

fn rest_default() -> SinkRateConfig {
    SinkRateConfig { rate_limit: default_rest_rate(), url: Some("http://localhost:8080/rest".to_string()) }
}
fn grpc_default() -> SinkRateConfig {
    SinkRateConfig { rate_limit: default_grpc_rate(), url: None }
}
fn mq_default() -> SinkRateConfig {
    SinkRateConfig { rate_limit: default_mq_rate(), url: None }
}
fn db_default() -> SinkRateConfig {
    SinkRateConfig { rate_limit: default_db_rate(), url: None }
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self { rest: rest_default(), grpc: grpc_default(), mq: mq_default(), db: db_default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DlqConfig {
    #[serde(default = "default_dlq_enabled")]
    pub enabled: bool,
    #[serde(default = "default_dlq_file_path")]
    pub file_path: String,
    #[serde(default = "default_dlq_max_retries")]
    pub max_retries: u32,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            enabled: default_dlq_enabled(),
            file_path: default_dlq_file_path(),
            max_retries: default_dlq_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_seconds: default_metrics_interval_seconds() }
    }
}

/// Top-level process configuration, immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sinks: SinksConfig,
    #[serde(default)]
    pub dlq: DlqConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            queue: QueueConfig::default(),
            sinks: SinksConfig::default(),
            dlq: DlqConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the `DISPATCH_`-prefixed environment and an
    /// optional TOML file, falling back to documented defaults for any
    /// section that is absent or fails to parse.
    pub fn load(toml_path: Option<&str>) -> Self {
        let mut figment = Figment::new().merge(Env::prefixed("DISPATCH_").split("__"));

        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }

        match figment.extract() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "config could not be fully parsed, falling back to defaults");
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.input.file_path, "sample-data/input.json");
        assert_eq!(config.input.format, "jsonl");
        assert!(config.input.fixedwidth.columns.is_empty());
        assert_eq!(config.queue.capacity, 1000);
        assert_eq!(config.sinks.rest.rate_limit, 50);
        assert_eq!(config.sinks.grpc.rate_limit, 200);
        assert_eq!(config.sinks.mq.rate_limit, 500);
        assert_eq!(config.sinks.db.rate_limit, 1000);
        assert!(config.dlq.enabled);
        assert_eq!(config.dlq.file_path, "dlq/failed-records.jsonl");
        assert_eq!(config.dlq.max_retries, 3);
        assert_eq!(config.metrics.interval_seconds, 5);
    }

    #[test]
    fn missing_toml_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/path/does-not-exist.toml"));
        assert_eq!(config.queue.capacity, 1000);
    }
}
