//! Producers of the record stream that feeds the bounded queue.
//!
//! A source enqueues records until its input is exhausted, then returns.
//! Termination is not signalled in-band; the dispatcher infers end-of-input
//! from queue idleness (see [`crate::orchestrator`]). Built-in sources
//! additionally notify a `done` signal after their last `put`, which the
//! orchestrator may use to shorten the idle-timeout window on clean
//! shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

/// Produces a finite sequence of record strings, enqueuing each via `put`
/// (the queue's producer handle) and notifying `done` once exhausted.
#[async_trait]
pub trait RecordSource: Send {
    async fn run(self: Box<Self>, producer: mpsc::Sender<String>, done: Arc<Notify>);
}

/// One JSON value per line.
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonlSource {
    async fn run(self: Box<Self>, producer: mpsc::Sender<String>, done: Arc<Notify>) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "record source input unreadable");
                done.notify_waiters();
                return;
            }
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if producer.send(line.to_string()).await.is_err() {
                break;
            }
        }
        done.notify_waiters();
    }
}

/// A single top-level JSON array; each element is re-serialized to a
/// compact string and enqueued as one record.
pub struct JsonArraySource {
    path: PathBuf,
}

impl JsonArraySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonArraySource {
    async fn run(self: Box<Self>, producer: mpsc::Sender<String>, done: Arc<Notify>) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "record source input unreadable");
                done.notify_waiters();
                return;
            }
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&contents) {
            Ok(serde_json::Value::Array(values)) => values,
            Ok(_) => {
                tracing::error!(path = %self.path.display(), "expected a top-level JSON array");
                Vec::new()
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "record source input is not valid JSON");
                Vec::new()
            }
        };

        for value in values {
            let record = value.to_string();
            if producer.send(record).await.is_err() {
                break;
            }
        }
        done.notify_waiters();
    }
}

/// Delimited columnar input; the header row names the fields and each data
/// row is re-encoded as a JSON object.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for CsvSource {
    async fn run(self: Box<Self>, producer: mpsc::Sender<String>, done: Arc<Notify>) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "record source input unreadable");
                done.notify_waiters();
                return;
            }
        };

        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "csv source has no readable header row");
                done.notify_waiters();
                return;
            }
        };

        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unparseable csv row");
                    continue;
                }
            };
            let object: serde_json::Map<String, serde_json::Value> = headers
                .iter()
                .zip(row.iter())
                .map(|(key, value)| (key.to_string(), serde_json::Value::String(value.to_string())))
                .collect();
            let record = serde_json::Value::Object(object).to_string();
            if producer.send(record).await.is_err() {
                break;
            }
        }
        done.notify_waiters();
    }
}

/// A named column span within a fixed-width row, `start` inclusive and
/// `end` exclusive, in bytes.
#[derive(Debug, Clone)]
pub struct FixedWidthColumn {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Fixed-width columnar input; column spans are supplied by configuration,
/// each row re-encoded as a JSON object keyed by column name.
pub struct FixedWidthSource {
    path: PathBuf,
    columns: Vec<FixedWidthColumn>,
}

impl FixedWidthSource {
    pub fn new(path: impl Into<PathBuf>, columns: Vec<FixedWidthColumn>) -> Self {
        Self { path: path.into(), columns }
    }
}

#[async_trait]
impl RecordSource for FixedWidthSource {
    async fn run(self: Box<Self>, producer: mpsc::Sender<String>, done: Arc<Notify>) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "record source input unreadable");
                done.notify_waiters();
                return;
            }
        };

        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let mut object = serde_json::Map::new();
            for column in &self.columns {
                let end = column.end.min(line.len());
                let start = column.start.min(end);
                let value = line.get(start..end).unwrap_or("").trim().to_string();
                object.insert(column.name.clone(), serde_json::Value::String(value));
            }
            let record = serde_json::Value::Object(object).to_string();
            if producer.send(record).await.is_err() {
                break;
            }
        }
        done.notify_waiters();
    }
}
