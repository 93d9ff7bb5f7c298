//! Dead-letter capture for terminal per-(record, sink) failures.
//!
//! A single long-lived writer task owns the open file handle and consumes
//! [`FailureRecord`]s from an internal bounded channel, appending them
//! sequentially. Callers enqueue onto the channel rather than spawning a
//! task per failure — see the companion `JsonlSink` pattern this is
//! grounded on, which opens its file once and appends+flushes per write.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::DlqWriteError;
use crate::role::SinkRole;

/// Durable description of a terminal failure, one JSON object per DLQ line.
///
/// `record` is spliced into the line verbatim rather than re-encoded as a
/// JSON string, so a malformed input record can yield a malformed DLQ line.
/// This is accepted: the DLQ is a best-effort capture of raw bytes.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub record: String,
    pub sink_role: SinkRole,
    pub attempts: u32,
    pub error_reason: String,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct FailureRecordLine<'a> {
    sink: &'a str,
    attempts: u32,
    error: &'a str,
    timestamp: String,
}

impl FailureRecord {
    fn to_line(&self) -> Result<String, DlqWriteError> {
        let envelope = FailureRecordLine {
            sink: self.sink_role.as_str(),
            attempts: self.attempts,
            error: &self.error_reason,
            timestamp: self.timestamp.to_rfc3339(),
        };
        let envelope_json = serde_json::to_string(&envelope).map_err(|source| DlqWriteError::Serialize { source })?;

        // Splice `record` into the envelope as a raw fragment under "record",
        // rather than through serde (see the doc comment above).
        let without_closing_brace = &envelope_json[..envelope_json.len() - 1];
        let record = if self.record.is_empty() { "null" } else { &self.record };
        Ok(format!("{},\"record\":{}}}", without_closing_brace, record))
    }
}

/// Appends [`FailureRecord`]s to a durable, line-oriented JSON file and
/// mirrors them in an in-memory roster.
pub struct DeadLetterSink {
    roster_size: Arc<AtomicUsize>,
    sender: Option<mpsc::Sender<FailureRecord>>,
}

impl DeadLetterSink {
    /// Builds a disabled DLQ: every operation is a no-op and `failed_count`
    /// stays at zero.
    pub fn disabled() -> Self {
        Self { roster_size: Arc::new(AtomicUsize::new(0)), sender: None }
    }

    /// Builds an enabled DLQ, creating missing parent directories and
    /// spawning the writer task. Initialization failure disables further
    /// writes but does not fail construction.
    pub async fn enabled(file_path: impl AsRef<Path>) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let roster_size = Arc::new(AtomicUsize::new(0));

        match open_append(&file_path).await {
            Ok(file) => {
                let (tx, rx) = mpsc::channel(256);
                tokio::spawn(run_writer(file, rx, roster_size.clone(), file_path));
                Self { roster_size, sender: Some(tx) }
            }
            Err(err) => {
                tracing::error!(error = %err, "DLQ initialization failed, writes will be dropped");
                Self { roster_size, sender: None }
            }
        }
    }

    /// Enqueues a failure for durable append and roster tracking. Returns
    /// immediately; the durable write happens on the writer task.
    pub fn record_failure(&self, record: String, sink_role: SinkRole, attempts: u32, reason: String) {
        let Some(sender) = &self.sender else { return };

        let failure = FailureRecord { record, sink_role, attempts, error_reason: reason, timestamp: Utc::now() };

        self.roster_size.fetch_add(1, Ordering::SeqCst);
        if sender.try_send(failure).is_err() {
            tracing::warn!("DLQ writer channel full or closed, dropping failure record");
            self.roster_size.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn failed_count(&self) -> usize {
        self.roster_size.load(Ordering::SeqCst)
    }

    /// Empties the in-memory roster count. Does not truncate the durable file.
    pub fn clear(&self) {
        self.roster_size.store(0, Ordering::SeqCst);
    }
}

async fn open_append(path: &Path) -> Result<tokio::fs::File, DlqWriteError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DlqWriteError::CreateDir { path: parent.to_path_buf(), source })?;
        }
    }

    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| DlqWriteError::Open { path: path.to_path_buf(), source })
}

async fn run_writer(
    mut file: tokio::fs::File,
    mut rx: mpsc::Receiver<FailureRecord>,
    _roster_size: Arc<AtomicUsize>,
    path: PathBuf,
) {
    while let Some(failure) = rx.recv().await {
        let line = match failure.to_line() {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode DLQ line");
                continue;
            }
        };

        if let Err(source) = file.write_all(line.as_bytes()).await {
            let err = DlqWriteError::Append { source };
            tracing::error!(error = %err, path = %path.display(), "failed to append DLQ record");
            continue;
        }
        if let Err(source) = file.write_all(b"\n").await {
            let err = DlqWriteError::Append { source };
            tracing::error!(error = %err, path = %path.display(), "failed to append DLQ newline");
            continue;
        }
        if let Err(source) = file.flush().await {
            let err = DlqWriteError::Append { source };
            tracing::error!(error = %err, path = %path.display(), "failed to flush DLQ file");
        }
    }
}
