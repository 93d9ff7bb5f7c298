//! Error types used at the edges of the dispatcher.
//!
//! The core dispatch loop (§4.7 of the design) never lets a sink or transformer
//! error escape a single (record, sink) attempt — see [`crate::orchestrator`].
//! The types here cover the places where a failure really does need to
//! propagate: process setup and the DLQ's own I/O.

use std::path::PathBuf;

/// Failures that prevent the orchestrator from starting at all.
///
/// Everything else (a bad config section, an unreadable DLQ file, a single
/// sink outage) is absorbed and logged rather than returned here.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("input file {path} could not be opened: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("queue.capacity must be greater than zero")]
    InvalidQueueCapacity,

    #[error("sinks.{role}.rateLimit must be greater than zero")]
    InvalidRateLimit { role: String },
}

/// Non-fatal failure appending to the durable DLQ file.
///
/// The DLQ contract (§4.4) is best-effort: a durability error is logged and
/// never propagated to the dispatch task that reported the failure.
#[derive(Debug, thiserror::Error)]
pub enum DlqWriteError {
    #[error("failed to create DLQ parent directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open DLQ file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append DLQ record: {source}")]
    Append {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize failure record: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_messages_name_the_offending_key() {
        let err = SetupError::InvalidRateLimit { role: "rest".to_string() };
        assert_eq!(err.to_string(), "sinks.rest.rateLimit must be greater than zero");

        let err = SetupError::InvalidQueueCapacity;
        assert_eq!(err.to_string(), "queue.capacity must be greater than zero");
    }

    #[test]
    fn input_unreadable_carries_the_path_and_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = SetupError::InputUnreadable { path: PathBuf::from("sample-data/input.json"), source: io_err };
        let msg = err.to_string();
        assert!(msg.contains("sample-data/input.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn dlq_errors_are_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        let err = DlqWriteError::Append { source: std::io::Error::new(std::io::ErrorKind::Other, "disk full") };
        assert_error(&err);
        assert!(err.to_string().contains("disk full"));
    }
}
