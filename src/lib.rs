#![forbid(unsafe_code)]

//! # Fan-out dispatcher
//!
//! Ingests a stream of record strings from a file-backed producer, applies
//! a sink-specific transformation to each record, and concurrently
//! delivers every record to every configured downstream sink under
//! per-sink rate limits, with bounded retries and durable capture of
//! terminal failures.
//!
//! ## Quick start
//!
//! ```no_run
//! use fanout_dispatcher::config::Config;
//! use fanout_dispatcher::orchestrator::{Orchestrator, RunMode};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load(None);
//! let orchestrator = Orchestrator::new(config).await?;
//! let summary = orchestrator.run(RunMode::Streaming).await;
//! println!("processed {} records", summary.processed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dlq;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod queue;
pub mod rate_limit;
pub mod role;
pub mod sink;
pub mod source;
pub mod transform;

pub mod prelude;
