//! Convenient re-exports for common dispatcher types.
pub use crate::config::Config;
pub use crate::dlq::{DeadLetterSink, FailureRecord};
pub use crate::error::{DlqWriteError, SetupError};
pub use crate::metrics::Metrics;
pub use crate::orchestrator::{Orchestrator, RunMode, RunSummary};
pub use crate::queue::BoundedRecordQueue;
pub use crate::rate_limit::{RateLimiter, WindowedRateLimiter};
pub use crate::role::SinkRole;
pub use crate::sink::{HttpSink, MockSink, Sink};
pub use crate::source::{CsvSource, FixedWidthSource, JsonArraySource, JsonlSource, RecordSource};
pub use crate::transform::{
    BinaryHeaderTransformer, JsonEnvelopeTransformer, PassthroughTransformer, Transformer, TransformerRegistry,
    XmlWrapTransformer,
};
