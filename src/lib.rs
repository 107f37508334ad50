// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::error::{FailureReason, PipelineError, SourceFailed};
pub use crate::ingest::aggregate::{AggregateTable, Aggregator};
pub use crate::ingest::report::{OutcomeStatus, RunReport, SourceOutcome};
pub use crate::ingest::sink::{emit, CsvFileSink, Encoding, MemorySink, Sink};
pub use crate::ingest::types::{CanonicalRow, FetchOutcome, FieldValue, SourceDescriptor, SourceKind};
pub use crate::ingest::{Collector, CollectorSettings, ReqwestTransport};
