// src/error.rs
//! Typed failures that cross component boundaries.
//!
//! Per-source problems end as a [`SourceFailed`] recorded in the run report;
//! only [`PipelineError`] ever reaches the caller of a whole run.

use thiserror::Error;

/// Why a single source was given up on for this run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("transient error persisted after {attempts} attempt(s) (last status: {})", fmt_status(.status))]
    RetriesExhausted { attempts: u32, status: Option<u16> },
    #[error("provider throttled the request: {0}")]
    RateLimited(String),
    #[error("HTTP {0}")]
    HardError(u16),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "transport".to_string(), |s| s.to_string())
}

/// Terminal failure for one source. Caught at the iterator, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source {source_id} failed: {reason}")]
pub struct SourceFailed {
    pub source_id: String,
    pub reason: FailureReason,
}

/// Payload was classified as non-empty but lacks the structure the normalizer needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed payload: {0}")]
pub struct MalformedPayload(pub String);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv encoding: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source {source_id} needs a credential but none was configured")]
    MissingCredential { source_id: String },
    #[error("nothing collected: every source was empty or failed")]
    NoDataCollected,
    #[error(transparent)]
    Sink(#[from] SinkError),
}
