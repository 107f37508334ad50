// src/ingest/report.rs
//! Per-source outcome records and run statistics.

use serde::Serialize;
use std::time::Duration;

use crate::error::{PipelineError, SourceFailed};
use crate::ingest::aggregate::AggregateTable;
use crate::ingest::types::SourceKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// `rows` made it into the table; `duplicates` were dropped by dedup.
    Collected { rows: usize, duplicates: usize },
    Empty { reason: String },
    Failed {
        #[serde(serialize_with = "display")]
        error: SourceFailed,
    },
}

fn display<S: serde::Serializer>(e: &SourceFailed, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Collected { .. } => "collected",
            OutcomeStatus::Empty { .. } => "empty",
            OutcomeStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOutcome {
    pub source_id: String,
    pub kind: SourceKind,
    /// Requests made for this source, retries included.
    pub attempts: u32,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub table: AggregateTable,
    /// One record per configured source, in iteration order.
    pub outcomes: Vec<SourceOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn collected(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Collected { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Empty { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceFailed> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Failed { error } => Some(error),
            _ => None,
        })
    }

    pub fn duplicates(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                OutcomeStatus::Collected { duplicates, .. } => duplicates,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// The table, or `NoDataCollected` when every source came back empty or failed.
    pub fn into_table(self) -> Result<AggregateTable, PipelineError> {
        if self.table.is_empty() {
            Err(PipelineError::NoDataCollected)
        } else {
            Ok(self.table)
        }
    }

    pub fn log_summary(&self, job: &str) {
        tracing::info!(
            job,
            sources = self.outcomes.len(),
            collected = self.collected(),
            empty = self.empty(),
            failed = self.failed(),
            rows = self.table.len(),
            duplicates = self.duplicates(),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "collection finished"
        );
    }
}
