// src/ingest/mod.rs
pub mod aggregate;
pub mod fetcher;
pub mod normalize;
pub mod report;
pub mod retry;
pub mod sink;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::time::{Duration, Instant};

use crate::error::{FailureReason, PipelineError, SourceFailed};
use crate::ingest::aggregate::Aggregator;
use crate::ingest::fetcher::{HttpFetcher, Transport, UrlParams};
use crate::ingest::normalize::{normalize, NormalizeContext, DEFAULT_TRIM_COUNT};
use crate::ingest::report::{OutcomeStatus, RunReport, SourceOutcome};
use crate::ingest::retry::{with_retry, RetryOutcome, RetryPolicy};
use crate::ingest::types::{CanonicalRow, FetchOutcome, SourceDescriptor};

pub use crate::ingest::fetcher::ReqwestTransport;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collector_fetch_attempts_total",
            "Requests issued, labelled by classified outcome."
        );
        describe_counter!(
            "collector_source_outcomes_total",
            "Sources processed, labelled collected/empty/failed."
        );
        describe_counter!("collector_rows_total", "Rows appended to the aggregate table.");
        describe_counter!("collector_dedup_total", "Rows dropped as duplicates.");
        describe_histogram!(
            "collector_normalize_ms",
            "Payload normalization time in milliseconds."
        );
        describe_gauge!(
            "collector_last_run_ts",
            "Unix ts when a collection run last finished."
        );
    });
}

/// Tunables for one run over a list of sources.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub retry: RetryPolicy,
    /// Pause between consecutive sources; not applied after the last one.
    pub inter_request_delay: Duration,
    pub trim_count: usize,
    pub keywords: Vec<String>,
    pub api_key: Option<String>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            inter_request_delay: Duration::ZERO,
            trim_count: DEFAULT_TRIM_COUNT,
            keywords: Vec::new(),
            api_key: None,
        }
    }
}

enum Step {
    Rows(Vec<CanonicalRow>),
    Empty(String),
    Failed(FailureReason),
}

/// Walks sources strictly one at a time: fetch (with retry) → normalize → aggregate.
/// A failing source is recorded and skipped; it never stops the run.
pub struct Collector<T> {
    fetcher: HttpFetcher<T>,
    settings: CollectorSettings,
}

impl<T: Transport> Collector<T> {
    pub fn new(transport: T, settings: CollectorSettings) -> Self {
        let params = UrlParams {
            api_key: settings.api_key.clone(),
            limit: settings.trim_count,
        };
        Self {
            fetcher: HttpFetcher::new(transport, params),
            settings,
        }
    }

    /// Fails before any request when a source needs a credential we do not have.
    pub fn check_preconditions(&self, sources: &[SourceDescriptor]) -> Result<(), PipelineError> {
        if self.settings.api_key.is_some() {
            return Ok(());
        }
        match sources.iter().find(|s| s.needs_credential()) {
            Some(s) => Err(PipelineError::MissingCredential {
                source_id: s.id.clone(),
            }),
            None => Ok(()),
        }
    }

    pub async fn run(&self, sources: &[SourceDescriptor]) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        self.check_preconditions(sources)?;

        let started = Instant::now();
        let mut aggregator = Aggregator::new();
        let mut outcomes = Vec::with_capacity(sources.len());

        for (idx, source) in sources.iter().enumerate() {
            tracing::info!(
                source = %source.id,
                kind = source.kind.as_str(),
                progress = format!("{}/{}", idx + 1, sources.len()),
                "collecting"
            );

            let (step, attempts) = self.process_source(source).await;
            let status = match step {
                Step::Rows(rows) => {
                    let total = rows.len();
                    let duplicates = aggregator.merge(rows);
                    counter!("collector_rows_total").increment((total - duplicates) as u64);
                    counter!("collector_dedup_total").increment(duplicates as u64);
                    tracing::info!(
                        source = %source.id,
                        rows = total - duplicates,
                        duplicates,
                        "source collected"
                    );
                    OutcomeStatus::Collected {
                        rows: total - duplicates,
                        duplicates,
                    }
                }
                Step::Empty(reason) => {
                    tracing::warn!(source = %source.id, %reason, "source returned no data");
                    OutcomeStatus::Empty { reason }
                }
                Step::Failed(reason) => {
                    let error = SourceFailed {
                        source_id: source.id.clone(),
                        reason,
                    };
                    tracing::warn!(source = %source.id, attempts, error = %error, "source failed");
                    OutcomeStatus::Failed { error }
                }
            };
            counter!("collector_source_outcomes_total", "outcome" => status.label()).increment(1);
            outcomes.push(SourceOutcome {
                source_id: source.id.clone(),
                kind: source.kind,
                attempts,
                status,
            });

            let is_last = idx + 1 == sources.len();
            if !is_last && !self.settings.inter_request_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_request_delay).await;
            }
        }

        gauge!("collector_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        Ok(RunReport {
            table: aggregator.finish(),
            outcomes,
            elapsed: started.elapsed(),
        })
    }

    async fn process_source(&self, source: &SourceDescriptor) -> (Step, u32) {
        let RetryOutcome { outcome, attempts } = with_retry(&self.settings.retry, |attempt| {
            tracing::debug!(source = %source.id, attempt, "fetching");
            self.fetcher.fetch(source)
        })
        .await;

        let step = match outcome {
            FetchOutcome::Success(payload) => {
                let ctx = NormalizeContext {
                    source_id: &source.id,
                    collected_at: chrono::Utc::now().date_naive(),
                    trim_count: self.settings.trim_count,
                    keywords: &self.settings.keywords,
                };
                match normalize(payload, &ctx) {
                    Ok(rows) if rows.is_empty() => {
                        Step::Empty("no rows after normalization".to_string())
                    }
                    Ok(rows) => Step::Rows(rows),
                    Err(malformed) => Step::Empty(malformed.to_string()),
                }
            }
            FetchOutcome::Empty(reason) => Step::Empty(reason),
            FetchOutcome::RateLimited(msg) => Step::Failed(FailureReason::RateLimited(msg)),
            FetchOutcome::HardError(status) => Step::Failed(FailureReason::HardError(status)),
            FetchOutcome::TransientError { status, .. } => {
                Step::Failed(FailureReason::RetriesExhausted { attempts, status })
            }
        };
        (step, attempts)
    }
}
