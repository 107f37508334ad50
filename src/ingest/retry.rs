// src/ingest/retry.rs
use metrics::counter;
use std::future::Future;
use std::time::Duration;

use crate::ingest::types::FetchOutcome;

/// Bounded fixed-backoff policy. Only `TransientError` is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Outcome of the last attempt made.
    pub outcome: FetchOutcome,
    pub attempts: u32,
}

/// Calls `fetch` (with the 1-based attempt number) until it yields anything other
/// than a transient error or the attempt budget is spent. Rate limiting and hard
/// errors are returned immediately.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, mut fetch: F) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = fetch(attempt).await;
        counter!("collector_fetch_attempts_total", "outcome" => outcome.label()).increment(1);

        let FetchOutcome::TransientError { status, detail } = &outcome else {
            return RetryOutcome {
                outcome,
                attempts: attempt,
            };
        };
        if attempt >= max_attempts {
            return RetryOutcome {
                outcome,
                attempts: attempt,
            };
        }

        tracing::warn!(
            attempt,
            max_attempts,
            status = ?status,
            detail = %detail,
            backoff_secs = policy.backoff.as_secs_f64(),
            "transient failure, backing off"
        );
        tokio::time::sleep(policy.backoff).await;
        attempt += 1;
    }
}
