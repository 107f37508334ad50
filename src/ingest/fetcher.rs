// src/ingest/fetcher.rs
//! One outbound GET per call, classified into a [`FetchOutcome`].
//! Retrying is not done here; see `ingest::retry`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{
    FetchOutcome, HtmlDocument, Payload, SourceDescriptor, SourceKind, StatPoint, TimeSeriesPayload,
};

/// Status codes worth another attempt later in the same run.
pub const TRANSIENT_STATUSES: [u16; 3] = [502, 503, 504];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Request never produced a status line (timeout, DNS, reset...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// The single network seam of the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// `reqwest` transport. A timeout is mandatory; there is no constructor without one.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError(describe_reqwest_error(&e)))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(describe_reqwest_error(&e)))?;
        Ok(RawResponse { status, body })
    }
}

// reqwest's Display includes the URL, which may carry the api key.
fn describe_reqwest_error(e: &reqwest::Error) -> String {
    let what = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_body() || e.is_decode() {
        "body read failed"
    } else {
        "request failed"
    };
    match std::error::Error::source(e) {
        Some(inner) => format!("{what}: {inner}"),
        None => what.to_string(),
    }
}

/// Values substituted into endpoint templates.
#[derive(Debug, Clone, Default)]
pub struct UrlParams {
    pub api_key: Option<String>,
    pub limit: usize,
}

pub struct HttpFetcher<T> {
    transport: T,
    params: UrlParams,
}

impl<T: Transport> HttpFetcher<T> {
    pub fn new(transport: T, params: UrlParams) -> Self {
        Self { transport, params }
    }

    /// Expands `{id}`, `{api_key}` and `{limit}` in the descriptor's template.
    pub fn build_url(&self, source: &SourceDescriptor) -> String {
        let mut url = source
            .endpoint_template
            .replace("{id}", &source.id)
            .replace("{limit}", &self.params.limit.to_string());
        if let Some(key) = &self.params.api_key {
            url = url.replace("{api_key}", key);
        }
        url
    }

    pub async fn fetch(&self, source: &SourceDescriptor) -> FetchOutcome {
        let url = self.build_url(source);
        match self.transport.get(&url).await {
            Ok(resp) => classify(source.kind, &url, resp),
            Err(e) => FetchOutcome::TransientError {
                status: None,
                detail: e.0,
            },
        }
    }
}

/// Maps a raw response onto the outcome taxonomy and decodes the body for its kind.
pub fn classify(kind: SourceKind, url: &str, resp: RawResponse) -> FetchOutcome {
    if !(200..300).contains(&resp.status) {
        return if TRANSIENT_STATUSES.contains(&resp.status) {
            FetchOutcome::TransientError {
                status: Some(resp.status),
                detail: format!("HTTP {}", resp.status),
            }
        } else {
            FetchOutcome::HardError(resp.status)
        };
    }

    match kind {
        SourceKind::TimeSeries => classify_time_series(&resp.body),
        SourceKind::StatSeries => classify_stat_series(&resp.body),
        SourceKind::HtmlPage => {
            if resp.body.trim().is_empty() {
                FetchOutcome::Empty("empty document".to_string())
            } else {
                FetchOutcome::Success(Payload::Html(HtmlDocument {
                    body: resp.body,
                    page_url: url.to_string(),
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimeSeriesEnvelope {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Time Series (Daily)")]
    series: Option<TimeSeriesPayload>,
}

fn classify_time_series(body: &str) -> FetchOutcome {
    let env: TimeSeriesEnvelope = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return FetchOutcome::Empty(format!("not a time-series document: {e}")),
    };
    if let Some(msg) = env.note.or(env.information) {
        return FetchOutcome::RateLimited(msg);
    }
    match env.series {
        Some(series) if !series.is_empty() => {
            FetchOutcome::Success(Payload::TimeSeries(series))
        }
        Some(_) => FetchOutcome::Empty("time series section is empty".to_string()),
        None => FetchOutcome::Empty(
            env.error_message
                .unwrap_or_else(|| "missing 'Time Series (Daily)' section".to_string()),
        ),
    }
}

fn classify_stat_series(body: &str) -> FetchOutcome {
    match serde_json::from_str::<Vec<StatPoint>>(body) {
        Ok(points) if points.is_empty() => FetchOutcome::Empty("no observations".to_string()),
        Ok(points) => FetchOutcome::Success(Payload::StatSeries(points)),
        Err(e) => FetchOutcome::Empty(format!("not a series of records: {e}")),
    }
}
