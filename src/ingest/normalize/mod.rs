// src/ingest/normalize/mod.rs
//! Payload → canonical rows, one submodule per source kind.

pub mod html_page;
pub mod stat_series;
pub mod time_series;

use chrono::NaiveDate;
use metrics::histogram;

use crate::error::MalformedPayload;
use crate::ingest::types::{CanonicalRow, Payload};

pub use html_page::{normalize_html, resolve_link, title_case};
pub use stat_series::{normalize_stat_series, parse_decimal};
pub use time_series::{normalize_time_series, OHLCV_FIELDS};

/// Default number of most recent daily bars kept per ticker.
pub const DEFAULT_TRIM_COUNT: usize = 10;

/// Per-source inputs the normalizers need besides the payload.
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub source_id: &'a str,
    /// Wall-clock date of this normalization, stamped on every row.
    pub collected_at: NaiveDate,
    pub trim_count: usize,
    pub keywords: &'a [String],
}

pub fn normalize(
    payload: Payload,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<CanonicalRow>, MalformedPayload> {
    let t0 = std::time::Instant::now();
    let kind = payload.kind();
    let rows = match payload {
        Payload::TimeSeries(series) => normalize_time_series(series, ctx),
        Payload::StatSeries(points) => normalize_stat_series(points, ctx),
        Payload::Html(doc) => normalize_html(doc, ctx),
    };
    histogram!("collector_normalize_ms", "kind" => kind.as_str())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);
    rows
}
