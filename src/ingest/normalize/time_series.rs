// src/ingest/normalize/time_series.rs
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;

use super::NormalizeContext;
use crate::error::MalformedPayload;
use crate::ingest::types::{CanonicalRow, FieldValue, Fields, SourceKind, TimeSeriesPayload};

/// Column order of every time-series row.
pub const OHLCV_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// "1. open" → "open"
fn strip_ordinal(raw: &str) -> &str {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*\d+\.\s*").expect("ordinal prefix regex"));
    match re.find(raw) {
        Some(m) => raw[m.end()..].trim(),
        None => raw.trim(),
    }
}

/// Daily bars sorted oldest-first, trimmed to the `trim_count` most recent.
pub fn normalize_time_series(
    series: TimeSeriesPayload,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<CanonicalRow>, MalformedPayload> {
    let mut rows = Vec::with_capacity(series.len());

    for (date_raw, bar) in series {
        let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d")
            .map_err(|e| MalformedPayload(format!("bad date key {date_raw:?}: {e}")))?;

        let mut values = Vec::with_capacity(bar.len());
        for (raw_name, raw_value) in &bar {
            let value: f64 = raw_value.trim().parse().map_err(|_| {
                MalformedPayload(format!("{date_raw}: {raw_name} = {raw_value:?} is not numeric"))
            })?;
            values.push((strip_ordinal(raw_name).to_ascii_lowercase(), value));
        }

        let mut fields = Fields::new();
        for name in OHLCV_FIELDS {
            let value = values
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| MalformedPayload(format!("{date_raw}: missing {name}")))?;
            fields.insert(name, FieldValue::Number(value));
        }
        // Adjusted endpoints carry extra columns; keep them after OHLCV.
        for (name, value) in values {
            if !OHLCV_FIELDS.contains(&name.as_str()) {
                fields.insert(name, FieldValue::Number(value));
            }
        }

        rows.push(CanonicalRow {
            kind: SourceKind::TimeSeries,
            timestamp: Some(date),
            fields,
            source_id: ctx.source_id.to_string(),
            collected_at: ctx.collected_at,
        });
    }

    rows.sort_by_key(|r| r.timestamp);
    let excess = rows.len().saturating_sub(ctx.trim_count);
    rows.drain(..excess);
    Ok(rows)
}
