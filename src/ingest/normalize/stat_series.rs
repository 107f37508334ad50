// src/ingest/normalize/stat_series.rs
use chrono::NaiveDate;

use super::NormalizeContext;
use crate::error::MalformedPayload;
use crate::ingest::types::{CanonicalRow, FieldValue, Fields, SourceKind, StatPoint};

/// Parses a decimal that may use a comma as decimal separator.
/// With a comma present, dots are thousands separators: `"1.234,56"` → `1234.56`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let value: f64 = if t.contains(',') {
        t.replace('.', "").replace(',', ".").parse().ok()?
    } else {
        t.parse().ok()?
    };
    value.is_finite().then_some(value)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    NaiveDate::parse_from_str(t, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(t, "%Y-%m-%d"))
        .ok()
}

pub fn normalize_stat_series(
    points: Vec<StatPoint>,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<CanonicalRow>, MalformedPayload> {
    points
        .into_iter()
        .map(|p| {
            let date = parse_date(&p.date)
                .ok_or_else(|| MalformedPayload(format!("bad observation date {:?}", p.date)))?;
            let value = parse_decimal(&p.value).ok_or_else(|| {
                MalformedPayload(format!("{}: value {:?} is not numeric", p.date, p.value))
            })?;
            let mut fields = Fields::new();
            fields.insert("value", FieldValue::Number(value));
            Ok(CanonicalRow {
                kind: SourceKind::StatSeries,
                timestamp: Some(date),
                fields,
                source_id: ctx.source_id.to_string(),
                collected_at: ctx.collected_at,
            })
        })
        .collect()
}
