// src/ingest/types.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three payload families the collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Daily OHLCV quotes from the time-series API.
    TimeSeries,
    /// `{date, value}` points from the central-bank statistics API.
    StatSeries,
    /// A news page; rows are keyword-matching headlines.
    HtmlPage,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::TimeSeries => "time_series",
            SourceKind::StatSeries => "stat_series",
            SourceKind::HtmlPage => "html_page",
        }
    }
}

/// One logical source: a ticker, an indicator or a news site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    #[serde(rename = "endpoint")]
    pub endpoint_template: String,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, endpoint_template: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            endpoint_template: endpoint_template.into(),
            kind,
        }
    }

    pub fn needs_credential(&self) -> bool {
        self.endpoint_template.contains("{api_key}")
    }
}

/// Daily bars keyed by the provider's date string; inner keys are the raw field names.
pub type TimeSeriesPayload = BTreeMap<String, BTreeMap<String, String>>;

/// One statistical observation as sent by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatPoint {
    #[serde(rename = "data")]
    pub date: String,
    #[serde(rename = "valor")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlDocument {
    pub body: String,
    /// URL the document was fetched from; root-relative links resolve against it.
    pub page_url: String,
}

/// Decoded body, one explicit schema per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    TimeSeries(TimeSeriesPayload),
    StatSeries(Vec<StatPoint>),
    Html(HtmlDocument),
}

impl Payload {
    pub fn kind(&self) -> SourceKind {
        match self {
            Payload::TimeSeries(_) => SourceKind::TimeSeries,
            Payload::StatSeries(_) => SourceKind::StatSeries,
            Payload::Html(_) => SourceKind::HtmlPage,
        }
    }
}

/// Result of a single request, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Payload),
    RateLimited(String),
    /// `status` is `None` for transport failures (timeout, connect, reset).
    TransientError { status: Option<u16>, detail: String },
    HardError(u16),
    Empty(String),
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::RateLimited(_) => "rate_limited",
            FetchOutcome::TransientError { .. } => "transient",
            FetchOutcome::HardError(_) => "hard_error",
            FetchOutcome::Empty(_) => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Column name → value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

/// Normalized record. The field set is fixed per [`SourceKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRow {
    pub kind: SourceKind,
    pub timestamp: Option<NaiveDate>,
    pub fields: Fields,
    pub source_id: String,
    pub collected_at: NaiveDate,
}
