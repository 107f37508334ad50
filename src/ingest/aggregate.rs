// src/ingest/aggregate.rs
use serde::Serialize;
use std::collections::HashSet;

use crate::ingest::types::{CanonicalRow, SourceKind};

/// Ordered rows of one run. Built by [`Aggregator`], handed to the sink whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateTable {
    rows: Vec<CanonicalRow>,
}

impl AggregateTable {
    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Union of field names across rows, first-seen order.
    pub fn field_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for row in &self.rows {
            for name in row.fields.names() {
                if seen.insert(name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }
}

/// Identity used for deduplication; `None` means the row is always kept.
///
/// News rows are keyed by case-folded title. Quote and indicator rows are keyed
/// by (source, date) so re-merging the same data never grows the table.
pub fn dedup_key(row: &CanonicalRow) -> Option<String> {
    match row.kind {
        SourceKind::HtmlPage => row
            .fields
            .get("title")
            .and_then(|v| v.as_text())
            .map(|t| format!("{}|{}", row.kind.as_str(), t.to_lowercase())),
        SourceKind::TimeSeries | SourceKind::StatSeries => row
            .timestamp
            .map(|d| format!("{}|{}|{}", row.kind.as_str(), row.source_id, d)),
    }
}

/// Appends rows in arrival order, discarding later rows whose key was already seen.
#[derive(Debug, Default)]
pub struct Aggregator {
    rows: Vec<CanonicalRow>,
    seen: HashSet<String>,
    duplicates: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the row was a duplicate and got dropped.
    pub fn push(&mut self, row: CanonicalRow) -> bool {
        if let Some(key) = dedup_key(&row) {
            if !self.seen.insert(key) {
                self.duplicates += 1;
                return false;
            }
        }
        self.rows.push(row);
        true
    }

    /// Returns how many of `rows` were dropped as duplicates.
    pub fn merge<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = CanonicalRow>,
    {
        let before = self.duplicates;
        for row in rows {
            self.push(row);
        }
        self.duplicates - before
    }

    pub fn finish(self) -> AggregateTable {
        AggregateTable { rows: self.rows }
    }
}

/// One-shot merge of an arbitrary row sequence.
pub fn merge<I>(rows: I) -> AggregateTable
where
    I: IntoIterator<Item = CanonicalRow>,
{
    let mut agg = Aggregator::new();
    agg.merge(rows);
    agg.finish()
}
