// src/ingest/sink.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PipelineError, SinkError};
use crate::ingest::aggregate::AggregateTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fixed leading columns; field columns follow in first-seen order.
pub const BASE_COLUMNS: [&str; 3] = ["date", "source_id", "collected_at"];

/// Both variants keep non-ASCII text intact; the BOM helps spreadsheet tools detect it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    Utf8,
    #[default]
    Utf8Bom,
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn write(
        &self,
        table: &AggregateTable,
        target: &str,
        encoding: Encoding,
    ) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    pub target: String,
    pub rows: usize,
    pub columns: usize,
}

/// Hands a non-empty table to `sink`. An empty table never reaches the sink.
pub async fn emit<S: Sink + ?Sized>(
    sink: &S,
    table: &AggregateTable,
    target: &str,
    encoding: Encoding,
) -> Result<EmitReport, PipelineError> {
    if table.is_empty() {
        tracing::warn!(target_path = target, "nothing collected, output not written");
        return Err(PipelineError::NoDataCollected);
    }
    sink.write(table, target, encoding).await?;
    let report = EmitReport {
        target: target.to_string(),
        rows: table.len(),
        columns: BASE_COLUMNS.len() + table.field_names().len(),
    };
    tracing::info!(
        target_path = target,
        rows = report.rows,
        columns = report.columns,
        "table written"
    );
    Ok(report)
}

pub fn write_csv<W: Write>(
    mut out: W,
    table: &AggregateTable,
    encoding: Encoding,
) -> Result<(), SinkError> {
    if encoding == Encoding::Utf8Bom {
        out.write_all(UTF8_BOM)?;
    }
    let field_names = table.field_names();
    let mut wtr = csv::Writer::from_writer(out);

    let header = BASE_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(field_names.iter().cloned());
    wtr.write_record(header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(BASE_COLUMNS.len() + field_names.len());
        record.push(row.timestamp.map(|d| d.to_string()).unwrap_or_default());
        record.push(row.source_id.clone());
        record.push(row.collected_at.to_string());
        for name in &field_names {
            record.push(row.fields.get(name).map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Renders the table as CSV bytes.
pub fn render_csv(table: &AggregateTable, encoding: Encoding) -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, table, encoding)?;
    Ok(buf)
}

/// Sibling file the table is written to before being renamed over `target`.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{name}.tmp"))
}

fn write_file(path: &Path, table: &AggregateTable, encoding: Encoding) -> Result<(), SinkError> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    write_csv(&mut out, table, encoding)?;
    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(())
}

/// Writes a CSV file at `target`, creating parent directories.
/// The target is replaced only once the whole table has been written.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFileSink;

#[async_trait]
impl Sink for CsvFileSink {
    async fn write(
        &self,
        table: &AggregateTable,
        target: &str,
        encoding: Encoding,
    ) -> Result<(), SinkError> {
        let path = Path::new(target);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = staging_path(path);
        if let Err(e) = write_file(&staging, table, encoding) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, path)?;
        Ok(())
    }
}

/// Records writes in memory instead of persisting them.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub calls: Mutex<Vec<(String, AggregateTable)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(
        &self,
        table: &AggregateTable,
        target: &str,
        _encoding: Encoding,
    ) -> Result<(), SinkError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((target.to_string(), table.clone()));
        }
        Ok(())
    }
}
