//! Collector binary: runs every configured job once and writes one CSV per job.
//!
//! Config: `$COLLECTOR_CONFIG_PATH` or `config/collector.toml`.
//! Credentials come from the environment (a `.env` file is honoured).

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_data_collector::config::{self, JobConfig};
use market_data_collector::ingest::sink::{emit, CsvFileSink};
use market_data_collector::metrics::Metrics;
use market_data_collector::{Collector, PipelineError, ReqwestTransport};

/// Compact text logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_data_collector=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run_job(job: &JobConfig) -> Result<()> {
    let transport = ReqwestTransport::new(job.timeout(), &job.user_agent)?;
    let collector = Collector::new(transport, job.settings());

    let report = collector.run(&job.sources).await?;
    report.log_summary(&job.name);

    let target = job.output.to_string_lossy();
    emit(&CsvFileSink, &report.table, &target, job.encoding).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let cfg = config::load_config_default()?;
    tracing::info!(jobs = cfg.jobs.len(), "config loaded");

    for job in &cfg.jobs {
        if let Err(e) = run_job(job).await {
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::NoDataCollected) => {
                    tracing::warn!(job = %job.name, "nothing collected; no file written")
                }
                _ => tracing::error!(job = %job.name, error = %e, "job failed"),
            }
        }
    }

    if let (Some(m), Ok(path)) = (&metrics, std::env::var("METRICS_DUMP_PATH")) {
        if let Err(e) = m.dump_to(&PathBuf::from(path)) {
            tracing::warn!(error = ?e, "metrics dump failed");
        }
    }
    Ok(())
}
