// src/config/collector.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::normalize::DEFAULT_TRIM_COUNT;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::sink::Encoding;
use crate::ingest::types::{SourceDescriptor, SourceKind};
use crate::ingest::CollectorSettings;

pub const ENV_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/collector.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/collector.json";

fn default_trim_count() -> usize {
    DEFAULT_TRIM_COUNT
}
fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_secs() -> u64 {
    30
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// One output table: an ordered source list plus the knobs for fetching it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub output: PathBuf,
    #[serde(default)]
    pub encoding: Encoding,
    /// Env var holding the API key, e.g. `ALPHA_VANTAGE_API_KEY`.
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Resolved from `credential_env` at load time; never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_trim_count")]
    pub trim_count: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default)]
    pub inter_request_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sources: Vec<SourceDescriptor>,
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settings(&self) -> CollectorSettings {
        CollectorSettings {
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff: Duration::from_secs(self.backoff_secs),
            },
            inter_request_delay: Duration::from_secs(self.inter_request_delay_secs),
            trim_count: self.trim_count,
            keywords: self.keywords.clone(),
            api_key: self.api_key.clone(),
        }
    }

    fn resolve_credential(&mut self) {
        self.api_key = self
            .credential_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let (Some(var), None) = (&self.credential_env, &self.api_key) {
            tracing::warn!(job = %self.name, env = %var, "credential env var is not set");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.trim_count == 0 {
            bail!("job {}: trim_count must be at least 1", self.name);
        }
        if self.max_attempts == 0 {
            bail!("job {}: max_attempts must be at least 1", self.name);
        }
        if self.timeout_secs == 0 {
            bail!("job {}: timeout_secs must be positive", self.name);
        }
        let has_html = self.sources.iter().any(|s| s.kind == SourceKind::HtmlPage);
        if has_html && self.keywords.iter().all(|k| k.trim().is_empty()) {
            bail!("job {}: html_page sources need at least one keyword", self.name);
        }
        for s in &self.sources {
            if s.id.trim().is_empty() {
                bail!("job {}: source with empty id", self.name);
            }
            if s.endpoint_template.trim().is_empty() {
                bail!("job {}: source {} has no endpoint", self.name, s.id);
            }
        }
        Ok(())
    }
}

impl CollectorConfig {
    fn finish(mut self) -> Result<Self> {
        for job in &mut self.jobs {
            job.validate()?;
            job.resolve_credential();
        }
        Ok(self)
    }
}

/// Load from an explicit path. TOML or JSON, chosen by extension.
pub fn load_config_from(path: &Path) -> Result<CollectorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading collector config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, &ext)
        .with_context(|| format!("parsing collector config {}", path.display()))
}

/// Load using env var + fallbacks:
/// 1) $COLLECTOR_CONFIG_PATH
/// 2) config/collector.toml
/// 3) config/collector.json
pub fn load_config_default() -> Result<CollectorConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    Err(anyhow!(
        "no collector config found (set {ENV_CONFIG_PATH} or create {DEFAULT_CONFIG_TOML})"
    ))
}

fn parse_config(s: &str, hint_ext: &str) -> Result<CollectorConfig> {
    let cfg: CollectorConfig = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        toml::from_str(s)?
    };
    cfg.finish()
}
