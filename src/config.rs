use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sink: SinkConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Host whose news links are bylined in the article title itself.
    #[serde(default = "default_aggregator_host")]
    pub aggregator_host: String,

    /// Cadence of the change-feed poll loop for SQLite-backed sources.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Page size for backfill scans.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            aggregator_host: default_aggregator_host(),
            poll_interval_ms: default_poll_interval_ms(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

fn default_aggregator_host() -> String {
    "newsaggregator.local".to_string()
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_scan_batch_size() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Store hosting the `Content` collection.
    pub content_fetcher: SourceDbConfig,
    /// Store hosting the `Tweet`, `News`, and `ScraperItem` collections.
    pub news_aggregator: SourceDbConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceDbConfig {
    pub path: PathBuf,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.collector.aggregator_host.trim().is_empty() {
        anyhow::bail!("collector.aggregator_host must not be empty");
    }

    if config.collector.poll_interval_ms == 0 {
        anyhow::bail!("collector.poll_interval_ms must be > 0");
    }

    if config.collector.scan_batch_size == 0 {
        anyhow::bail!("collector.scan_batch_size must be > 0");
    }

    Ok(config)
}
