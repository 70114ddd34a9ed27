//! # Knowledge Collector CLI (`kbc`)
//!
//! The `kbc` binary drives the multi-source ingestion pipeline: sink
//! initialization, collection runs, and inspection of what has been
//! persisted.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbc init` | Create the sink database and schema |
//! | `kbc sources` | Show configured stores and their status |
//! | `kbc collect` | Backfill every source and tail live changes |
//! | `kbc stats` | Summarize persisted entries |
//! | `kbc get <id>` | Print one persisted entry |
//! | `kbc clear` | Remove every persisted entry |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the sink
//! kbc init --config ./config/kbc.toml
//!
//! # Full fresh ingestion: clear, sweep, then tail until Ctrl-C
//! kbc collect --fresh
//!
//! # Bounded historical sweep only
//! kbc collect --backfill-only --since 2024-01-01
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use knowledge_collector::collector::{CollectOptions, Collector};
use knowledge_collector::normalize::Normalizer;
use knowledge_collector::sink::SinkWriter;
use knowledge_collector::source_sqlite::SqliteSourceStore;
use knowledge_collector::{config, db, get, migrate, sources, stats};

/// Knowledge Collector — multi-source change-capture ingestion into a
/// unified knowledge base.
#[derive(Parser)]
#[command(
    name = "kbc",
    about = "Knowledge Collector — multi-source ingestion into a unified knowledge base",
    version,
    long_about = "Knowledge Collector sweeps heterogeneous source stores (content fetches, news, \
    social posts, scraped items), normalizes every record into one canonical entry shape, and \
    persists the result idempotently into a unified sink. Live change subscriptions keep the \
    sink current while the historical backfill runs."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the sink database schema.
    ///
    /// Creates the SQLite sink and the knowledge_entries table. Idempotent.
    Init,

    /// Show configured stores and their status.
    Sources,

    /// Backfill every source store and tail live changes until Ctrl-C.
    ///
    /// Change subscriptions start first and run concurrently with the
    /// sequential backfill sweeps; both paths deduplicate through the sink.
    Collect {
        /// Clear the sink before ingesting.
        #[arg(long)]
        fresh: bool,

        /// Only ingest records fetched on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Skip change tracking; exit when the sweeps finish.
        #[arg(long)]
        backfill_only: bool,
    },

    /// Summarize persisted entries.
    Stats,

    /// Print one persisted entry by id.
    Get {
        /// Sink-assigned entry id.
        id: i64,
    },

    /// Remove every persisted entry from the sink.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Sink initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Collect {
            fresh,
            since,
            backfill_only,
        } => {
            let since = since.map(|s| parse_since(&s)).transpose()?;
            run_collect(&cfg, fresh, since, backfill_only).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Clear => {
            let pool = db::connect(&cfg.sink.path, false).await?;
            let sink = SinkWriter::new(pool);
            let removed = sink.clear_all().await?;
            println!("Removed {} entries.", removed);
        }
    }

    Ok(())
}

async fn run_collect(
    cfg: &config::Config,
    fresh: bool,
    since: Option<i64>,
    backfill_only: bool,
) -> Result<()> {
    let poll_interval = Duration::from_millis(cfg.collector.poll_interval_ms);
    let batch_size = cfg.collector.scan_batch_size;

    let content_fetcher = SqliteSourceStore::open(
        "content_fetcher",
        &cfg.sources.content_fetcher.path,
        poll_interval,
        batch_size,
    )
    .await?;
    let news_aggregator = SqliteSourceStore::open(
        "news_aggregator",
        &cfg.sources.news_aggregator.path,
        poll_interval,
        batch_size,
    )
    .await?;

    let sink_pool = db::connect(&cfg.sink.path, false)
        .await
        .with_context(|| "Failed to open sink database (run `kbc init` first)")?;

    let collector = Collector::new(
        Normalizer::new(cfg.collector.aggregator_host.clone()),
        Arc::new(SinkWriter::new(sink_pool)),
        Arc::new(content_fetcher),
        Arc::new(news_aggregator),
    );

    let opts = CollectOptions {
        fresh,
        since,
        backfill_only,
    };

    collector
        .run(opts, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}

/// Parse a `YYYY-MM-DD` lower bound into epoch seconds.
fn parse_since(s: &str) -> Result<i64> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid --since date: '{}'. Expected YYYY-MM-DD", s))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp())
}
