//! Sink statistics overview.
//!
//! Summarizes what the collector has persisted: entry counts per source
//! type and recency of the newest entry. Used by `kbc stats` to confirm
//! that sweeps and change tracking are landing data.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::models::SourceType;

/// Run the stats command: query the sink and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.sink.path, false).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_entries")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.sink.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Knowledge Collector — Sink Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.sink.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Entries:     {}", total);

    let rows = sqlx::query(
        r#"
        SELECT source_type, COUNT(*) AS entry_count, MAX(fetched_at) AS last_fetched
        FROM knowledge_entries
        GROUP BY source_type
        ORDER BY entry_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !rows.is_empty() {
        println!();
        println!("  By source type:");
        println!("  {:<14} {:>8}   {}", "TYPE", "ENTRIES", "LAST FETCHED");
        println!("  {}", "-".repeat(48));
        for row in &rows {
            let source_type: String = row.get("source_type");
            let entry_count: i64 = row.get("entry_count");
            let last_fetched: Option<i64> = row.get("last_fetched");
            let fetched_display = match last_fetched {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<14} {:>8}   {}",
                source_type, entry_count, fetched_display
            );
        }

        for st in SourceType::ALL {
            if !rows
                .iter()
                .any(|r| r.get::<String, _>("source_type") == st.as_str())
            {
                println!("  {:<14} {:>8}   never", st.as_str(), 0);
            }
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
