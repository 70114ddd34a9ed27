use anyhow::Result;

use crate::config::Config;

/// Print a status table for the configured stores.
pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<18} {:<44} {}", "STORE", "PATH", "STATUS");

    let sink_status = if config.sink.path.exists() {
        "OK"
    } else {
        "NOT INITIALIZED (run `kbc init`)"
    };
    println!(
        "{:<18} {:<44} {}",
        "sink",
        config.sink.path.display().to_string(),
        sink_status
    );

    for (name, source) in [
        ("content_fetcher", &config.sources.content_fetcher),
        ("news_aggregator", &config.sources.news_aggregator),
    ] {
        let status = if source.path.exists() {
            "OK"
        } else {
            "NOT FOUND"
        };
        println!(
            "{:<18} {:<44} {}",
            name,
            source.path.display().to_string(),
            status
        );
    }

    Ok(())
}
