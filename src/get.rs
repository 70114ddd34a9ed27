use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::sink::SinkWriter;

/// Print one persisted entry by its sink-assigned id.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(&config.sink.path, false).await?;
    let sink = SinkWriter::new(pool);

    let Some(persisted) = sink.get(id).await? else {
        bail!("No entry with id {id}");
    };
    let entry = &persisted.entry;

    println!("id:             {}", persisted.id);
    println!("source type:    {}", entry.source_type);
    println!("source id:      {}", entry.source_id);
    println!("author:         {}", entry.author);
    println!("url:            {}", entry.url.as_deref().unwrap_or("-"));
    println!(
        "final url:      {}",
        entry.final_url.as_deref().unwrap_or("-")
    );
    println!(
        "description:    {}",
        entry.description.as_deref().unwrap_or("-")
    );
    println!("base entity id: {}", entry.base_entity_id);
    println!("created at:     {}", entry.created_at);
    println!("fetched at:     {}", entry.fetched_at);
    println!(
        "updated at:     {}",
        entry
            .updated_at
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!();
    println!("{}", entry.content);

    Ok(())
}
