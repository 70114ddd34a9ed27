use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.sink.path, true).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the sink schema on `pool`. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // The UNIQUE constraint backs the idempotency check: two writers racing
    // past the existence check cannot both insert the same logical entry.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_type TEXT NOT NULL,
            source_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            url TEXT,
            final_url TEXT,
            description TEXT,
            author TEXT NOT NULL DEFAULT '',
            base_entity_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            fetched_at INTEGER NOT NULL,
            updated_at INTEGER,
            UNIQUE(content, source_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_source_type ON knowledge_entries(source_type)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_created_at ON knowledge_entries(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
