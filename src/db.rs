use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open a SQLite pool for `path`.
///
/// The sink is created on demand. Source databases belong to their
/// upstream producers and must already exist; a missing path is a
/// connection failure, not an empty database.
pub async fn connect(path: &Path, create_if_missing: bool) -> Result<SqlitePool> {
    if create_if_missing {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(create_if_missing)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
