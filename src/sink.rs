//! Idempotency-checked writes to the unified knowledge store.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::CollectorError;
use crate::models::{KnowledgeEntry, PersistedEntry, SourceType};

pub struct SinkWriter {
    pool: SqlitePool,
}

impl SinkWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `entry` unless the sink already holds its
    /// `(content, sourceType)` pair.
    ///
    /// The existence check and the insert are separate statements, so two
    /// writers racing on the same pair can both pass the check; the UNIQUE
    /// constraint on the table turns the lost race into [`CollectorError::Duplicate`]
    /// rather than a second row.
    pub async fn write(&self, entry: &KnowledgeEntry) -> Result<PersistedEntry, CollectorError> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM knowledge_entries WHERE content = ? AND source_type = ?",
        )
        .bind(&entry.content)
        .bind(entry.source_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(CollectorError::Duplicate {
                source_type: entry.source_type,
                source_id: entry.source_id,
            });
        }

        let result = sqlx::query(
            r#"
            INSERT INTO knowledge_entries
                (source_type, source_id, content, url, final_url, description,
                 author, base_entity_id, created_at, fetched_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.source_type.as_str())
        .bind(entry.source_id)
        .bind(&entry.content)
        .bind(&entry.url)
        .bind(&entry.final_url)
        .bind(&entry.description)
        .bind(&entry.author)
        .bind(entry.base_entity_id)
        .bind(entry.created_at)
        .bind(entry.fetched_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(PersistedEntry {
                id: done.last_insert_rowid(),
                entry: entry.clone(),
            }),
            Err(err) if is_unique_violation(&err) => Err(CollectorError::Duplicate {
                source_type: entry.source_type,
                source_id: entry.source_id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every persisted entry. Only invoked as an explicit reset
    /// before a fresh ingestion run.
    pub async fn clear_all(&self) -> Result<u64, CollectorError> {
        let result = sqlx::query("DELETE FROM knowledge_entries")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: i64) -> Result<Option<PersistedEntry>, CollectorError> {
        let row = sqlx::query("SELECT * FROM knowledge_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| entry_from_row(&r)).transpose()
    }

    pub async fn count(&self) -> Result<i64, CollectorError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn entry_from_row(row: &SqliteRow) -> Result<PersistedEntry, CollectorError> {
    let source_type: String = row.try_get("source_type")?;
    Ok(PersistedEntry {
        id: row.try_get("id")?,
        entry: KnowledgeEntry {
            source_type: source_type.parse::<SourceType>()?,
            source_id: row.try_get("source_id")?,
            content: row.try_get("content")?,
            url: row.try_get("url")?,
            final_url: row.try_get("final_url")?,
            description: row.try_get("description")?,
            author: row.try_get("author")?,
            base_entity_id: row.try_get("base_entity_id")?,
            created_at: row.try_get("created_at")?,
            fetched_at: row.try_get("fetched_at")?,
            updated_at: row.try_get("updated_at")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn memory_sink() -> SinkWriter {
        // One connection: each sqlite::memory: connection is its own database.
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        SinkWriter::new(pool)
    }

    fn entry(content: &str, source_type: SourceType) -> KnowledgeEntry {
        KnowledgeEntry {
            source_type,
            source_id: 1,
            content: content.to_string(),
            url: Some("https://example.com".to_string()),
            final_url: None,
            description: None,
            author: "example.com".to_string(),
            base_entity_id: 1,
            created_at: 100,
            fetched_at: 200,
            updated_at: Some(300),
        }
    }

    #[tokio::test]
    async fn write_assigns_identity() {
        let sink = memory_sink().await;
        let persisted = sink.write(&entry("a", SourceType::News)).await.unwrap();
        assert!(persisted.id > 0);

        let fetched = sink.get(persisted.id).await.unwrap().unwrap();
        assert_eq!(fetched.entry, entry("a", SourceType::News));
    }

    #[tokio::test]
    async fn second_write_of_same_pair_is_duplicate() {
        let sink = memory_sink().await;
        sink.write(&entry("a", SourceType::News)).await.unwrap();

        let err = sink.write(&entry("a", SourceType::News)).await.unwrap_err();
        assert!(matches!(err, CollectorError::Duplicate { .. }));
        assert!(err.is_recoverable());
        assert_eq!(sink.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_content_under_different_type_is_distinct() {
        let sink = memory_sink().await;
        sink.write(&entry("a", SourceType::News)).await.unwrap();
        sink.write(&entry("a", SourceType::Tweet)).await.unwrap();
        assert_eq!(sink.count().await.unwrap(), 2);
    }

    // The existence check and the insert are not atomic: two writers can
    // both pass the check before either inserts. The UNIQUE constraint
    // decides the race, so exactly one write succeeds regardless of
    // interleaving.
    #[tokio::test]
    async fn concurrent_writers_racing_on_one_pair_persist_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect(&tmp.path().join("sink.sqlite"), true)
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();

        let a = SinkWriter::new(pool.clone());
        let b = SinkWriter::new(pool.clone());
        let racing = entry("a", SourceType::News);

        let (first, second) = tokio::join!(a.write(&racing), b.write(&racing));

        let wins = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for result in [first, second] {
            if let Err(err) = result {
                assert!(matches!(err, CollectorError::Duplicate { .. }));
            }
        }
        assert_eq!(a.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_all_reports_removed_count() {
        let sink = memory_sink().await;
        sink.write(&entry("a", SourceType::News)).await.unwrap();
        sink.write(&entry("b", SourceType::News)).await.unwrap();

        assert_eq!(sink.clear_all().await.unwrap(), 2);
        assert_eq!(sink.count().await.unwrap(), 0);
    }
}
