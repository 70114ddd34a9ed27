//! SQLite-backed [`SourceStore`].
//!
//! Each collection is a table of JSON documents (`id INTEGER PRIMARY KEY,
//! doc TEXT`). Scans page through `json_extract` projections of the
//! ordering and filter fields; the change subscription is a rowid-watermark
//! poll loop that emits a creation event per newly-inserted row.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::warn;

use crate::db;
use crate::error::CollectorError;
use crate::source::{ChangeEvent, ChangeFeed, RecordCursor, ScanSpec, SourceStore};

#[derive(Debug)]
pub struct SqliteSourceStore {
    name: String,
    pool: SqlitePool,
    poll_interval: Duration,
    batch_size: usize,
}

impl SqliteSourceStore {
    /// Open the store at `path`. The database must already exist — source
    /// databases belong to their upstream producers.
    pub async fn open(
        name: impl Into<String>,
        path: &Path,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Result<Self, CollectorError> {
        let name = name.into();
        let pool = db::connect(path, false)
            .await
            .map_err(|err| CollectorError::Connection {
                name: name.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            name,
            pool,
            poll_interval,
            batch_size,
        })
    }

    /// Open the store, creating the database file if missing. Used by test
    /// fixtures and seeding tools that stand in for the upstream producers.
    pub async fn create(
        name: impl Into<String>,
        path: &Path,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Result<Self, CollectorError> {
        let name = name.into();
        let pool = db::connect(path, true)
            .await
            .map_err(|err| CollectorError::Connection {
                name: name.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            name,
            pool,
            poll_interval,
            batch_size,
        })
    }

    /// Create the document table for `collection` if missing.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), CollectorError> {
        sqlx::query(&format!(
            r#"CREATE TABLE IF NOT EXISTS "{collection}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc TEXT NOT NULL
            )"#
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a document to `collection`, returning its row id.
    pub async fn insert_document(
        &self,
        collection: &str,
        doc: &Value,
    ) -> Result<i64, CollectorError> {
        let result = sqlx::query(&format!(r#"INSERT INTO "{collection}" (doc) VALUES (?)"#))
            .bind(doc.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), CollectorError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| CollectorError::Connection {
                name: self.name.clone(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    async fn scan(&self, spec: ScanSpec) -> Result<Box<dyn RecordCursor>, CollectorError> {
        // Collection and field names are compile-time constants from the
        // record types, never user input.
        let mut sql = format!(
            r#"SELECT doc FROM "{}""#,
            spec.collection
        );
        if spec.since.is_some() {
            sql.push_str(&format!(
                " WHERE CAST(json_extract(doc, '$.{}') AS INTEGER) > ?",
                spec.since_field
            ));
        }
        sql.push_str(&format!(
            " ORDER BY CAST(json_extract(doc, '$.{}') AS INTEGER) DESC LIMIT ? OFFSET ?",
            spec.order_field
        ));

        Ok(Box::new(SqliteCursor {
            pool: self.pool.clone(),
            sql,
            since: spec.since,
            batch_size: self.batch_size as i64,
            offset: 0,
            page: Vec::new(),
            exhausted: false,
            closed: false,
        }))
    }

    async fn subscribe(&self, collection: &'static str) -> Result<ChangeFeed, CollectorError> {
        // Start tailing strictly after the rows that already exist; backfill
        // owns history.
        let watermark: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COALESCE(MAX(id), 0) FROM "{collection}""#
        ))
        .fetch_one(&self.pool)
        .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pool = self.pool.clone();
        let interval = self.poll_interval;
        let producer = tokio::spawn(async move {
            poll_inserts(pool, collection, watermark, interval, tx).await;
        });

        Ok(ChangeFeed::new(rx, Some(producer)))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Poll `collection` for rows past `watermark`, forwarding each as a
/// creation event. Runs until the feed is closed.
async fn poll_inserts(
    pool: SqlitePool,
    collection: &'static str,
    mut watermark: i64,
    interval: Duration,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) {
    let sql = format!(r#"SELECT id, doc FROM "{collection}" WHERE id > ? ORDER BY id ASC"#);
    loop {
        tokio::time::sleep(interval).await;

        let rows: Vec<(i64, String)> = match sqlx::query_as(&sql)
            .bind(watermark)
            .fetch_all(&pool)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(collection, error = %err, "change poll failed");
                continue;
            }
        };

        for (id, doc) in rows {
            watermark = id;
            let doc: Value = match serde_json::from_str(&doc) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(collection, row = id, error = %err, "skipping malformed document");
                    continue;
                }
            };
            let event = ChangeEvent {
                new_doc: Some(doc),
                old_doc: None,
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}

struct SqliteCursor {
    pool: SqlitePool,
    sql: String,
    since: Option<i64>,
    batch_size: i64,
    offset: i64,
    page: Vec<Value>,
    exhausted: bool,
    closed: bool,
}

impl SqliteCursor {
    async fn fetch_page(&mut self) -> Result<(), CollectorError> {
        let mut query = sqlx::query_scalar::<_, String>(&self.sql);
        if let Some(since) = self.since {
            query = query.bind(since);
        }
        let rows = query
            .bind(self.batch_size)
            .bind(self.offset)
            .fetch_all(&self.pool)
            .await?;

        self.offset += rows.len() as i64;
        if (rows.len() as i64) < self.batch_size {
            self.exhausted = true;
        }

        // Pop from the back; reverse so page order matches scan order.
        let mut page: Vec<Value> = Vec::with_capacity(rows.len());
        for raw in rows {
            match serde_json::from_str(&raw) {
                Ok(doc) => page.push(doc),
                Err(err) => warn!(error = %err, "skipping malformed document"),
            }
        }
        page.reverse();
        self.page = page;
        Ok(())
    }
}

#[async_trait]
impl RecordCursor for SqliteCursor {
    async fn next_document(&mut self) -> Result<Option<Value>, CollectorError> {
        if self.closed {
            return Ok(None);
        }
        while self.page.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
        Ok(self.page.pop())
    }

    async fn close(&mut self) -> Result<(), CollectorError> {
        self.closed = true;
        self.page.clear();
        self.exhausted = true;
        Ok(())
    }
}
