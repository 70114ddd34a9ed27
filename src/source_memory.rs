//! In-memory [`SourceStore`] implementation for tests.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`; change
//! subscribers receive events over unbounded channels. Unlike the SQLite
//! backend, tests can script arbitrary events — including updates carrying
//! both a pre- and post-change document — and observe cursor lifecycles
//! through [`MemorySourceStore::open_cursors`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::CollectorError;
use crate::source::{ChangeEvent, ChangeFeed, RecordCursor, ScanSpec, SourceStore};

pub struct MemorySourceStore {
    name: String,
    collections: RwLock<HashMap<String, Vec<Value>>>,
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<ChangeEvent>>>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemorySourceStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Insert a document and notify subscribers of a creation.
    pub fn insert_document(&self, collection: &str, doc: Value) {
        self.collections
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        self.notify(
            collection,
            ChangeEvent {
                new_doc: Some(doc),
                old_doc: None,
            },
        );
    }

    /// Replace the document whose `id` matches `new` and notify subscribers
    /// of an update (pre- and post-change documents both present).
    pub fn update_document(&self, collection: &str, new: Value) {
        let id = new.get("id").cloned();
        let mut old = None;
        if let Some(docs) = self.collections.write().unwrap().get_mut(collection) {
            if let Some(existing) = docs.iter_mut().find(|d| d.get("id") == id.as_ref()) {
                old = Some(existing.clone());
                *existing = new.clone();
            }
        }
        self.notify(
            collection,
            ChangeEvent {
                new_doc: Some(new),
                old_doc: old,
            },
        );
    }

    /// Number of scan cursors opened but not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn notify(&self, collection: &str, event: ChangeEvent) {
        if let Some(senders) = self.subscribers.write().unwrap().get_mut(collection) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

fn doc_field(doc: &Value, field: &str) -> i64 {
    doc.get(field).and_then(Value::as_i64).unwrap_or(0)
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), CollectorError> {
        Ok(())
    }

    async fn scan(&self, spec: ScanSpec) -> Result<Box<dyn RecordCursor>, CollectorError> {
        let mut docs: Vec<Value> = self
            .collections
            .read()
            .unwrap()
            .get(spec.collection)
            .cloned()
            .unwrap_or_default();

        if let Some(since) = spec.since {
            docs.retain(|d| doc_field(d, spec.since_field) > since);
        }
        docs.sort_by_key(|d| std::cmp::Reverse(doc_field(d, spec.order_field)));

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryCursor {
            docs: docs.into(),
            open_cursors: self.open_cursors.clone(),
            closed: false,
        }))
    }

    async fn subscribe(&self, collection: &'static str) -> Result<ChangeFeed, CollectorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(tx);
        Ok(ChangeFeed::new(rx, None))
    }

    async fn close(&self) {
        self.subscribers.write().unwrap().clear();
    }
}

struct MemoryCursor {
    docs: VecDeque<Value>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl RecordCursor for MemoryCursor {
    async fn next_document(&mut self) -> Result<Option<Value>, CollectorError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.docs.pop_front())
    }

    async fn close(&mut self) -> Result<(), CollectorError> {
        if !self.closed {
            self.closed = true;
            self.docs.clear();
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
