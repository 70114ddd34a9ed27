//! Typed access to one source collection.
//!
//! [`SourceStream`] binds a record type to its store and exposes the two
//! pipeline access patterns: an ordered backfill sweep with an early-stop
//! callback, and a decoded change feed. Documents that fail to decode are
//! logged and skipped; they never abort a sweep or a subscription.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::CollectorError;
use crate::models::SourceDocument;
use crate::source::{ChangeFeed, ScanSpec, SourceStore};

pub struct SourceStream<R: SourceDocument> {
    store: Arc<dyn SourceStore>,
    _record: PhantomData<R>,
}

impl<R: SourceDocument> SourceStream<R> {
    pub fn new(store: Arc<dyn SourceStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// Sweep the collection in reverse-chronological order, invoking
    /// `on_record` per decoded record until it returns `true` or the scan
    /// is exhausted. The cursor is closed on every exit path.
    pub async fn backfill_scan<F, Fut>(
        &self,
        since: Option<i64>,
        mut on_record: F,
    ) -> Result<(), CollectorError>
    where
        F: FnMut(R) -> Fut + Send,
        Fut: Future<Output = bool> + Send,
    {
        let mut cursor = self
            .store
            .scan(ScanSpec {
                collection: R::COLLECTION,
                order_field: R::ORDER_FIELD,
                since_field: R::SINCE_FIELD,
                since,
            })
            .await?;

        let outcome = loop {
            let doc = match cursor.next_document().await {
                Ok(Some(doc)) => doc,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };
            let record = match R::from_document(&doc) {
                Ok(record) => record,
                Err(err) => {
                    warn!(collection = R::COLLECTION, error = %err, "skipping undecodable document");
                    continue;
                }
            };
            if on_record(record).await {
                break Ok(());
            }
        };

        let closed = cursor.close().await;
        outcome.and(closed)
    }

    /// Open the live change feed for this collection, decoded per event.
    pub async fn track_changes(&self) -> Result<TypedChangeFeed<R>, CollectorError> {
        let feed = self.store.subscribe(R::COLLECTION).await?;
        Ok(TypedChangeFeed {
            feed,
            _record: PhantomData,
        })
    }
}

/// A change notification with both sides decoded.
///
/// Raw-document presence is tracked separately from decode success so that
/// an update whose pre-change document fails to decode is still recognized
/// as an update, never misread as a creation.
#[derive(Debug)]
pub struct RecordChange<R> {
    pub new_record: Option<R>,
    pub old_record: Option<R>,
    pub had_new: bool,
    pub had_old: bool,
}

impl<R> RecordChange<R> {
    /// The decoded record, when this event created new content.
    pub fn into_created(self) -> Option<R> {
        if self.had_old {
            None
        } else {
            self.new_record
        }
    }
}

/// Decoded view over a raw [`ChangeFeed`].
pub struct TypedChangeFeed<R: SourceDocument> {
    feed: ChangeFeed,
    _record: PhantomData<R>,
}

impl<R: SourceDocument> TypedChangeFeed<R> {
    /// Next change; `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<RecordChange<R>> {
        let event = self.feed.next().await?;
        Some(RecordChange {
            had_new: event.new_doc.is_some(),
            had_old: event.old_doc.is_some(),
            new_record: event.new_doc.as_ref().and_then(|doc| decode_lossy::<R>(doc)),
            old_record: event.old_doc.as_ref().and_then(|doc| decode_lossy::<R>(doc)),
        })
    }

    pub fn close(self) {
        self.feed.close();
    }
}

fn decode_lossy<R: SourceDocument>(doc: &Value) -> Option<R> {
    match R::from_document(doc) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(collection = R::COLLECTION, error = %err, "dropping undecodable change document");
            None
        }
    }
}
