//! Source store abstraction.
//!
//! A source store hosts one or more collections of JSON documents and
//! offers the two access patterns the pipeline needs: an ordered,
//! cursor-paginated scan for backfill, and a live change subscription for
//! tailing. The engine behind a store is deliberately out of view here —
//! backends only have to honor these contracts.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::CollectorError;

/// Ordered scan request for one collection.
///
/// Records are visited in descending `order_field` order; when `since` is
/// set, only documents whose `since_field` exceeds it are yielded.
#[derive(Debug, Clone)]
pub struct ScanSpec {
    pub collection: &'static str,
    pub order_field: &'static str,
    pub since_field: &'static str,
    pub since: Option<i64>,
}

/// One store-level change notification.
///
/// Either document may be absent: a creation has no pre-change document, a
/// deletion has no post-change document.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub new_doc: Option<Value>,
    pub old_doc: Option<Value>,
}

impl ChangeEvent {
    /// True when the event represents newly-created content.
    pub fn is_creation(&self) -> bool {
        self.old_doc.is_none() && self.new_doc.is_some()
    }
}

/// Live, unbounded feed of change events for one collection.
///
/// The feed yields events until [`ChangeFeed::close`] is called (or the
/// feed is dropped); closing also stops the producing task, if any. It is
/// the consumer's responsibility to close the feed at shutdown.
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    producer: Option<JoinHandle<()>>,
}

impl ChangeFeed {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeEvent>, producer: Option<JoinHandle<()>>) -> Self {
        Self { rx, producer }
    }

    /// Wait for the next event; `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Stop the subscription and release its producer.
    pub fn close(mut self) {
        self.stop_producer();
    }

    fn stop_producer(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.stop_producer();
    }
}

/// Server-side cursor over an ordered scan.
///
/// Callers must invoke [`RecordCursor::close`] on every exit path — normal
/// exhaustion, early stop, and error alike.
#[async_trait]
pub trait RecordCursor: Send {
    /// Fetch the next document, or `None` when the scan is exhausted.
    async fn next_document(&mut self) -> Result<Option<Value>, CollectorError>;

    /// Release the cursor's resources. Subsequent `next_document` calls
    /// return `None`.
    async fn close(&mut self) -> Result<(), CollectorError>;
}

/// A store hosting source collections.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Name used in logs and connection errors.
    fn name(&self) -> &str;

    /// Verify connectivity. Called once at startup; failure aborts the run.
    async fn connect(&self) -> Result<(), CollectorError>;

    /// Open an ordered scan over one collection.
    async fn scan(&self, spec: ScanSpec) -> Result<Box<dyn RecordCursor>, CollectorError>;

    /// Open a live change subscription for one collection.
    async fn subscribe(&self, collection: &'static str) -> Result<ChangeFeed, CollectorError>;

    /// Release the store connection.
    async fn close(&self);
}
