//! Ingestion orchestration.
//!
//! A run moves through connect → subscribe → backfill → drain. Every
//! source store is connected up front (any failure aborts startup), one
//! change-tracking task is launched per source type, and then the backfill
//! sweeps run sequentially — Content, News, Tweet, ScraperItem — each
//! record flowing through the normalizer into the sink.
//!
//! Change subscriptions are not blocked by backfill and may deliver events
//! for records a sweep also visits; there is no ordering between the two
//! paths. The sink's duplicate check makes that race harmless: whichever
//! path loses sees [`CollectorError::Duplicate`] and discards it.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CollectorError;
use crate::models::{FetchedItem, NewsItem, ScrapedItem, SocialPost, SourceDocument, SourceRecord};
use crate::normalize::Normalizer;
use crate::sink::SinkWriter;
use crate::source::SourceStore;
use crate::stream::{SourceStream, TypedChangeFeed};

/// Options for one collection run.
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Clear the sink before ingesting.
    pub fresh: bool,
    /// Only ingest records fetched after this time (epoch seconds).
    pub since: Option<i64>,
    /// Skip change tracking and exit once the sweeps finish.
    pub backfill_only: bool,
}

#[derive(Clone)]
pub struct Collector {
    normalizer: Normalizer,
    sink: Arc<SinkWriter>,
    content_fetcher: Arc<dyn SourceStore>,
    news_aggregator: Arc<dyn SourceStore>,
    shutdown: watch::Sender<bool>,
}

impl Collector {
    pub fn new(
        normalizer: Normalizer,
        sink: Arc<SinkWriter>,
        content_fetcher: Arc<dyn SourceStore>,
        news_aggregator: Arc<dyn SourceStore>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            normalizer,
            sink,
            content_fetcher,
            news_aggregator,
            shutdown,
        }
    }

    /// Run the full pipeline, then tail changes until `until_shutdown`
    /// resolves (skipped when `backfill_only`).
    pub async fn run<S>(&self, opts: CollectOptions, until_shutdown: S) -> Result<(), CollectorError>
    where
        S: Future<Output = ()>,
    {
        self.connect().await?;

        if opts.fresh {
            let removed = self.sink.clear_all().await?;
            info!(removed, "cleared sink for fresh ingestion");
        }

        let trackers = if opts.backfill_only {
            Vec::new()
        } else {
            self.start_change_tracking().await?
        };

        self.run_backfill(opts.since).await?;

        if !opts.backfill_only {
            info!("backfill complete; tailing changes");
            until_shutdown.await;
        }

        self.drain(trackers).await;
        Ok(())
    }

    /// Connect every source store. Any failure is fatal — there is no
    /// partial-pipeline mode.
    pub async fn connect(&self) -> Result<(), CollectorError> {
        self.content_fetcher.connect().await?;
        self.news_aggregator.connect().await?;
        Ok(())
    }

    /// Open one change subscription per source type and launch its
    /// consuming task. Subscriptions are established before this returns,
    /// so no event created afterwards can be missed; the tasks run until
    /// [`Collector::drain`]. A subscription failure aborts startup.
    pub async fn start_change_tracking(&self) -> Result<Vec<JoinHandle<()>>, CollectorError> {
        let content: SourceStream<FetchedItem> =
            SourceStream::new(Arc::clone(&self.content_fetcher));
        let posts: SourceStream<SocialPost> = SourceStream::new(Arc::clone(&self.news_aggregator));
        let news: SourceStream<NewsItem> = SourceStream::new(Arc::clone(&self.news_aggregator));
        let scraped: SourceStream<ScrapedItem> =
            SourceStream::new(Arc::clone(&self.news_aggregator));

        Ok(vec![
            self.spawn_tracker(content.track_changes().await?),
            self.spawn_tracker(posts.track_changes().await?),
            self.spawn_tracker(news.track_changes().await?),
            self.spawn_tracker(scraped.track_changes().await?),
        ])
    }

    /// Sweep every source collection sequentially: one source is fully
    /// drained before the next begins.
    pub async fn run_backfill(&self, since: Option<i64>) -> Result<(), CollectorError> {
        info!("sweeping Content");
        let stream: SourceStream<FetchedItem> =
            SourceStream::new(Arc::clone(&self.content_fetcher));
        stream
            .backfill_scan(since, |item| {
                let record = item.into_record();
                async move {
                    self.ingest_record(&record).await;
                    false
                }
            })
            .await?;

        info!("sweeping News");
        let stream: SourceStream<NewsItem> = SourceStream::new(Arc::clone(&self.news_aggregator));
        stream
            .backfill_scan(since, |item| {
                let record = item.into_record();
                async move {
                    self.ingest_record(&record).await;
                    false
                }
            })
            .await?;

        info!("sweeping Tweet");
        let stream: SourceStream<SocialPost> = SourceStream::new(Arc::clone(&self.news_aggregator));
        stream
            .backfill_scan(since, |item| {
                let record = item.into_record();
                async move {
                    self.ingest_record(&record).await;
                    false
                }
            })
            .await?;

        info!("sweeping ScraperItem");
        let stream: SourceStream<ScrapedItem> =
            SourceStream::new(Arc::clone(&self.news_aggregator));
        stream
            .backfill_scan(since, |item| {
                let record = item.into_record();
                async move {
                    self.ingest_record(&record).await;
                    false
                }
            })
            .await?;

        Ok(())
    }

    /// Stop change subscriptions, let in-flight writes finish, and close
    /// the store connections.
    pub async fn drain(&self, trackers: Vec<JoinHandle<()>>) {
        if !trackers.is_empty() {
            info!("draining change subscriptions");
        }
        let _ = self.shutdown.send(true);
        for tracker in trackers {
            let _ = tracker.await;
        }
        self.content_fetcher.close().await;
        self.news_aggregator.close().await;
    }

    fn spawn_tracker<R>(&self, mut feed: TypedChangeFeed<R>) -> JoinHandle<()>
    where
        R: SourceDocument + 'static,
    {
        let collector = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            info!(collection = R::COLLECTION, "tracking changes");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    change = feed.next() => match change {
                        Some(change) => {
                            // Creation events only: updates and deletes
                            // carry a pre-change document and are ignored.
                            if let Some(record) = change.into_created() {
                                collector.ingest_record(&record.into_record()).await;
                            }
                        }
                        None => break,
                    },
                }
            }
            feed.close();
        })
    }

    /// Normalize and persist one record. Duplicates are expected and
    /// discarded; any other failure is logged and the record skipped.
    async fn ingest_record(&self, record: &SourceRecord) {
        let now = Utc::now().timestamp();
        let entry = self.normalizer.normalize(record, now);
        match self.sink.write(&entry).await {
            Ok(persisted) => {
                debug!(
                    source_type = %entry.source_type,
                    source_id = entry.source_id,
                    id = persisted.id,
                    "persisted entry"
                );
            }
            Err(CollectorError::Duplicate { .. }) => {
                debug!(
                    source_type = %entry.source_type,
                    source_id = entry.source_id,
                    "skipping duplicate entry"
                );
            }
            Err(err) => {
                warn!(
                    source_type = %entry.source_type,
                    source_id = entry.source_id,
                    error = %err,
                    "failed to persist record"
                );
            }
        }
    }
}
