//! # Knowledge Collector
//!
//! A multi-source change-capture ingestion pipeline. Records from
//! independently-evolving stores — a content-fetch store, a news store, a
//! social-post store, and a generic scraper store — are normalized into one
//! canonical knowledge entry shape and persisted, without duplicates, into
//! a unified sink consumed by search and LLM context assembly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ SourceStores │──▶│ SourceStream │──▶│ Normalizer  │
//! │ scan + tail  │   │ typed records│   │ per-type    │
//! └──────────────┘   └──────────────┘   └──────┬──────┘
//!                                              ▼
//!                                       ┌─────────────┐
//!                                       │ SinkWriter  │
//!                                       │ dedup insert│
//!                                       └─────────────┘
//! ```
//!
//! The [`collector::Collector`] owns the run: it connects every store,
//! launches one live change subscription per source type, then drains the
//! historical backfill sweeps sequentially. Both paths funnel through the
//! same normalize-and-write step; the sink's `(content, sourceType)`
//! dedup check keeps replays and races from persisting twice.
//!
//! ## Quick start
//!
//! ```bash
//! kbc init                      # create the sink database
//! kbc sources                   # check store connectivity
//! kbc collect --fresh           # clear the sink, then ingest + tail
//! kbc collect --backfill-only   # one bounded sweep, no tailing
//! kbc stats                     # what landed
//! ```

pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod sink;
pub mod source;
pub mod source_memory;
pub mod source_sqlite;
pub mod sources;
pub mod stats;
pub mod stream;
