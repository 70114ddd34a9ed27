//! Error taxonomy for the ingestion pipeline.
//!
//! Connection failures are fatal and abort the run. Decode failures and
//! duplicate entries are per-record conditions: the record is skipped and
//! ingestion continues.

use thiserror::Error;

use crate::models::SourceType;

#[derive(Error, Debug)]
pub enum CollectorError {
    /// Startup connection to a source store or the sink failed.
    #[error("failed to connect to {name}: {message}")]
    Connection { name: String, message: String },

    /// A single source document could not be decoded into its typed record.
    #[error("cannot decode document from {collection}: {source}")]
    Decode {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A source-type tag outside the known set. Signals a caller contract
    /// violation, not bad data.
    #[error("unsupported source type: {0}")]
    UnsupportedSourceType(String),

    /// The sink already holds an entry with this `(content, sourceType)` pair.
    #[error("duplicate entry for {source_type} record {source_id}")]
    Duplicate {
        source_type: SourceType,
        source_id: i64,
    },

    /// Underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl CollectorError {
    /// Whether ingestion may skip the current record and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Duplicate { .. })
    }
}
