//! Core data models for the collector.
//!
//! Each upstream store produces its own record shape; the pipeline decodes
//! those into typed records, normalizes them into [`KnowledgeEntry`], and
//! persists the result. Source records exist only transiently inside the
//! pipeline — the sink never stores them.

use serde::Deserialize;
use serde_json::Value;

use crate::error::CollectorError;

/// Canonical origin tag for a persisted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    News,
    Content,
    Tweet,
    ScraperItem,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::News,
        SourceType::Content,
        SourceType::Tweet,
        SourceType::ScraperItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::News => "News",
            SourceType::Content => "Content",
            SourceType::Tweet => "Tweet",
            SourceType::ScraperItem => "ScraperItem",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "News" => Ok(SourceType::News),
            "Content" => Ok(SourceType::Content),
            "Tweet" => Ok(SourceType::Tweet),
            "ScraperItem" => Ok(SourceType::ScraperItem),
            other => Err(CollectorError::UnsupportedSourceType(other.to_string())),
        }
    }
}

/// A page fetched and redirect-resolved by the content-fetch store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedItem {
    pub id: i64,
    #[serde(default)]
    pub related_news_id: Option<i64>,
    #[serde(default)]
    pub related_tweet_id: Option<i64>,
    /// Creation time of the record this fetch was triggered by.
    pub related_create_at: i64,
    #[serde(default)]
    pub fetched_at: Option<i64>,
    pub content: String,
    pub base_url: String,
    /// Post-redirect URL; empty or absent when no redirection occurred.
    #[serde(default)]
    pub url: Option<String>,
}

/// An article collected by the news-aggregator store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: i64,
    /// Id of the upstream feed the article originated from.
    #[serde(rename = "id_source")]
    pub id_source: i64,
    #[serde(default)]
    pub fetched_at: Option<i64>,
    pub publication_date: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: String,
}

/// A social post captured by the news-aggregator store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: i64,
    /// Account handle; reused downstream as the author.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub post_time: i64,
}

/// A generic item produced by the scraper store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedItem {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Human-readable date, used when no explicit timestamp was captured.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fetched_at: Option<i64>,
}

/// Tagged union over every record shape the pipeline ingests.
#[derive(Debug, Clone)]
pub enum SourceRecord {
    Fetched(FetchedItem),
    News(NewsItem),
    Social(SocialPost),
    Scraped(ScrapedItem),
}

impl SourceRecord {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceRecord::Fetched(_) => SourceType::Content,
            SourceRecord::News(_) => SourceType::News,
            SourceRecord::Social(_) => SourceType::Tweet,
            SourceRecord::Scraped(_) => SourceType::ScraperItem,
        }
    }

    pub fn source_id(&self) -> i64 {
        match self {
            SourceRecord::Fetched(item) => item.id,
            SourceRecord::News(item) => item.id,
            SourceRecord::Social(post) => post.id,
            SourceRecord::Scraped(item) => item.id,
        }
    }
}

/// Decoding contract tying a typed record to its source collection.
///
/// The associated constants drive the backfill scan: records are visited in
/// descending `ORDER_FIELD` order, and the optional `since` bound filters on
/// `SINCE_FIELD`.
pub trait SourceDocument: Sized + Send {
    const COLLECTION: &'static str;
    const ORDER_FIELD: &'static str;
    const SINCE_FIELD: &'static str;

    fn from_document(doc: &Value) -> Result<Self, CollectorError>;

    fn into_record(self) -> SourceRecord;
}

fn decode<T: serde::de::DeserializeOwned>(
    collection: &'static str,
    doc: &Value,
) -> Result<T, CollectorError> {
    serde_json::from_value(doc.clone())
        .map_err(|source| CollectorError::Decode { collection, source })
}

impl SourceDocument for FetchedItem {
    const COLLECTION: &'static str = "Content";
    const ORDER_FIELD: &'static str = "id";
    const SINCE_FIELD: &'static str = "fetchedAt";

    fn from_document(doc: &Value) -> Result<Self, CollectorError> {
        decode(Self::COLLECTION, doc)
    }

    fn into_record(self) -> SourceRecord {
        SourceRecord::Fetched(self)
    }
}

impl SourceDocument for NewsItem {
    const COLLECTION: &'static str = "News";
    const ORDER_FIELD: &'static str = "id";
    const SINCE_FIELD: &'static str = "fetchedAt";

    fn from_document(doc: &Value) -> Result<Self, CollectorError> {
        decode(Self::COLLECTION, doc)
    }

    fn into_record(self) -> SourceRecord {
        SourceRecord::News(self)
    }
}

impl SourceDocument for SocialPost {
    const COLLECTION: &'static str = "Tweet";
    // Posts carry no separate fetch time; postTime orders and filters both.
    const ORDER_FIELD: &'static str = "postTime";
    const SINCE_FIELD: &'static str = "postTime";

    fn from_document(doc: &Value) -> Result<Self, CollectorError> {
        decode(Self::COLLECTION, doc)
    }

    fn into_record(self) -> SourceRecord {
        SourceRecord::Social(self)
    }
}

impl SourceDocument for ScrapedItem {
    const COLLECTION: &'static str = "ScraperItem";
    const ORDER_FIELD: &'static str = "id";
    const SINCE_FIELD: &'static str = "fetchedAt";

    fn from_document(doc: &Value) -> Result<Self, CollectorError> {
        decode(Self::COLLECTION, doc)
    }

    fn into_record(self) -> SourceRecord {
        SourceRecord::Scraped(self)
    }
}

/// The canonical, source-agnostic entry persisted to the sink.
///
/// `(content, source_type)` is the logical identity used for deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    pub source_type: SourceType,
    pub source_id: i64,
    pub content: String,
    pub url: Option<String>,
    /// Only set when a distinct post-redirect URL exists.
    pub final_url: Option<String>,
    pub description: Option<String>,
    /// Derived author; empty when unknown, `"-1"` when URL parsing failed.
    pub author: String,
    /// Id of the record this entry relates to, or the source id itself.
    pub base_entity_id: i64,
    pub created_at: i64,
    pub fetched_at: i64,
    /// Ingestion-processing time, set on every write.
    pub updated_at: Option<i64>,
}

/// A knowledge entry together with its sink-assigned identity.
#[derive(Debug, Clone)]
pub struct PersistedEntry {
    pub id: i64,
    pub entry: KnowledgeEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_type_round_trip() {
        for st in SourceType::ALL {
            assert_eq!(st.as_str().parse::<SourceType>().unwrap(), st);
        }
    }

    #[test]
    fn source_type_rejects_unknown() {
        let err = "Rss".parse::<SourceType>().unwrap_err();
        assert!(matches!(err, CollectorError::UnsupportedSourceType(ref s) if s == "Rss"));
    }

    #[test]
    fn decodes_fetched_item_from_camel_case_document() {
        let doc = json!({
            "id": 7,
            "relatedNewsId": 12,
            "relatedTweetId": 0,
            "relatedCreateAt": 1700000000,
            "fetchedAt": 1700000100,
            "status": "done",
            "content": "body text",
            "baseUrl": "example.com/page",
            "url": "https://example.com/final",
            "errors": [],
            "retryCounter": 0
        });
        let item = FetchedItem::from_document(&doc).unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.related_news_id, Some(12));
        assert_eq!(item.base_url, "example.com/page");
        assert_eq!(item.url.as_deref(), Some("https://example.com/final"));
    }

    #[test]
    fn decodes_news_item_with_snake_case_source_id() {
        let doc = json!({
            "id": 3,
            "id_source": 44,
            "fetchedAt": 1700000000,
            "publicationDate": 1699990000,
            "title": "Senate Passes Bill - Jane Doe",
            "description": "desc",
            "link": "http://example.com/a",
            "tags": ["politics"]
        });
        let item = NewsItem::from_document(&doc).unwrap();
        assert_eq!(item.id_source, 44);
        assert_eq!(item.link, "http://example.com/a");
    }

    #[test]
    fn decode_failure_reports_collection() {
        let doc = json!({ "id": "not-a-number" });
        let err = SocialPost::from_document(&doc).unwrap_err();
        assert!(matches!(
            err,
            CollectorError::Decode {
                collection: "Tweet",
                ..
            }
        ));
    }

    #[test]
    fn scraped_item_tolerates_missing_optionals() {
        let doc = json!({ "id": 9, "url": "example.org/x" });
        let item = ScrapedItem::from_document(&doc).unwrap();
        assert!(item.title.is_none());
        assert!(item.timestamp.is_none());
        assert!(item.fetched_at.is_none());
    }
}
