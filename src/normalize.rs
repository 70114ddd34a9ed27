//! Pure normalization of source records into canonical knowledge entries.
//!
//! One derivation rule per source type. No I/O: the only inputs are the
//! record itself, the configured aggregator host, and the ingestion
//! timestamp passed by the caller. The per-variant match is exhaustive, so
//! a record shape without a rule cannot reach this module.

use url::Url;

use crate::models::{
    FetchedItem, KnowledgeEntry, NewsItem, ScrapedItem, SocialPost, SourceRecord, SourceType,
};

/// Author value recorded when URL-based derivation fails.
pub const AUTHOR_PARSE_FAILED: &str = "-1";

/// Maps typed source records to [`KnowledgeEntry`] values.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Host whose article links are bylined in the title rather than
    /// attributed to the linked site.
    aggregator_host: String,
}

impl Normalizer {
    pub fn new(aggregator_host: impl Into<String>) -> Self {
        Self {
            aggregator_host: aggregator_host.into(),
        }
    }

    /// Derive the canonical entry for `record`.
    ///
    /// `now` is the ingestion-processing time (epoch seconds); it becomes
    /// `updated_at` and the default for any missing fetch timestamp.
    pub fn normalize(&self, record: &SourceRecord, now: i64) -> KnowledgeEntry {
        match record {
            SourceRecord::Fetched(item) => self.from_fetched(item, now),
            SourceRecord::News(item) => self.from_news(item, now),
            SourceRecord::Social(post) => self.from_social(post, now),
            SourceRecord::Scraped(item) => self.from_scraped(item, now),
        }
    }

    fn from_fetched(&self, item: &FetchedItem, now: i64) -> KnowledgeEntry {
        let final_url = item
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        // Redirect target wins for attribution when present.
        let author_url = final_url.as_deref().unwrap_or(&item.base_url);
        let author =
            url_host(author_url).unwrap_or_else(|| AUTHOR_PARSE_FAILED.to_string());

        let base_entity_id = item
            .related_news_id
            .filter(|id| *id > 0)
            .or(item.related_tweet_id.filter(|id| *id > 0))
            .unwrap_or(item.id);

        KnowledgeEntry {
            source_type: SourceType::Content,
            source_id: item.id,
            content: item.content.clone(),
            url: Some(item.base_url.clone()),
            final_url,
            description: None,
            author,
            base_entity_id,
            created_at: item.related_create_at,
            fetched_at: item.fetched_at.unwrap_or(now),
            updated_at: Some(now),
        }
    }

    fn from_news(&self, item: &NewsItem, now: i64) -> KnowledgeEntry {
        KnowledgeEntry {
            source_type: SourceType::News,
            source_id: item.id,
            content: item.title.clone(),
            url: Some(item.link.clone()),
            final_url: None,
            description: Some(item.description.clone()),
            author: self.news_author(item),
            base_entity_id: item.id_source,
            created_at: item.publication_date,
            fetched_at: item.fetched_at.unwrap_or(now),
            updated_at: Some(now),
        }
    }

    fn from_social(&self, post: &SocialPost, now: i64) -> KnowledgeEntry {
        KnowledgeEntry {
            source_type: SourceType::Tweet,
            source_id: post.id,
            content: post.text.clone(),
            url: None,
            final_url: None,
            description: None,
            author: post.title.clone(),
            base_entity_id: post.id,
            created_at: post.post_time,
            // Posts carry no separate fetch time.
            fetched_at: post.post_time,
            updated_at: Some(now),
        }
    }

    fn from_scraped(&self, item: &ScrapedItem, now: i64) -> KnowledgeEntry {
        let fetched_at = item.fetched_at.unwrap_or(now);
        let created_at = item
            .timestamp
            .or_else(|| item.date.as_deref().and_then(parse_date_string))
            .unwrap_or(fetched_at);

        KnowledgeEntry {
            source_type: SourceType::ScraperItem,
            source_id: item.id,
            content: item.title.clone().unwrap_or_default(),
            url: Some(item.url.clone()),
            final_url: None,
            description: item.description.clone(),
            author: url_host(&item.url).unwrap_or_else(|| AUTHOR_PARSE_FAILED.to_string()),
            base_entity_id: item.id,
            created_at,
            fetched_at,
            updated_at: Some(now),
        }
    }

    /// News author: aggregator-hosted links carry the author as the last
    /// `-`-delimited segment of the title; third-party links are attributed
    /// to their host.
    fn news_author(&self, item: &NewsItem) -> String {
        match Url::parse(&item.link).ok().and_then(|u| {
            u.host_str().map(str::to_string)
        }) {
            Some(host) if host == self.aggregator_host => {
                match item.title.rsplit_once('-') {
                    Some((_, byline)) => byline.trim().to_string(),
                    None => String::new(),
                }
            }
            Some(host) => host,
            None => AUTHOR_PARSE_FAILED.to_string(),
        }
    }
}

/// Host of `raw`, prefixing `https://` when the scheme is missing.
fn url_host(raw: &str) -> Option<String> {
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{raw}"))
    };
    parsed.ok().and_then(|u| u.host_str().map(str::to_string))
}

/// Best-effort parse of a human-readable date into epoch seconds.
fn parse_date_string(date: &str) -> Option<i64> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(date) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGGREGATOR: &str = "newsaggregator.local";
    const NOW: i64 = 1_700_000_000;

    fn normalizer() -> Normalizer {
        Normalizer::new(AGGREGATOR)
    }

    fn news_item(title: &str, link: &str) -> NewsItem {
        NewsItem {
            id: 1,
            id_source: 10,
            fetched_at: Some(1_699_999_000),
            publication_date: 1_699_990_000,
            title: title.to_string(),
            description: "desc".to_string(),
            link: link.to_string(),
        }
    }

    #[test]
    fn news_author_from_third_party_host() {
        let record = SourceRecord::News(news_item(
            "Senate Passes Bill - Jane Doe",
            "http://example.com/a",
        ));
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, "example.com");
        assert_eq!(entry.content, "Senate Passes Bill - Jane Doe");
        assert_eq!(entry.base_entity_id, 10);
        assert_eq!(entry.created_at, 1_699_990_000);
    }

    #[test]
    fn news_author_from_aggregator_byline() {
        let record = SourceRecord::News(news_item(
            "Senate Passes Bill - Jane Doe",
            &format!("https://{AGGREGATOR}/articles/42"),
        ));
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, "Jane Doe");
    }

    #[test]
    fn news_author_empty_when_aggregator_title_has_no_byline() {
        let record = SourceRecord::News(news_item(
            "Senate Passes Bill",
            &format!("https://{AGGREGATOR}/articles/42"),
        ));
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, "");
    }

    #[test]
    fn news_author_sentinel_on_unparsable_link() {
        let record = SourceRecord::News(news_item("Title - Someone", "not a url"));
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, AUTHOR_PARSE_FAILED);
    }

    #[test]
    fn social_post_reuses_handle_as_author() {
        let record = SourceRecord::Social(SocialPost {
            id: 5,
            title: "@reuters".to_string(),
            text: "breaking".to_string(),
            post_time: 1_699_000_000,
        });
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, "@reuters");
        assert_eq!(entry.content, "breaking");
        assert_eq!(entry.url, None);
        assert_eq!(entry.final_url, None);
        assert_eq!(entry.created_at, 1_699_000_000);
        assert_eq!(entry.fetched_at, 1_699_000_000);
        assert_eq!(entry.updated_at, Some(NOW));
    }

    fn fetched_item() -> FetchedItem {
        FetchedItem {
            id: 8,
            related_news_id: None,
            related_tweet_id: None,
            related_create_at: 1_698_000_000,
            fetched_at: Some(1_698_100_000),
            content: "page body".to_string(),
            base_url: "example.org/x".to_string(),
            url: None,
        }
    }

    #[test]
    fn fetched_author_prefixes_missing_scheme() {
        let record = SourceRecord::Fetched(fetched_item());
        let entry = normalizer().normalize(&record, NOW);
        assert_eq!(entry.author, "example.org");
        assert_eq!(entry.url.as_deref(), Some("example.org/x"));
        assert_eq!(entry.final_url, None);
    }

    #[test]
    fn fetched_final_url_ignored_when_empty() {
        let mut item = fetched_item();
        item.url = Some(String::new());
        let entry = normalizer().normalize(&SourceRecord::Fetched(item), NOW);
        assert_eq!(entry.final_url, None);
        assert_eq!(entry.author, "example.org");
    }

    #[test]
    fn fetched_author_prefers_redirect_target() {
        let mut item = fetched_item();
        item.url = Some("https://cdn.example.net/landing".to_string());
        let entry = normalizer().normalize(&SourceRecord::Fetched(item), NOW);
        assert_eq!(entry.final_url.as_deref(), Some("https://cdn.example.net/landing"));
        assert_eq!(entry.author, "cdn.example.net");
    }

    #[test]
    fn fetched_author_sentinel_on_malformed_url() {
        let mut item = fetched_item();
        item.base_url = "ht tp://???".to_string();
        let entry = normalizer().normalize(&SourceRecord::Fetched(item), NOW);
        assert_eq!(entry.author, AUTHOR_PARSE_FAILED);
    }

    #[test]
    fn fetched_base_entity_prefers_news_then_tweet_then_self() {
        let mut item = fetched_item();
        item.related_news_id = Some(31);
        item.related_tweet_id = Some(77);
        let entry = normalizer().normalize(&SourceRecord::Fetched(item.clone()), NOW);
        assert_eq!(entry.base_entity_id, 31);

        item.related_news_id = Some(0);
        let entry = normalizer().normalize(&SourceRecord::Fetched(item.clone()), NOW);
        assert_eq!(entry.base_entity_id, 77);

        item.related_tweet_id = None;
        let entry = normalizer().normalize(&SourceRecord::Fetched(item), NOW);
        assert_eq!(entry.base_entity_id, 8);
    }

    #[test]
    fn fetched_missing_fetch_time_defaults_to_now() {
        let mut item = fetched_item();
        item.fetched_at = None;
        let entry = normalizer().normalize(&SourceRecord::Fetched(item), NOW);
        assert_eq!(entry.fetched_at, NOW);
    }

    fn scraped_item() -> ScrapedItem {
        ScrapedItem {
            id: 12,
            url: "blog.example.io/post".to_string(),
            title: Some("Post title".to_string()),
            timestamp: Some(1_697_000_000),
            date: None,
            description: Some("summary".to_string()),
            fetched_at: Some(1_697_500_000),
        }
    }

    #[test]
    fn scraped_author_is_url_host() {
        let entry = normalizer().normalize(&SourceRecord::Scraped(scraped_item()), NOW);
        assert_eq!(entry.author, "blog.example.io");
        assert_eq!(entry.content, "Post title");
        assert_eq!(entry.description.as_deref(), Some("summary"));
        assert_eq!(entry.base_entity_id, 12);
    }

    #[test]
    fn scraped_created_at_falls_back_to_date_string() {
        let mut item = scraped_item();
        item.timestamp = None;
        item.date = Some("2023-10-11".to_string());
        let entry = normalizer().normalize(&SourceRecord::Scraped(item), NOW);
        let expected = chrono::NaiveDate::from_ymd_opt(2023, 10, 11)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(entry.created_at, expected);
    }

    #[test]
    fn scraped_created_at_falls_back_to_fetch_time_when_date_unparsable() {
        let mut item = scraped_item();
        item.timestamp = None;
        item.date = Some("next Tuesday".to_string());
        let entry = normalizer().normalize(&SourceRecord::Scraped(item), NOW);
        assert_eq!(entry.created_at, 1_697_500_000);
    }

    #[test]
    fn parses_common_date_formats() {
        assert!(parse_date_string("2023-10-11T08:30:00Z").is_some());
        assert!(parse_date_string("Wed, 11 Oct 2023 08:30:00 +0000").is_some());
        assert!(parse_date_string("2023-10-11 08:30:00").is_some());
        assert!(parse_date_string("2023-10-11").is_some());
        assert!(parse_date_string("").is_none());
        assert!(parse_date_string("garbage").is_none());
    }
}
