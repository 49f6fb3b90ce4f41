use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a feed comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedKind {
    /// RSS 2.0 / Atom / JSON Feed document
    Rss,
    /// Marketaux news API (crypto category)
    Marketaux,
}

/// A configured news source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSourceConfig {
    pub kind: FeedKind,
    /// Short label carried into every item, e.g. `coindesk.com`
    pub tag: String,
    pub url: String,
}

impl FeedSourceConfig {
    pub fn rss(url: &str) -> Self {
        Self {
            kind: FeedKind::Rss,
            tag: tag_from_url(url),
            url: url.trim().to_string(),
        }
    }

    pub fn marketaux(url: &str) -> Self {
        Self {
            kind: FeedKind::Marketaux,
            tag: "marketaux".to_string(),
            url: url.to_string(),
        }
    }
}

/// A normalized news entry, independent of the feed format it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Stable identifier (canonical link or content hash)
    pub id: String,
    pub title: String,
    /// Raw summary, may still contain markup
    pub summary_raw: String,
    pub link: String,
    /// `None` when the feed gave no usable timestamp
    pub published_at: Option<DateTime<Utc>>,
    pub source_tag: String,
}

impl NewsItem {
    /// Builds an item and derives its identifier from the link or, failing that, the content.
    pub fn new(
        title: String,
        summary_raw: String,
        link: String,
        published_at: Option<DateTime<Utc>>,
        source_tag: &str,
    ) -> Self {
        let id = item_id(&link, &title, &summary_raw);
        Self {
            id,
            title,
            summary_raw,
            link: link.trim().to_string(),
            published_at,
            source_tag: source_tag.to_string(),
        }
    }
}

/// Identifier for dedup. The canonical link wins; entries without a link are keyed
/// by a hash of their content so an edited title elsewhere cannot collide with them.
pub fn item_id(link: &str, title: &str, summary_raw: &str) -> String {
    let canonical = canonical_link(link);
    if !canonical.is_empty() {
        return canonical;
    }
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(summary_raw.trim().as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Trimmed link without fragment and trailing slash.
pub fn canonical_link(link: &str) -> String {
    let link = link.trim();
    let link = match link.find('#') {
        Some(pos) => &link[..pos],
        None => link,
    };
    link.trim_end_matches('/').to_string()
}

fn tag_from_url(url: &str) -> String {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = rest.split('/').next().unwrap_or(rest);
    host.trim_start_matches("www.").to_string()
}
