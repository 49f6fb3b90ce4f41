use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use std::cmp::Ordering;

use crate::error::ServiceError;
use crate::models::news::{FeedKind, FeedSourceConfig, NewsItem};
use crate::models::settings::BotSettings;
use crate::utils::http::build_feed_client;
use crate::utils::text::unescape_entities;

/// A pull-based news source
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn tag(&self) -> &str;

    /// Fetches and normalizes the current entries of this source.
    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError>;
}

/// Builds one source per configured feed.
pub fn build_sources(settings: &BotSettings) -> anyhow::Result<Vec<Box<dyn FeedSource>>> {
    let client = build_feed_client()?;
    let sources = settings
        .all_sources()
        .into_iter()
        .map(|config| -> Box<dyn FeedSource> {
            match config.kind {
                FeedKind::Rss => Box::new(RssSource::new(
                    client.clone(),
                    config,
                    settings.max_entries_per_feed,
                )),
                FeedKind::Marketaux => Box::new(MarketauxSource::new(
                    client.clone(),
                    config,
                    settings.marketaux_api_key.clone().unwrap_or_default(),
                    settings.max_entries_per_feed,
                )),
            }
        })
        .collect();
    Ok(sources)
}

/// Fetches every source, isolating failures, and returns all items newest first.
/// Items without a timestamp are kept but sort after every dated item.
pub async fn collect(sources: &[Box<dyn FeedSource>]) -> Vec<NewsItem> {
    let results = join_all(sources.iter().map(|s| s.fetch())).await;

    let mut items = Vec::new();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(batch) => {
                log::info!("fetched {} entries from {}", batch.len(), source.tag());
                items.extend(batch);
            }
            Err(e) => {
                log::warn!("feed {} skipped: {}", source.tag(), e);
            }
        }
    }

    sort_newest_first(&mut items);
    items
}

/// Descending by `published_at`, undated items last. Stable for equal keys.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| match (&a.published_at, &b.published_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Keeps the `max` newest entries of one feed, whatever order the document lists them in.
fn cap_newest(items: &mut Vec<NewsItem>, max: Option<usize>) {
    if let Some(max) = max {
        sort_newest_first(items);
        items.truncate(max);
    }
}

// ============================================================
// RSS / Atom
// ============================================================

pub struct RssSource {
    client: reqwest::Client,
    config: FeedSourceConfig,
    max_entries: Option<usize>,
}

impl RssSource {
    pub fn new(client: reqwest::Client, config: FeedSourceConfig, max_entries: Option<usize>) -> Self {
        Self {
            client,
            config,
            max_entries,
        }
    }
}

#[async_trait]
impl FeedSource for RssSource {
    fn tag(&self) -> &str {
        &self.config.tag
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError> {
        let resp = self.client.get(&self.config.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::status(status, &body));
        }
        let bytes = resp.bytes().await?;
        let mut items = parse_feed(&bytes, &self.config.tag)?;
        cap_newest(&mut items, self.max_entries);
        Ok(items)
    }
}

/// Parses an RSS/Atom/JSON Feed document. Entries with neither title nor link are dropped.
pub fn parse_feed(bytes: &[u8], source_tag: &str) -> Result<Vec<NewsItem>, ServiceError> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| ServiceError::Malformed(format!("feed parse error: {}", e)))?;

    let mut items = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let title = entry
            .title
            .map(|t| unescape_entities(&t.content).trim().to_string())
            .unwrap_or_default();
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();

        if title.is_empty() && link.is_empty() {
            log::debug!("{}: dropping entry {} without title or link", source_tag, entry.id);
            continue;
        }

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let published = entry.published.or(entry.updated);

        items.push(NewsItem::new(title, summary, link, published, source_tag));
    }
    Ok(items)
}

// ============================================================
// Marketaux news API
// ============================================================

#[derive(Deserialize)]
struct MarketauxEnvelope {
    #[serde(default)]
    data: Vec<MarketauxArticle>,
}

#[derive(Deserialize)]
struct MarketauxArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

pub struct MarketauxSource {
    client: reqwest::Client,
    config: FeedSourceConfig,
    api_key: String,
    max_entries: Option<usize>,
}

impl MarketauxSource {
    pub fn new(
        client: reqwest::Client,
        config: FeedSourceConfig,
        api_key: String,
        max_entries: Option<usize>,
    ) -> Self {
        Self {
            client,
            config,
            api_key,
            max_entries,
        }
    }
}

#[async_trait]
impl FeedSource for MarketauxSource {
    fn tag(&self) -> &str {
        &self.config.tag
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError> {
        let resp = self
            .client
            .get(&self.config.url)
            .query(&[
                ("categories", "crypto"),
                ("language", "en"),
                ("api_token", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::status(status, &body));
        }
        let mut items = parse_marketaux(&body, &self.config.tag)?;
        cap_newest(&mut items, self.max_entries);
        Ok(items)
    }
}

/// Normalizes a Marketaux `news/all` response.
pub fn parse_marketaux(body: &str, source_tag: &str) -> Result<Vec<NewsItem>, ServiceError> {
    let envelope: MarketauxEnvelope = serde_json::from_str(body)?;

    let items = envelope
        .data
        .into_iter()
        .filter_map(|article| {
            let title = unescape_entities(article.title.as_deref().unwrap_or("")).trim().to_string();
            let link = article.url.unwrap_or_default();
            if title.is_empty() && link.trim().is_empty() {
                return None;
            }
            let summary = article
                .description
                .filter(|d| !d.trim().is_empty())
                .or(article.snippet)
                .unwrap_or_default();
            let published = article.published_at.as_deref().and_then(parse_timestamp);
            Some(NewsItem::new(title, summary, link, published, source_tag))
        })
        .collect();
    Ok(items)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc2822(raw.trim()))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
