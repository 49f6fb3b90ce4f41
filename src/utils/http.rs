use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;

const BOT_USER_AGENT: &str = "Mozilla/5.0 (compatible; coin-digest/0.2; +https://github.com/)";

/// Client for RSS/Atom documents and news APIs
pub fn build_feed_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BOT_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/rss+xml, application/atom+xml, application/xml, application/json;q=0.9, */*;q=0.8"),
    );

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(15))
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Client for summarization / translation services
pub fn build_ai_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Telegram Bot API client
pub fn build_telegram_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    Ok(client)
}

/// CoinGecko market data client
pub fn build_market_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BOT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(15))
        .gzip(true)
        .build()?;
    Ok(client)
}
