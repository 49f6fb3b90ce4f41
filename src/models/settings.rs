use chrono::NaiveTime;
use chrono_tz::Tz;

use super::news::FeedSourceConfig;
use crate::error::ConfigError;

pub const DEFAULT_RSS_SOURCES: &[&str] = &[
    "https://www.coindesk.com/arc/outboundfeeds/rss/",
    "https://cointelegraph.com/rss",
];

/// One week. Wider windows would keep every seen id around for no benefit.
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 24 * 60;
pub const MAX_SEND_DELAY_SECS: u64 = 3600;

pub const MARKETAUX_URL: &str = "https://api.marketaux.com/v1/news/all";

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "bitcoin", "btc", "ethereum", "eth", "solana", "sol", "toncoin", "ton",
    "ripple", "xrp", "binance", "bnb", "coinbase", "exchange", "crypto", "cryptocurrency",
    "defi", "nft", "web3", "token", "blockchain", "layer 2", "staking", "airdrop",
    "sec", "etf", "approval", "lawsuit", "regulation", "ban", "court", "legal",
    "hack", "exploit", "breach", "scam", "security", "phishing",
    "market crash", "bullish", "bearish", "whale", "investment", "funding",
    "listing", "delisting", "partnership", "integration", "update", "upgrade",
    "price surge", "price drop", "federal reserve", "inflation", "interest rate",
];

/// Remote summarizer settings. Absent when no token is configured.
#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    pub api_token: String,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
}

/// Everything the bot reads from its environment
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub telegram_api_base: String,
    pub feeds: Vec<FeedSourceConfig>,
    pub marketaux_api_key: Option<String>,
    pub keywords: Vec<String>,
    pub window_minutes: i64,
    pub poll_interval_minutes: u64,
    pub send_delay_secs: u64,
    pub daily_report_time: NaiveTime,
    pub report_timezone: Tz,
    pub summarizer: Option<SummarizerSettings>,
    pub translator: TranslatorSettings,
    pub coingecko_api_base: String,
    pub seen_db_path: Option<String>,
    pub max_entries_per_feed: Option<usize>,
}

impl BotSettings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_channel_id = required("TELEGRAM_CHANNEL_ID")?;

        let feeds = match get("RSS_SOURCES") {
            Some(list) => split_list(&list).iter().map(|u| FeedSourceConfig::rss(u)).collect(),
            None => DEFAULT_RSS_SOURCES.iter().map(|u| FeedSourceConfig::rss(u)).collect(),
        };

        let keywords = match get("NEWS_KEYWORDS") {
            Some(list) => split_list(&list),
            None => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };

        let window_minutes: i64 = parse_or("WINDOW_MINUTES", get("WINDOW_MINUTES"), 12)?;
        check_range("WINDOW_MINUTES", window_minutes, 1, MAX_WINDOW_MINUTES)?;
        let poll_interval_minutes: u64 =
            parse_or("POLL_INTERVAL_MINUTES", get("POLL_INTERVAL_MINUTES"), 5)?;
        check_range("POLL_INTERVAL_MINUTES", poll_interval_minutes, 1, MAX_POLL_INTERVAL_MINUTES)?;
        let send_delay_secs: u64 = parse_or("SEND_DELAY_SECS", get("SEND_DELAY_SECS"), 3)?;
        check_range("SEND_DELAY_SECS", send_delay_secs, 0, MAX_SEND_DELAY_SECS)?;
        if window_minutes <= poll_interval_minutes as i64 {
            return Err(ConfigError::WindowTooNarrow {
                window: window_minutes,
                poll: poll_interval_minutes,
            });
        }

        let daily_report_time = match get("DAILY_REPORT_TIME") {
            Some(v) => NaiveTime::parse_from_str(&v, "%H:%M").map_err(|e| ConfigError::Invalid {
                key: "DAILY_REPORT_TIME",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        };

        let report_timezone = match get("REPORT_TIMEZONE") {
            Some(v) => v.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "REPORT_TIMEZONE",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => chrono_tz::Asia::Tehran,
        };

        let summarizer = get("HUGGINGFACE_API_TOKEN").map(|api_token| SummarizerSettings {
            api_token,
            model: get("HF_MODEL").unwrap_or_else(|| "facebook/bart-large-cnn".to_string()),
            api_base: get("HF_API_BASE")
                .unwrap_or_else(|| "https://api-inference.huggingface.co".to_string()),
        });

        let translator = TranslatorSettings {
            url: get("LIBRE_URL").unwrap_or_else(|| "https://libretranslate.de/translate".to_string()),
            api_key: get("LIBRE_API_KEY"),
            source_lang: get("SOURCE_LANG").unwrap_or_else(|| "en".to_string()),
            target_lang: get("TARGET_LANG").unwrap_or_else(|| "fa".to_string()),
        };

        let max_entries_per_feed = match get("MAX_ENTRIES_PER_FEED") {
            Some(v) => Some(parse_value("MAX_ENTRIES_PER_FEED", &v)?),
            None => None,
        };

        Ok(Self {
            telegram_bot_token,
            telegram_channel_id,
            telegram_api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            feeds,
            marketaux_api_key: get("MARKETAUX_API_KEY"),
            keywords,
            window_minutes,
            poll_interval_minutes,
            send_delay_secs,
            daily_report_time,
            report_timezone,
            summarizer,
            translator,
            coingecko_api_base: get("COINGECKO_API_BASE")
                .unwrap_or_else(|| "https://api.coingecko.com/api/v3".to_string()),
            seen_db_path: get("SEEN_DB_PATH"),
            max_entries_per_feed,
        })
    }

    /// Configured RSS feeds plus Marketaux when a key is present.
    pub fn all_sources(&self) -> Vec<FeedSourceConfig> {
        let mut sources = self.feeds.clone();
        if self.marketaux_api_key.is_some() {
            sources.push(FeedSourceConfig::marketaux(MARKETAUX_URL));
        }
        sources
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn check_range<T>(key: &'static str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        });
    }
    Ok(())
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}
