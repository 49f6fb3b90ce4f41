use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::ServiceError;
use crate::models::news::NewsItem;
use crate::utils::text::{escape_html, strip_html, truncate_chars};

/// Character budget of the extractive fallback
pub const EXTRACTIVE_MAX_CHARS: usize = 450;
/// Sentences shorter than this are not worth quoting
pub const MIN_SENTENCE_CHARS: usize = 40;
pub const MAX_SENTENCES: usize = 2;
pub const ELLIPSIS: &str = "...";

const READ_MORE: &str = "ادامه مطلب";
const JOIN_US: &str = "به ما بپیوندید 🦈";

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn summarize(&self, text: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ServiceError>;
}

/// A strategy that failed before the chain settled
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub error: ServiceError,
}

/// What a fallback chain produced and which strategies it had to skip
#[derive(Debug)]
pub struct ChainResult {
    pub text: String,
    pub strategy: &'static str,
    pub failures: Vec<StrategyFailure>,
}

impl ChainResult {
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ============================================================
// Extractive fallback
// ============================================================

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"))
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_end_re().find_iter(text) {
        // the terminator is one ASCII byte, keep it with its sentence
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// First two sentences of at least 40 characters; otherwise the text cut to `max_chars`.
/// An ellipsis marks every cut.
pub fn extractive_summary(text: &str, max_chars: usize) -> String {
    let plain = strip_html(text);
    if plain.is_empty() {
        return String::new();
    }

    let chosen: Vec<&str> = split_sentences(&plain)
        .into_iter()
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .take(MAX_SENTENCES)
        .collect();

    let candidate = if chosen.is_empty() {
        plain
    } else {
        chosen.join(" ")
    };

    if candidate.chars().count() > max_chars {
        format!("{}{}", truncate_chars(&candidate, max_chars).trim_end(), ELLIPSIS)
    } else {
        candidate
    }
}

/// Local last resort of the summary chain. Never fails.
pub struct ExtractiveSummarizer {
    pub max_chars: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self {
            max_chars: EXTRACTIVE_MAX_CHARS,
        }
    }
}

// ============================================================
// Fallback chains
// ============================================================

/// Remote summarizers tried in order, then the extractive heuristic.
pub struct SummaryChain {
    remotes: Vec<Arc<dyn Summarizer>>,
    fallback: ExtractiveSummarizer,
    call_timeout: Duration,
}

impl SummaryChain {
    pub fn new(remotes: Vec<Arc<dyn Summarizer>>, call_timeout: Duration) -> Self {
        Self {
            remotes,
            fallback: ExtractiveSummarizer::default(),
            call_timeout,
        }
    }

    pub async fn run(&self, text: &str) -> ChainResult {
        let mut failures = Vec::new();
        for remote in &self.remotes {
            let attempt = match timeout(self.call_timeout, remote.summarize(text)).await {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            };
            match attempt {
                Ok(summary) => {
                    return ChainResult {
                        text: summary,
                        strategy: remote.name(),
                        failures,
                    }
                }
                Err(error) => {
                    log::warn!("summarizer {} failed: {}", remote.name(), error);
                    failures.push(StrategyFailure {
                        strategy: remote.name(),
                        error,
                    });
                }
            }
        }
        ChainResult {
            text: extractive_summary(text, self.fallback.max_chars),
            strategy: "extractive",
            failures,
        }
    }
}

/// Remote translators tried in order; the original text passes through when all fail.
pub struct TranslationChain {
    translators: Vec<Arc<dyn Translator>>,
    source_lang: String,
    target_lang: String,
    call_timeout: Duration,
}

impl TranslationChain {
    pub fn new(
        translators: Vec<Arc<dyn Translator>>,
        source_lang: &str,
        target_lang: &str,
        call_timeout: Duration,
    ) -> Self {
        Self {
            translators,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            call_timeout,
        }
    }

    pub async fn run(&self, text: &str) -> ChainResult {
        let mut failures = Vec::new();
        if text.trim().is_empty() {
            return ChainResult {
                text: String::new(),
                strategy: "passthrough",
                failures,
            };
        }
        for translator in &self.translators {
            let call = translator.translate(text, &self.source_lang, &self.target_lang);
            let attempt = match timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            };
            match attempt {
                Ok(translated) => {
                    return ChainResult {
                        text: translated,
                        strategy: translator.name(),
                        failures,
                    }
                }
                Err(error) => {
                    log::warn!("translator {} failed: {}", translator.name(), error);
                    failures.push(StrategyFailure {
                        strategy: translator.name(),
                        error,
                    });
                }
            }
        }
        ChainResult {
            text: text.to_string(),
            strategy: "passthrough",
            failures,
        }
    }
}

// ============================================================
// Message composition
// ============================================================

/// A news item turned into a publishable bilingual message
#[derive(Debug, Clone)]
pub struct ShapedMessage {
    pub item_id: String,
    pub title: String,
    pub summary: String,
    pub title_translated: String,
    pub summary_translated: String,
    pub link: String,
    /// Final text in Telegram HTML
    pub text: String,
}

pub struct ContentShaper {
    summaries: SummaryChain,
    translations: TranslationChain,
    channel_id: String,
}

impl ContentShaper {
    pub fn new(summaries: SummaryChain, translations: TranslationChain, channel_id: &str) -> Self {
        Self {
            summaries,
            translations,
            channel_id: channel_id.to_string(),
        }
    }

    pub async fn shape(&self, item: &NewsItem) -> ShapedMessage {
        let plain = strip_html(&item.summary_raw);
        let source = if plain.is_empty() { item.title.as_str() } else { plain.as_str() };

        let summary = self.summaries.run(source).await;
        let title_translated = self.translations.run(&item.title).await;
        let summary_translated = self.translations.run(&summary.text).await;

        if summary.fell_back() || title_translated.fell_back() || summary_translated.fell_back() {
            log::info!(
                "shaped {} with fallbacks (summary: {}, translation: {}/{})",
                item.id,
                summary.strategy,
                title_translated.strategy,
                summary_translated.strategy
            );
        }

        let text = compose_message(
            &title_translated.text,
            &summary_translated.text,
            &summary.text,
            &item.link,
            &self.channel_id,
        );

        ShapedMessage {
            item_id: item.id.clone(),
            title: item.title.clone(),
            summary: summary.text,
            title_translated: title_translated.text,
            summary_translated: summary_translated.text,
            link: item.link.clone(),
            text,
        }
    }
}

pub fn channel_footer(channel_id: &str) -> String {
    format!("👥 {}\n{}", escape_html(channel_id), JOIN_US)
}

/// Translated title and summary, the original summary when it differs, the link
/// and the channel footer.
pub fn compose_message(
    title_translated: &str,
    summary_translated: &str,
    summary_original: &str,
    link: &str,
    channel_id: &str,
) -> String {
    let mut parts = vec![format!("📢 {}", escape_html(title_translated))];
    if !summary_translated.is_empty() {
        parts.push(format!("📝 {}", escape_html(summary_translated)));
    }
    if !summary_original.is_empty() && summary_original.trim() != summary_translated.trim() {
        parts.push(format!("📰 {}", escape_html(summary_original)));
    }
    if !link.is_empty() {
        parts.push(format!("🔗 <a href='{}'>{}</a>", escape_html(link), READ_MORE));
    }
    parts.push(channel_footer(channel_id));
    parts.join("\n\n")
}
