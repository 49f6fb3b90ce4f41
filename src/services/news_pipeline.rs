use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::db::database::SeenDatabase;
use crate::models::settings::BotSettings;
use crate::services::ai_service::{HuggingFaceSummarizer, LibreTranslator};
use crate::services::content_shaper::{
    ContentShaper, SummaryChain, Summarizer, TranslationChain, Translator,
};
use crate::services::dedup::{Deduplicator, Verdict};
use crate::services::delivery::DeliveryQueue;
use crate::services::news_service::{build_sources, collect, FeedSource};
use crate::services::relevance::RelevanceClassifier;

const SUMMARY_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSLATE_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Counters for one poll
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub fetched: usize,
    /// Dropped for lack of a publication time
    pub undated: usize,
    /// Dropped as older than the window
    pub stale: usize,
    pub in_window: usize,
    pub relevant: usize,
    pub already_seen: usize,
    pub delivered: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// Collector → classifier → deduplicator → shaper → delivery, for one poll at a time.
pub struct NewsPipeline {
    sources: Vec<Box<dyn FeedSource>>,
    classifier: RelevanceClassifier,
    dedup: Deduplicator,
    shaper: ContentShaper,
    queue: Arc<DeliveryQueue>,
}

impl NewsPipeline {
    pub fn new(
        sources: Vec<Box<dyn FeedSource>>,
        classifier: RelevanceClassifier,
        dedup: Deduplicator,
        shaper: ContentShaper,
        queue: Arc<DeliveryQueue>,
    ) -> Self {
        Self {
            sources,
            classifier,
            dedup,
            shaper,
            queue,
        }
    }

    /// Wires real sources, remote services and the optional seen store from settings.
    pub fn from_settings(settings: &BotSettings, queue: Arc<DeliveryQueue>) -> anyhow::Result<Self> {
        let sources = build_sources(settings)?;
        let classifier = RelevanceClassifier::new(&settings.keywords);
        let dedup = match &settings.seen_db_path {
            Some(path) => {
                let store = SeenDatabase::open(path)?;
                Deduplicator::with_store(settings.window_minutes, store, Utc::now())?
            }
            None => Deduplicator::new(settings.window_minutes),
        };
        let shaper = build_shaper(settings)?;
        Ok(Self::new(sources, classifier, dedup, shaper, queue))
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Runs one poll. Nothing in here fails the batch: every stage degrades per item.
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> PollSummary {
        let mut summary = PollSummary {
            pruned: self.dedup.prune(now),
            ..Default::default()
        };

        let items = collect(&self.sources).await;
        summary.fetched = items.len();

        for item in &items {
            let verdict = self.dedup.check(item, now);
            match verdict {
                Verdict::MissingTimestamp => {
                    summary.undated += 1;
                    continue;
                }
                Verdict::OutsideWindow => {
                    summary.stale += 1;
                    continue;
                }
                Verdict::Eligible | Verdict::AlreadySeen => summary.in_window += 1,
            }

            if !self.classifier.is_relevant_item(item) {
                log::debug!("not relevant: {}", item.title);
                continue;
            }
            summary.relevant += 1;

            if verdict == Verdict::AlreadySeen {
                summary.already_seen += 1;
                continue;
            }

            let shaped = self.shaper.shape(item).await;
            if self.queue.submit(&item.id, &shaped.text).await {
                self.dedup.mark_delivered(item, now);
                summary.delivered += 1;
            } else {
                summary.failed += 1;
            }
        }

        log::info!(
            "poll done: fetched={} undated={} stale={} in_window={} relevant={} already_seen={} delivered={} failed={} pruned={} seen={}",
            summary.fetched,
            summary.undated,
            summary.stale,
            summary.in_window,
            summary.relevant,
            summary.already_seen,
            summary.delivered,
            summary.failed,
            summary.pruned,
            self.dedup.seen().len()
        );
        summary
    }
}

/// Remote summarizer when a token is configured, LibreTranslate for translation.
pub fn build_shaper(settings: &BotSettings) -> anyhow::Result<ContentShaper> {
    let mut summarizers: Vec<Arc<dyn Summarizer>> = Vec::new();
    if let Some(hf) = &settings.summarizer {
        summarizers.push(Arc::new(HuggingFaceSummarizer::new(hf)?));
    }
    let translators: Vec<Arc<dyn Translator>> =
        vec![Arc::new(LibreTranslator::new(&settings.translator)?)];

    Ok(ContentShaper::new(
        SummaryChain::new(summarizers, SUMMARY_CALL_TIMEOUT),
        TranslationChain::new(
            translators,
            &settings.translator.source_lang,
            &settings.translator.target_lang,
            TRANSLATE_CALL_TIMEOUT,
        ),
        &settings.telegram_channel_id,
    ))
}
