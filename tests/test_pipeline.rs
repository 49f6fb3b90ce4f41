//! News path and report task end to end, with in-memory sources and sinks.
//!
//! Delivery waits are real `tokio::time` sleeps, so every async test runs on paused time.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use coin_digest::commands::news_cmd::NewsTask;
use coin_digest::commands::report_cmd::ReportTask;
use coin_digest::error::ServiceError;
use coin_digest::models::news::NewsItem;
use coin_digest::services::content_shaper::{ContentShaper, SummaryChain, TranslationChain};
use coin_digest::services::dedup::Deduplicator;
use coin_digest::services::delivery::{DeliveryQueue, MessageSink};
use coin_digest::services::news_pipeline::{NewsPipeline, PollSummary};
use coin_digest::services::news_service::FeedSource;
use coin_digest::services::price_history::PriceSource;
use coin_digest::services::relevance::RelevanceClassifier;
use coin_digest::services::scheduler::RunOutcome;

const WINDOW_MINUTES: i64 = 12;
const SEND_DELAY: Duration = Duration::from_secs(3);

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap()
}

fn item(title: &str, link: &str, minutes_ago: Option<i64>) -> NewsItem {
    NewsItem::new(
        title.to_string(),
        "<p>Markets moved on the news today.</p>".to_string(),
        link.to_string(),
        minutes_ago.map(|m| now() - ChronoDuration::minutes(m)),
        "test",
    )
}

// ==================== fakes ====================

#[derive(Clone, Default)]
struct StaticSource {
    items: Arc<Mutex<Vec<NewsItem>>>,
}

impl StaticSource {
    fn with(items: Vec<NewsItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    fn tag(&self) -> &str {
        "static"
    }
    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError> {
        Ok(self.items.lock().unwrap().clone())
    }
}

struct BrokenSource;

#[async_trait]
impl FeedSource for BrokenSource {
    fn tag(&self) -> &str {
        "broken"
    }
    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError> {
        Err(ServiceError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

struct SlowSource;

#[async_trait]
impl FeedSource for SlowSource {
    fn tag(&self) -> &str {
        "slow"
    }
    async fn fetch(&self) -> Result<Vec<NewsItem>, ServiceError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, Instant)>>,
    failures_left: AtomicUsize,
}

impl RecordingSink {
    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, text: &str) -> Result<(), ServiceError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ServiceError::Timeout);
        }
        self.sent.lock().unwrap().push((text.to_string(), Instant::now()));
        Ok(())
    }
}

/// Step series for bitcoin, nothing for anything else
struct FakePrices;

#[async_trait]
impl PriceSource for FakePrices {
    async fn closes(&self, coin_id: &str, _vs: &str, _days: u32) -> Result<Vec<f64>, ServiceError> {
        if coin_id != "bitcoin" {
            return Err(ServiceError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        let mut closes = vec![100.0; 6];
        closes.extend(vec![110.0; 8]);
        closes.extend(vec![120.0; 16]);
        Ok(closes)
    }
}

fn pipeline(sources: Vec<Box<dyn FeedSource>>, sink: Arc<RecordingSink>) -> NewsPipeline {
    let queue = Arc::new(DeliveryQueue::new(sink, SEND_DELAY));
    shared_pipeline(sources, queue)
}

fn shared_pipeline(sources: Vec<Box<dyn FeedSource>>, queue: Arc<DeliveryQueue>) -> NewsPipeline {
    let shaper = ContentShaper::new(
        SummaryChain::new(Vec::new(), Duration::from_secs(1)),
        TranslationChain::new(Vec::new(), "en", "fa", Duration::from_secs(1)),
        "@coin_news",
    );
    NewsPipeline::new(
        sources,
        RelevanceClassifier::new(["bitcoin", "ethereum", "solana", "xrp"]),
        Deduplicator::new(WINDOW_MINUTES),
        shaper,
        queue,
    )
}

fn mixed_batch() -> Vec<NewsItem> {
    vec![
        item("Bitcoin ETF inflows hit a record", "https://a.example/btc-etf", Some(2)),
        item("Local weather turns cold", "https://a.example/weather", Some(1)),
        item("Ethereum upgrade ships", "https://a.example/eth", Some(30)),
        item("Solana outage report", "https://a.example/sol", None),
        item("XRP ruling lands", "https://b.example/xrp/", Some(5)),
    ]
}

// ==================== news path ====================

#[tokio::test(start_paused = true)]
async fn test_poll_filters_and_delivers_newest_first() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(vec![Box::new(StaticSource::with(mixed_batch()))], sink.clone());

    let summary = pipeline.run_once(now()).await;
    assert_eq!(
        summary,
        PollSummary {
            fetched: 5,
            undated: 1,
            stale: 1,
            in_window: 3,
            relevant: 2,
            already_seen: 0,
            delivered: 2,
            failed: 0,
            pruned: 0,
        }
    );

    let texts = sink.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("📢 Bitcoin ETF inflows hit a record"));
    assert!(texts[1].starts_with("📢 XRP ruling lands"));
    assert!(texts[1].contains("<a href='https://b.example/xrp/'>"));
    assert!(texts.iter().all(|t| t.ends_with("👥 @coin_news\nبه ما بپیوندید 🦈")));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_poll_delivers_nothing_new() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(vec![Box::new(StaticSource::with(mixed_batch()))], sink.clone());

    pipeline.run_once(now()).await;
    let second = pipeline.run_once(now() + ChronoDuration::minutes(1)).await;

    assert_eq!(second.delivered, 0);
    assert_eq!(second.already_seen, 2);
    assert_eq!(sink.texts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_same_link_from_two_feeds_is_sent_once() {
    let sink = Arc::new(RecordingSink::default());
    let a = StaticSource::with(vec![item("Bitcoin tops 100k", "https://a.example/btc", Some(1))]);
    let b = StaticSource::with(vec![item("Bitcoin tops 100k!", "https://a.example/btc/#top", Some(1))]);
    let mut pipeline = pipeline(vec![Box::new(a), Box::new(b)], sink.clone());

    let summary = pipeline.run_once(now()).await;
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.already_seen, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_is_retried_next_poll() {
    let sink = Arc::new(RecordingSink::failing(1));
    let source = StaticSource::with(vec![item("Bitcoin halving countdown", "https://a.example/halving", Some(1))]);
    let mut pipeline = pipeline(vec![Box::new(source)], sink.clone());

    let first = pipeline.run_once(now()).await;
    assert_eq!((first.delivered, first.failed), (0, 1));
    assert!(sink.texts().is_empty());

    let second = pipeline.run_once(now() + ChronoDuration::minutes(5)).await;
    assert_eq!((second.delivered, second.failed), (1, 0));
    assert_eq!(sink.texts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_broken_feed_does_not_stop_the_poll() {
    let sink = Arc::new(RecordingSink::default());
    let source = StaticSource::with(vec![item("Ethereum gas fees drop", "https://a.example/gas", Some(3))]);
    let mut pipeline = pipeline(vec![Box::new(BrokenSource), Box::new(source)], sink.clone());

    let summary = pipeline.run_once(now()).await;
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_seen_ids_are_pruned_once_outside_the_window() {
    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = pipeline(vec![Box::new(StaticSource::with(mixed_batch()))], sink.clone());

    pipeline.run_once(now()).await;
    assert_eq!(pipeline.dedup().seen().len(), 2);

    let later = pipeline.run_once(now() + ChronoDuration::minutes(20)).await;
    assert_eq!(later.pruned, 2);
    assert_eq!(later.in_window, 0);
    assert_eq!(later.stale, 4);
    assert_eq!(later.undated, 1);
    assert_eq!(later.delivered, 0);
    assert!(pipeline.dedup().seen().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sends_are_spaced_by_the_delay() {
    let sink = Arc::new(RecordingSink::default());
    let items = (0..4)
        .map(|i| item(&format!("Bitcoin story {}", i), &format!("https://a.example/{}", i), Some(i)))
        .collect();
    let mut pipeline = pipeline(vec![Box::new(StaticSource::with(items))], sink.clone());

    assert_eq!(pipeline.run_once(now()).await.delivered, 4);
    let sent = sink.sent.lock().unwrap();
    for pair in sent.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= SEND_DELAY);
    }
}

// ==================== single flight ====================

#[tokio::test(start_paused = true)]
async fn test_overlapping_news_runs_are_skipped() {
    let sink = Arc::new(RecordingSink::default());
    let task = Arc::new(NewsTask::new(pipeline(vec![Box::new(SlowSource)], sink)));

    let first = tokio::spawn({
        let task = task.clone();
        async move { task.run_at(now()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(task.run_at(now()).await, RunOutcome::Skipped);

    let outcome = first.await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));

    // the lock is free again once the first run is done
    assert!(!matches!(task.run_at(now()).await, RunOutcome::Skipped));
}

// ==================== daily report ====================

#[tokio::test(start_paused = true)]
async fn test_report_task_sends_one_report() {
    let sink = Arc::new(RecordingSink::default());
    let queue = Arc::new(DeliveryQueue::new(sink.clone(), SEND_DELAY));
    let task = ReportTask::new(Arc::new(FakePrices), queue, chrono_tz::Asia::Tehran, "@coin_news");

    let RunOutcome::Completed(text) = task.run_at(now()).await else {
        panic!("report should complete");
    };
    assert!(text.contains("2025/10/14 15:30"));
    assert!(text.contains("BTC: MA7: 120, MA30: 113.33, RSI: 99, bullish 🔼 (overbought)"));
    assert!(text.contains("ETH: insufficient data"));
    assert!(text.contains("BNB: insufficient data"));
    assert_eq!(sink.texts(), vec![text]);
    assert_eq!(task.last_sent().await, Some(now()));
}

#[tokio::test(start_paused = true)]
async fn test_report_delivery_failure_is_reported() {
    let sink = Arc::new(RecordingSink::failing(1));
    let queue = Arc::new(DeliveryQueue::new(sink, SEND_DELAY));
    let task = ReportTask::new(Arc::new(FakePrices), queue, chrono_tz::Asia::Tehran, "@coin_news");

    assert!(matches!(task.run_at(now()).await, RunOutcome::Failed(_)));
    assert_eq!(task.last_sent().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_news_and_report_share_the_rate_limit() {
    let sink = Arc::new(RecordingSink::default());
    let queue = Arc::new(DeliveryQueue::new(sink.clone(), SEND_DELAY));
    let source = StaticSource::with(vec![item("Bitcoin miners rally", "https://a.example/miners", Some(1))]);
    let news = NewsTask::new(shared_pipeline(vec![Box::new(source)], queue.clone()));
    let report = ReportTask::new(Arc::new(FakePrices), queue, chrono_tz::Asia::Tehran, "@coin_news");

    let (a, b) = tokio::join!(news.run_at(now()), report.run_at(now()));
    assert!(matches!(a, RunOutcome::Completed(_)));
    assert!(matches!(b, RunOutcome::Completed(_)));

    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].1 - sent[0].1 >= SEND_DELAY);
}
