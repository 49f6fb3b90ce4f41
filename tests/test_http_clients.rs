//! HTTP clients against local mock servers.

use httpmock::{
    Method::{GET, POST},
    MockServer,
};
use serde_json::json;
use std::time::Duration;

use coin_digest::error::ServiceError;
use coin_digest::models::news::FeedSourceConfig;
use coin_digest::models::settings::{SummarizerSettings, TranslatorSettings};
use coin_digest::services::ai_service::{HuggingFaceSummarizer, LibreTranslator};
use coin_digest::services::content_shaper::{Summarizer, TranslationChain, Translator};
use coin_digest::services::delivery::{MessageSink, TelegramSink};
use coin_digest::services::news_service::{FeedSource, MarketauxSource, RssSource};
use coin_digest::services::price_history::{CoinGeckoClient, PriceSource};
use coin_digest::utils::http::build_feed_client;
use std::sync::Arc;

fn translator_settings(server: &MockServer) -> TranslatorSettings {
    TranslatorSettings {
        url: server.url("/translate"),
        api_key: None,
        source_lang: "en".into(),
        target_lang: "fa".into(),
    }
}

fn summarizer_settings(server: &MockServer) -> SummarizerSettings {
    SummarizerSettings {
        api_token: "hf-token".into(),
        model: "facebook/bart-large-cnn".into(),
        api_base: server.base_url(),
    }
}

// ==================== Telegram ====================

#[tokio::test]
async fn test_telegram_sink_posts_html_message() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/bot123:abc/sendMessage")
            .json_body(json!({
                "chat_id": "@coin_news",
                "text": "📢 <b>hi</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"ok":true,"result":{"message_id":1}}"#);
    });

    let sink = TelegramSink::new(&server.base_url(), "123:abc", "@coin_news").unwrap();
    sink.send("📢 <b>hi</b>").await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_telegram_sink_reports_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/botbad/sendMessage");
        then.status(400)
            .body(r#"{"ok":false,"description":"Bad Request: chat not found"}"#);
    });

    let sink = TelegramSink::new(&server.base_url(), "bad", "@nowhere").unwrap();
    match sink.send("x").await {
        Err(ServiceError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("chat not found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

// ==================== LibreTranslate ====================

#[tokio::test]
async fn test_libre_translator_returns_translation() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/translate").json_body(json!({
            "q": "Bitcoin rises",
            "source": "en",
            "target": "fa",
            "format": "text"
        }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"translatedText":"بیت کوین بالا رفت"}"#);
    });

    let translator = LibreTranslator::new(&translator_settings(&server)).unwrap();
    let out = translator.translate("Bitcoin rises", "en", "fa").await.unwrap();
    assert_eq!(out, "بیت کوین بالا رفت");
    mock.assert();
}

#[tokio::test]
async fn test_translation_chain_passes_text_through_on_server_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/translate");
        then.status(500).body("internal error");
    });

    let translator: Arc<dyn Translator> =
        Arc::new(LibreTranslator::new(&translator_settings(&server)).unwrap());
    let chain = TranslationChain::new(vec![translator], "en", "fa", Duration::from_secs(5));

    let result = chain.run("Ethereum upgrade ships").await;
    assert_eq!(result.text, "Ethereum upgrade ships");
    assert_eq!(result.strategy, "passthrough");
    assert_eq!(result.failures.len(), 1);
    mock.assert();
}

// ==================== HuggingFace ====================

#[tokio::test]
async fn test_huggingface_summary_from_list_payload() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/facebook/bart-large-cnn")
            .json_body(json!({
                "inputs": "A long article about bitcoin.",
                "parameters": { "max_length": 120, "min_length": 30 }
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"summary_text":"Bitcoin article, summarized."}]"#);
    });

    let summarizer = HuggingFaceSummarizer::new(&summarizer_settings(&server)).unwrap();
    let out = summarizer.summarize("A long article about bitcoin.").await.unwrap();
    assert_eq!(out, "Bitcoin article, summarized.");
    mock.assert();
}

#[tokio::test]
async fn test_huggingface_error_payload_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/models/facebook/bart-large-cnn");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"error":"Model facebook/bart-large-cnn is currently loading"}"#);
    });

    let summarizer = HuggingFaceSummarizer::new(&summarizer_settings(&server)).unwrap();
    let err = summarizer.summarize("text").await.unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(ref msg) if msg.contains("loading")));
}

// ==================== CoinGecko ====================

#[tokio::test]
async fn test_coingecko_closes_are_chronological() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/coins/bitcoin/market_chart")
            .query_param("vs_currency", "usd")
            .query_param("days", "30");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"prices":[[1700000200000,102.5],[1700000000000,100.0],[1700000100000,101.0]]}"#);
    });

    let client = CoinGeckoClient::new(&server.base_url()).unwrap();
    let closes = client.closes("bitcoin", "usd", 30).await.unwrap();
    assert_eq!(closes, vec![100.0, 101.0, 102.5]);
    mock.assert();
}

#[tokio::test]
async fn test_coingecko_retries_server_errors() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/coins/solana/market_chart");
        then.status(502).body("bad gateway");
    });

    let client = CoinGeckoClient::new(&server.base_url())
        .unwrap()
        .with_retry_delay(Duration::from_millis(5));
    let err = client.closes("solana", "usd", 30).await.unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 502, .. }));
    mock.assert_calls(3);
}

#[tokio::test]
async fn test_coingecko_does_not_retry_client_errors() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/coins/unknown/market_chart");
        then.status(404).body(r#"{"error":"coin not found"}"#);
    });

    let client = CoinGeckoClient::new(&server.base_url())
        .unwrap()
        .with_retry_delay(Duration::from_millis(5));
    assert!(client.closes("unknown", "usd", 30).await.is_err());
    mock.assert_calls(1);
}

// ==================== feeds ====================

const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Chain news</title>
  <id>urn:chain-news</id>
  <updated>2025-10-14T11:00:00Z</updated>
  <entry>
    <title>Older: Solana validators upgrade</title>
    <id>urn:chain-news:1</id>
    <link href="https://chain.example/sol"/>
    <updated>2025-10-14T09:00:00Z</updated>
    <summary>Validators moved to the new client.</summary>
  </entry>
  <entry>
    <title>Newer: Bitcoin fees spike</title>
    <id>urn:chain-news:2</id>
    <link href="https://chain.example/fees"/>
    <updated>2025-10-14T11:00:00Z</updated>
    <summary>Fees climbed after a busy block.</summary>
  </entry>
</feed>"#;

#[tokio::test]
async fn test_rss_source_fetches_and_caps_entries() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/feed");
        then.status(200)
            .header("content-type", "application/atom+xml")
            .body(ATOM);
    });

    let source = RssSource::new(
        build_feed_client().unwrap(),
        FeedSourceConfig::rss(&server.url("/feed")),
        Some(1),
    );
    let items = source.fetch().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Newer: Bitcoin fees spike");
    assert_eq!(items[0].link, "https://chain.example/fees");
    assert!(items[0].published_at.is_some());
    mock.assert();
}

#[tokio::test]
async fn test_rss_source_error_status_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/feed");
        then.status(503).body("maintenance");
    });

    let source = RssSource::new(
        build_feed_client().unwrap(),
        FeedSourceConfig::rss(&server.url("/feed")),
        None,
    );
    assert!(matches!(
        source.fetch().await,
        Err(ServiceError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_marketaux_source_sends_key_and_category() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/news/all")
            .query_param("categories", "crypto")
            .query_param("language", "en")
            .query_param("api_token", "mx-key");
        then.status(200)
            .header("content-type", "application/json")
            .body(
                r#"{"data":[{"uuid":"u1","title":"Ripple &amp; SEC settle","description":"The case is closed.","snippet":"","url":"https://mx.example/xrp","published_at":"2025-10-14T11:58:00.000000Z"}]}"#,
            );
    });

    let source = MarketauxSource::new(
        build_feed_client().unwrap(),
        FeedSourceConfig::marketaux(&server.url("/v1/news/all")),
        "mx-key".to_string(),
        None,
    );
    let items = source.fetch().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Ripple & SEC settle");
    assert_eq!(items[0].summary_raw, "The case is closed.");
    assert_eq!(items[0].source_tag, "marketaux");
    mock.assert();
}
