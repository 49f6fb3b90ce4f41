use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::error::ServiceError;
use crate::models::ai::SendMessageRequest;
use crate::utils::http::build_telegram_client;

/// Where finished messages go
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), ServiceError>;
}

// ============================================================
// Telegram
// ============================================================

pub struct TelegramSink {
    client: reqwest::Client,
    url: String,
    channel_id: String,
}

impl TelegramSink {
    pub fn new(api_base: &str, bot_token: &str, channel_id: &str) -> anyhow::Result<Self> {
        let client = build_telegram_client()?;
        Ok(Self {
            client,
            url: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token),
            channel_id: channel_id.to_string(),
        })
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, text: &str) -> Result<(), ServiceError> {
        let req = SendMessageRequest {
            chat_id: &self.channel_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let resp = self.client.post(&self.url).json(&req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::status(status, &body));
        }
        Ok(())
    }
}

/// Prints messages instead of sending them (`--dry-run`)
pub struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    async fn send(&self, text: &str) -> Result<(), ServiceError> {
        println!("{}\n----------------", text);
        Ok(())
    }
}

// ============================================================
// Rate-limited queue
// ============================================================

/// Serializes sends through one sink and keeps at least `min_interval`
/// between two consecutive sends, whichever task they come from.
pub struct DeliveryQueue {
    sink: Arc<dyn MessageSink>,
    min_interval: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl DeliveryQueue {
    pub fn new(sink: Arc<dyn MessageSink>, min_interval: Duration) -> Self {
        Self {
            sink,
            min_interval,
            last_send: Mutex::new(None),
        }
    }

    /// Sends one message. Failures are logged and reported as `false`, never raised.
    pub async fn submit(&self, label: &str, text: &str) -> bool {
        let mut last = self.last_send.lock().await;
        if let Some(prev) = *last {
            sleep_until(prev + self.min_interval).await;
        }

        let result = self.sink.send(text).await;
        *last = Some(Instant::now());

        match result {
            Ok(()) => {
                log::info!("delivered {}", label);
                true
            }
            Err(e) => {
                log::error!("delivery of {} failed: {}", label, e);
                false
            }
        }
    }
}
