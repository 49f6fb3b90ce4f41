use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::indicator::TRACKED_COINS;
use crate::services::delivery::DeliveryQueue;
use crate::services::price_history::PriceSource;
use crate::services::scheduler::{RunOutcome, ScheduledJob};
use crate::services::technical_indicators::{build_report, collect_outcomes};

/// The daily indicator report, single flight like [`crate::commands::news_cmd::NewsTask`].
pub struct ReportTask {
    prices: Arc<dyn PriceSource>,
    queue: Arc<DeliveryQueue>,
    tz: Tz,
    channel_id: String,
    last_sent: Mutex<Option<DateTime<Utc>>>,
}

impl ReportTask {
    pub fn new(prices: Arc<dyn PriceSource>, queue: Arc<DeliveryQueue>, tz: Tz, channel_id: &str) -> Self {
        Self {
            prices,
            queue,
            tz,
            channel_id: channel_id.to_string(),
            last_sent: Mutex::new(None),
        }
    }

    pub async fn run(&self) -> RunOutcome<String> {
        self.run_at(Utc::now()).await
    }

    /// Builds the report for every tracked coin and sends it. Returns the report text.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunOutcome<String> {
        let Ok(mut last_sent) = self.last_sent.try_lock() else {
            log::warn!("daily report still running, skipping this trigger");
            return RunOutcome::Skipped;
        };

        let outcomes = collect_outcomes(self.prices.as_ref(), TRACKED_COINS).await;
        let missing: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.report().is_none())
            .map(|o| o.symbol())
            .collect();
        log::info!(
            "indicators computed for {}/{} coins",
            outcomes.len() - missing.len(),
            outcomes.len()
        );
        if !missing.is_empty() {
            log::warn!("insufficient price data for {}", missing.join(", "));
        }

        let text = build_report(&outcomes, now, self.tz, &self.channel_id);
        if !self.queue.submit("daily-report", &text).await {
            return RunOutcome::Failed("daily report could not be delivered".to_string());
        }
        *last_sent = Some(now);
        RunOutcome::Completed(text)
    }

    pub async fn last_sent(&self) -> Option<DateTime<Utc>> {
        *self.last_sent.lock().await
    }
}

#[async_trait]
impl ScheduledJob for ReportTask {
    fn name(&self) -> &str {
        "daily-report"
    }

    async fn trigger(&self) {
        if let RunOutcome::Failed(reason) = self.run().await {
            log::error!("{}", reason);
        }
    }
}
