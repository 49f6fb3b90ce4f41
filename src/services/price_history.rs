use async_trait::async_trait;
use std::time::Duration;

use crate::error::ServiceError;
use crate::models::ai::MarketChartResponse;
use crate::utils::http::build_market_client;
use crate::utils::retry::retry_with_backoff;

pub const VS_CURRENCY: &str = "usd";
pub const HISTORY_DAYS: u32 = 30;
const MAX_RETRIES: u32 = 2;

/// Historical closing prices for a coin, oldest first
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn closes(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<Vec<f64>, ServiceError>;
}

pub struct CoinGeckoClient {
    client: reqwest::Client,
    api_base: String,
    retry_delay: Duration,
}

impl CoinGeckoClient {
    pub fn new(api_base: &str) -> anyhow::Result<Self> {
        let client = build_market_client()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the first backoff delay (doubled on each retry).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn fetch_once(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<Vec<f64>, ServiceError> {
        let url = format!("{}/coins/{}/market_chart", self.api_base, coin_id);
        let days = days.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("vs_currency", vs_currency), ("days", days.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::status(status, &text));
        }

        let chart: MarketChartResponse = serde_json::from_str(&text)?;
        Ok(closes_from_pairs(chart.prices))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn closes(&self, coin_id: &str, vs_currency: &str, days: u32) -> Result<Vec<f64>, ServiceError> {
        retry_with_backoff(MAX_RETRIES, self.retry_delay, || {
            self.fetch_once(coin_id, vs_currency, days)
        })
        .await
    }
}

/// Orders `[timestamp, price]` pairs chronologically and keeps finite prices only.
pub fn closes_from_pairs(mut pairs: Vec<(f64, f64)>) -> Vec<f64> {
    pairs.retain(|(ts, price)| ts.is_finite() && price.is_finite());
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.into_iter().map(|(_, price)| price).collect()
}
