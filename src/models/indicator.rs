use serde::{Deserialize, Serialize};

/// Minimum number of closes before any indicator is computed
pub const MIN_POINTS: usize = 14;

/// Coins in the daily report: (price-history id, display symbol)
pub const TRACKED_COINS: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("toncoin", "TON"),
    ("ripple", "XRP"),
    ("binancecoin", "BNB"),
];

/// Closing prices for one coin, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(symbol: &str, closes: Vec<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            closes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Bullish => "🔼",
            Trend::Bearish => "🔽",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Oversold,
    Neutral,
    Overbought,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Oversold => "oversold",
            Zone::Neutral => "neutral",
            Zone::Overbought => "overbought",
        }
    }
}

/// Indicators for one coin, computed once and only formatted afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub symbol: String,
    pub ma7: f64,
    pub ma30: f64,
    pub rsi: f64,
    pub trend: Trend,
    pub zone: Zone,
}

/// Result of running the engine over one series
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutcome {
    Computed(IndicatorReport),
    InsufficientData { symbol: String, points: usize },
}

impl IndicatorOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            IndicatorOutcome::Computed(r) => &r.symbol,
            IndicatorOutcome::InsufficientData { symbol, .. } => symbol,
        }
    }

    pub fn report(&self) -> Option<&IndicatorReport> {
        match self {
            IndicatorOutcome::Computed(r) => Some(r),
            IndicatorOutcome::InsufficientData { .. } => None,
        }
    }
}
