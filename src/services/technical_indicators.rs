use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::indicator::{
    IndicatorOutcome, IndicatorReport, PriceSeries, Trend, Zone, MIN_POINTS,
};
use crate::services::content_shaper::channel_footer;
use crate::services::price_history::{PriceSource, HISTORY_DAYS, VS_CURRENCY};

/// RS used when a series has no losing step
pub const RS_SENTINEL: f64 = 100.0;
const SHORT_PERIOD: usize = 7;
const LONG_PERIOD: usize = 30;

const REPORT_TITLE: &str = "📊 تحلیل تکنیکال روزانه";
const DISCLAIMER: &str = "🔸 تحلیل‌ها ممکن است اشتباه باشند. مسئولیت استفاده بر عهده تریدر است.";

/// Computes MA7, MA30, RSI, trend and zone. Fewer than 14 closes is a hard stop.
pub fn compute_indicators(series: &PriceSeries) -> IndicatorOutcome {
    let closes = &series.closes;
    if closes.len() < MIN_POINTS {
        return IndicatorOutcome::InsufficientData {
            symbol: series.symbol.clone(),
            points: closes.len(),
        };
    }

    let ma7 = round_to(mean_of_last(closes, SHORT_PERIOD), 2);
    let ma30 = round_to(mean_of_last(closes, LONG_PERIOD), 2);
    let rsi = calc_rsi(closes);
    let trend = if ma7 > ma30 { Trend::Bullish } else { Trend::Bearish };

    IndicatorOutcome::Computed(IndicatorReport {
        symbol: series.symbol.clone(),
        ma7,
        ma30,
        rsi,
        trend,
        zone: classify_zone(rsi),
    })
}

/// Mean of the last `period` values, or of all of them when the slice is shorter.
fn mean_of_last(data: &[f64], period: usize) -> f64 {
    let window = &data[data.len().saturating_sub(period)..];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Whole-series RSI from summed gains and losses, rounded to one decimal.
pub fn calc_rsi(data: &[f64]) -> f64 {
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in data.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else if change < 0.0 {
            losses += change.abs();
        }
    }

    let rs = if losses > 0.0 { gains / losses } else { RS_SENTINEL };
    round_to(100.0 - 100.0 / (1.0 + rs), 1).clamp(0.0, 100.0)
}

pub fn classify_zone(rsi: f64) -> Zone {
    if rsi < 30.0 {
        Zone::Oversold
    } else if rsi > 70.0 {
        Zone::Overbought
    } else {
        Zone::Neutral
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ====== Report ======

/// Fetches every coin's history one after another. A failed fetch becomes an empty series.
pub async fn collect_outcomes(
    source: &dyn PriceSource,
    coins: &[(&str, &str)],
) -> Vec<IndicatorOutcome> {
    let mut outcomes = Vec::with_capacity(coins.len());
    for (coin_id, symbol) in coins {
        let closes = match source.closes(coin_id, VS_CURRENCY, HISTORY_DAYS).await {
            Ok(closes) => closes,
            Err(e) => {
                log::warn!("price history for {} unavailable: {}", coin_id, e);
                Vec::new()
            }
        };
        outcomes.push(compute_indicators(&PriceSeries::new(symbol, closes)));
    }
    outcomes
}

pub fn format_outcome(outcome: &IndicatorOutcome) -> String {
    match outcome {
        IndicatorOutcome::Computed(r) => format!(
            "{}: MA7: {}, MA30: {}, RSI: {}, {} {} ({})",
            r.symbol,
            r.ma7,
            r.ma30,
            r.rsi,
            r.trend.as_str(),
            r.trend.arrow(),
            r.zone.as_str()
        ),
        IndicatorOutcome::InsufficientData { symbol, .. } => format!("{}: insufficient data", symbol),
    }
}

/// The daily report: title with local time, one line per coin, disclaimer, footer.
pub fn build_report(
    outcomes: &[IndicatorOutcome],
    now: DateTime<Utc>,
    tz: Tz,
    channel_id: &str,
) -> String {
    let local = now.with_timezone(&tz).format("%Y/%m/%d %H:%M");
    let mut lines = vec![
        format!("{} — {}", REPORT_TITLE, local),
        "--------------------------------".to_string(),
    ];
    lines.extend(outcomes.iter().map(format_outcome));
    lines.push(String::new());
    lines.push(DISCLAIMER.to_string());
    lines.push(String::new());
    lines.push(channel_footer(channel_id));
    lines.join("\n")
}
