pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use commands::news_cmd::NewsTask;
use commands::report_cmd::ReportTask;
use models::settings::BotSettings;
use services::delivery::{DeliveryQueue, MessageSink, StdoutSink, TelegramSink};
use services::news_pipeline::NewsPipeline;
use services::price_history::CoinGeckoClient;
use services::scheduler::Scheduler;

/// Both tasks plus the delivery queue they share.
pub struct AppState {
    pub settings: BotSettings,
    pub queue: Arc<DeliveryQueue>,
    pub news: Arc<NewsTask>,
    pub report: Arc<ReportTask>,
}

impl AppState {
    /// `dry_run` swaps the Telegram sink for stdout; everything else is real.
    pub fn build(settings: BotSettings, dry_run: bool) -> anyhow::Result<Self> {
        let sink: Arc<dyn MessageSink> = if dry_run {
            Arc::new(StdoutSink)
        } else {
            Arc::new(TelegramSink::new(
                &settings.telegram_api_base,
                &settings.telegram_bot_token,
                &settings.telegram_channel_id,
            )?)
        };
        let queue = Arc::new(DeliveryQueue::new(
            sink,
            Duration::from_secs(settings.send_delay_secs),
        ));

        let pipeline = NewsPipeline::from_settings(&settings, queue.clone())?;
        let prices = Arc::new(CoinGeckoClient::new(&settings.coingecko_api_base)?);
        let report = ReportTask::new(
            prices,
            queue.clone(),
            settings.report_timezone,
            &settings.telegram_channel_id,
        );

        log::info!(
            "{} feed source(s), window {} min, poll every {} min, report at {} {}",
            settings.all_sources().len(),
            settings.window_minutes,
            settings.poll_interval_minutes,
            settings.daily_report_time.format("%H:%M"),
            settings.report_timezone
        );

        Ok(Self {
            settings,
            queue,
            news: Arc::new(NewsTask::new(pipeline)),
            report: Arc::new(report),
        })
    }
}

/// Runs both schedules until the process is stopped.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let secs = state
        .settings
        .poll_interval_minutes
        .checked_mul(60)
        .ok_or_else(|| anyhow::anyhow!("poll interval overflows"))?;
    let every = Duration::from_secs(secs);
    let mut news = tokio::spawn(Scheduler::run_every(state.news.clone(), every));
    let mut report = tokio::spawn(Scheduler::run_daily(
        state.report.clone(),
        state.settings.report_timezone,
        state.settings.daily_report_time,
    ));

    // both loops run forever, so either one finishing is fatal
    let (name, joined) = tokio::select! {
        r = &mut news => ("news", r),
        r = &mut report => ("report", r),
    };
    news.abort();
    report.abort();
    match joined {
        Ok(()) => anyhow::bail!("{} scheduler loop ended", name),
        Err(e) => anyhow::bail!("{} scheduler loop died: {}", name, e),
    }
}
