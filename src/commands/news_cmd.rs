use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::services::news_pipeline::{NewsPipeline, PollSummary};
use crate::services::scheduler::{RunOutcome, ScheduledJob};

/// The news poll. At most one poll runs at a time; a second trigger while one is in
/// flight is skipped rather than queued.
pub struct NewsTask {
    pipeline: Mutex<NewsPipeline>,
}

impl NewsTask {
    pub fn new(pipeline: NewsPipeline) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
        }
    }

    pub async fn run(&self) -> RunOutcome<PollSummary> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> RunOutcome<PollSummary> {
        let Ok(mut pipeline) = self.pipeline.try_lock() else {
            log::warn!("news poll still running, skipping this trigger");
            return RunOutcome::Skipped;
        };
        RunOutcome::Completed(pipeline.run_once(now).await)
    }
}

#[async_trait]
impl ScheduledJob for NewsTask {
    fn name(&self) -> &str {
        "news"
    }

    async fn trigger(&self) {
        self.run().await;
    }
}
