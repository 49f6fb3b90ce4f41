use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// How a single invocation of a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    Completed(T),
    /// Another invocation of the same job was still running
    Skipped,
    Failed(String),
}

/// A periodic job. `trigger` must never fail or panic the loop that calls it.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;
    async fn trigger(&self);
}

pub struct Scheduler;

impl Scheduler {
    /// Next instant at which the wall clock in `tz` reads `at`, strictly after `now`.
    pub fn next_daily_run(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> DateTime<Utc> {
        let mut date = now.with_timezone(&tz).date_naive();
        for _ in 0..3 {
            if let Some(candidate) = resolve_local(tz, date.and_time(at)) {
                if candidate > now {
                    return candidate;
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        now + ChronoDuration::days(1)
    }

    /// Fires `job` right away and then every `every`. Each run is spawned so a slow run
    /// never holds up the ticker; overlap is the job's own business.
    pub async fn run_every(job: Arc<dyn ScheduledJob>, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("{} scheduled every {:?}", job.name(), every);
        loop {
            ticker.tick().await;
            let job = job.clone();
            tokio::spawn(async move { job.trigger().await });
        }
    }

    /// Fires `job` once a day at `at` local time in `tz`.
    pub async fn run_daily(job: Arc<dyn ScheduledJob>, tz: Tz, at: NaiveTime) {
        let mut from = Utc::now();
        loop {
            let target = Self::next_daily_run(from, tz, at);
            log::info!(
                "{} next run at {}",
                job.name(),
                target.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
            );
            let wait = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            sleep(wait).await;

            let job = job.clone();
            tokio::spawn(async move { job.trigger().await });
            from = Utc::now().max(target);
        }
    }
}

/// Local wall time to UTC. Ambiguous times take the earlier instant; times that fall in a
/// DST gap move forward by an hour.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + ChronoDuration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}
