use std::time::Duration;
use tokio::time::sleep;

use crate::error::ServiceError;

/// Exponential backoff retry.
/// Only retryable errors (timeouts, connection failures, 5xx) are retried; anything
/// else is returned immediately.
///
/// # Arguments
/// * `max_retries` - retries after the first attempt (at most `max_retries + 1` calls)
/// * `base_delay` - delay before the first retry, doubled on every further retry
/// * `operation` - async operation closure
pub async fn retry_with_backoff<F, Fut, T>(
    max_retries: u32,
    base_delay: Duration,
    operation: F,
) -> Result<T, ServiceError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_retryable() || attempt == max_retries {
                    return Err(e);
                }
                let delay = base_delay * (1u32 << attempt);
                log::warn!(
                    "request failed (attempt {}), retrying in {}ms: {}",
                    attempt + 1,
                    delay.as_millis(),
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
