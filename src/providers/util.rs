use anyhow::Error;
use chrono::{DateTime, NaiveTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs `operation` up to `1 + retries` times, sleeping `delay_ms` between
/// attempts. Only transport-level errors are retried; HTTP error statuses are
/// returned to the caller as successful responses.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt < retries => {
                attempt += 1;
                debug!(attempt, retries, error = %err, "Request failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Midnight UTC of the day `timestamp` falls on.
///
/// Upstream sources stamp daily bars at different times of day; truncating
/// keeps one observation per calendar day regardless of source.
pub fn day_start(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}
