//! Retry policy abstraction for transient Redis errors, mirroring the
//! teacher's `journal-client::read::uncommitted::retry::Retry` trait: a
//! small, swappable strategy object that decides whether an error is worth
//! retrying and how long to wait, rather than baking a single backoff curve
//! into the queue client.

use std::fmt::Debug;
use std::time::Duration;

pub use exponential_backoff::Backoff;

/// Decides whether a failed queue operation should be retried.
pub trait Retry: Debug + Clone + Send {
    /// Called after a successful operation, so a stateful retry can forget
    /// past failures and start its next backoff curve from the beginning.
    fn reset(&mut self);

    /// Returns `Some(delay)` to retry after `delay` elapses, or `None` to
    /// give up and surface `error` to the caller.
    fn next_backoff(&mut self, error: &redis::RedisError) -> Option<Duration>;
}

/// Retries any error redis itself reports as retryable (connection drops,
/// `TRYAGAIN`, cluster `MOVED`/`ASK`), up to a bounded exponential curve.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempt: u32,
    backoff: Backoff,
}

impl ExponentialBackoff {
    pub fn new(max_retries: u32, min: Duration, max: Duration) -> Self {
        let mut backoff = Backoff::new(max_retries, min, Some(max));
        backoff.set_jitter(0.25);
        ExponentialBackoff { attempt: 0, backoff }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff::new(5, Duration::from_millis(100), Duration::from_secs(10))
    }
}

impl Retry for ExponentialBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self, error: &redis::RedisError) -> Option<Duration> {
        if !error.is_connection_dropped() && !error.is_timeout() && !error.is_io_error() {
            return None;
        }
        self.attempt += 1;
        self.backoff.next(self.attempt)
    }
}

/// Runs `op` until it succeeds or `retry` gives up, sleeping between
/// attempts for the duration `retry` prescribes.
pub async fn with_retry<T, F, Fut, R>(mut retry: R, mut op: F) -> Result<T, redis::RedisError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, redis::RedisError>>,
    R: Retry,
{
    loop {
        match op().await {
            Ok(value) => {
                retry.reset();
                return Ok(value);
            }
            Err(err) => match retry.next_backoff(&err) {
                Some(delay) => {
                    tracing::warn!(error = %err, delay_ms = delay.as_millis() as u64, "retrying queue operation");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            },
        }
    }
}
