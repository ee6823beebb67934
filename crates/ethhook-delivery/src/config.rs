use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "EthHook delivery worker", long_about = None)]
pub struct Args {
    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[clap(long, env = "CLICKHOUSE_URL", default_value = "http://127.0.0.1:8123")]
    pub clickhouse_url: String,

    /// Number of delivery-stream shards in play (must match the processor).
    #[clap(long, env = "DELIVERY_SHARD_COUNT", default_value = "8")]
    pub shard_count: u32,

    /// Number of delivery worker tasks.
    #[clap(long, env = "DELIVERY_WORKER_COUNT", default_value = "8")]
    pub worker_count: u32,

    #[clap(long, env = "MAX_WAIT_MS", default_value = "1000")]
    pub max_wait_ms: u64,

    /// Retry-delay curve. `max_retries` is not configured here: it is
    /// carried per-job from the endpoint's own `max_retries`, so a change
    /// to an endpoint's policy never applies retroactively to jobs already
    /// in flight (see `DeliveryJob::max_retries`).
    #[clap(long, env = "RETRY_BASE_DELAY_MS", default_value = "1000")]
    pub retry_base_delay_ms: u64,

    #[clap(long, env = "RETRY_MAX_DELAY_MS", default_value = "60000")]
    pub retry_max_delay_ms: u64,

    #[clap(long, env = "RETRY_MULTIPLIER", default_value = "2.0")]
    pub retry_multiplier: f64,

    #[clap(long, env = "ATTEMPTS_BATCH_CAPACITY", default_value = "500")]
    pub attempts_batch_capacity: usize,

    #[clap(long, env = "ATTEMPTS_BATCH_TIMEOUT_MS", default_value = "5000")]
    pub attempts_batch_timeout_ms: u64,

    /// How long an in-flight delivery (POST awaiting a response) is given
    /// to finish after a shutdown signal before it's abandoned and its job
    /// left unacknowledged for redelivery.
    #[clap(long, env = "SHUTDOWN_GRACE_MS", default_value = "30000")]
    pub shutdown_grace_ms: u64,

    #[clap(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: ethhook_core::logging::LogFormat,
}

impl Args {
    pub fn retry_policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy {
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
            backoff_multiplier: self.retry_multiplier,
        }
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }
}
