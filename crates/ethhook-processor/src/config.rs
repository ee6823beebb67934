use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "EthHook event processor", long_about = None)]
pub struct Args {
    /// Comma-separated chain ids to consume events for.
    #[clap(long, env = "PROCESSOR_CHAINS")]
    pub chains: String,

    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[clap(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[clap(long, env = "CLICKHOUSE_URL", default_value = "http://127.0.0.1:8123")]
    pub clickhouse_url: String,

    /// Number of delivery-stream shards to fan out onto.
    #[clap(long, env = "DELIVERY_SHARD_COUNT", default_value = "8")]
    pub shard_count: u32,

    /// Number of processor worker tasks.
    #[clap(long, env = "PROCESSOR_WORKER_COUNT", default_value = "4")]
    pub worker_count: u32,

    /// Endpoint-index refresh interval.
    #[clap(long, env = "ENDPOINT_REFRESH_SECONDS", default_value = "30")]
    pub endpoint_refresh_seconds: u64,

    /// Bound on how long a stream read blocks when no records are ready.
    #[clap(long, env = "MAX_WAIT_MS", default_value = "1000")]
    pub max_wait_ms: u64,

    #[clap(long, env = "EVENTS_BATCH_CAPACITY", default_value = "500")]
    pub events_batch_capacity: usize,

    #[clap(long, env = "EVENTS_BATCH_TIMEOUT_MS", default_value = "5000")]
    pub events_batch_timeout_ms: u64,

    /// How long an in-flight tick (matching and fanning out one batch of
    /// events) is given to finish after a shutdown signal before it's
    /// abandoned and its queue records left unacknowledged for redelivery.
    #[clap(long, env = "SHUTDOWN_GRACE_MS", default_value = "30000")]
    pub shutdown_grace_ms: u64,

    #[clap(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: ethhook_core::logging::LogFormat,
}

impl Args {
    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }
}
