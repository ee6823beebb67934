//! Process configuration, in the style of the teacher's `agent::Args`:
//! `clap::Parser` with `env =` fallbacks, loaded through `dotenvy` before
//! parsing so a local `.env` can stand in for a full environment.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "EthHook chain-log ingestor", long_about = None)]
pub struct Args {
    /// Comma-separated `chain_id=wss://...` upstream subscriptions.
    #[clap(long, env = "INGESTOR_CHAINS")]
    pub chains: String,

    /// Redis connection string used for both the durable queue and the
    /// dedup set.
    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Starting reconnect delay, doubled on each consecutive failure.
    #[clap(long, env = "RECONNECT_DELAY_MS", default_value = "1000")]
    pub reconnect_delay_ms: u64,

    /// Dedup window; identity tuples are remembered for this long.
    #[clap(long, env = "DEDUP_WINDOW_SECONDS", default_value = "600")]
    pub dedup_window_seconds: u64,

    /// Capacity, in bytes, of each chain worker's per-event arena.
    #[clap(long, env = "ARENA_CAPACITY_BYTES", default_value = "65536")]
    pub arena_capacity_bytes: usize,

    /// How long an in-flight upstream read is given to finish after a
    /// shutdown signal before the connection is abandoned.
    #[clap(long, env = "SHUTDOWN_GRACE_MS", default_value = "30000")]
    pub shutdown_grace_ms: u64,

    #[clap(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: ethhook_core::logging::LogFormat,
}

impl Args {
    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Parses `chain_id=url` pairs out of `--chains`.
    pub fn chain_subscriptions(&self) -> Vec<(u64, String)> {
        self.chains
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|pair| {
                let (id, url) = pair.split_once('=')?;
                let chain_id = id.trim().parse().ok()?;
                Some((chain_id, url.trim().to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_chain_subscriptions() {
        let args = Args::parse_from([
            "ethhook-ingestor",
            "--chains",
            "1=wss://mainnet,137=wss://polygon",
        ]);
        assert_eq!(
            args.chain_subscriptions(),
            vec![
                (1, "wss://mainnet".to_string()),
                (137, "wss://polygon".to_string()),
            ]
        );
    }
}
