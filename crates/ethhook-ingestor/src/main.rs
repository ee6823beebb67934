use std::sync::Arc;

use clap::Parser;
use ethhook_core::logging::{self, OrBail};
use ethhook_ingestor::config::Args;
use ethhook_ingestor::dedup::DedupStore;
use ethhook_ingestor::worker::ChainWorker;
use ethhook_queue::{DurableQueue, RedisStreamQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.log_format);
    tracing::info!(chains = %args.chains, "starting ingestor");

    let subscriptions = args.chain_subscriptions();
    if subscriptions.is_empty() {
        tracing::error!("no chain subscriptions configured; set --chains");
        std::process::exit(1);
    }

    let redis_client = redis::Client::open(args.redis_url.as_str())
        .or_bail("invalid redis url");
    let dedup_conn = redis_client
        .get_connection_manager()
        .await
        .or_bail("failed to connect to redis for dedup store");

    let queue: Arc<dyn DurableQueue> = Arc::new(
        RedisStreamQueue::connect(&args.redis_url)
            .await
            .or_bail("failed to connect to redis for the durable queue"),
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let mut handles = Vec::new();

    for (chain_id, url) in subscriptions {
        let dedup = DedupStore::new(dedup_conn.clone(), args.dedup_window_seconds);
        let queue = queue.clone();
        let reconnect_delay_ms = args.reconnect_delay_ms;
        let arena_capacity = args.arena_capacity_bytes;
        let shutdown_grace = args.shutdown_grace();
        let shutdown_rx = shutdown_tx.subscribe();

        handles.push(tokio::spawn(async move {
            let mut worker = ChainWorker::new(chain_id, url, dedup, queue, arena_capacity);
            worker.run(reconnect_delay_ms, shutdown_grace, shutdown_rx).await;
        }));
    }

    ethhook_core::shutdown::wait_for_shutdown_signal().await;
    tracing::info!("received shutdown signal");
    let _ = shutdown_tx.send(());

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
