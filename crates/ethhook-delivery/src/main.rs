use std::sync::Arc;

use clap::Parser;

use ethhook_batch::rows::DELIVERIES_TABLE_DDL;
use ethhook_batch::BatchWriter;
use ethhook_breaker::BreakerRegistry;
use ethhook_core::delivery::AttemptRecord;
use ethhook_core::logging::{self, OrBail};
use ethhook_delivery::config::Args;
use ethhook_delivery::worker::{stream_for_shard, DeliveryWorker};
use ethhook_queue::{DurableQueue, RedisStreamQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.log_format);

    let queue: Arc<dyn DurableQueue> = Arc::new(
        RedisStreamQueue::connect(&args.redis_url)
            .await
            .or_bail("failed to connect to redis"),
    );
    let breakers = Arc::new(BreakerRegistry::default());

    let attempts_batch = Arc::new(BatchWriter::<AttemptRecord>::new(
        &args.clickhouse_url,
        args.attempts_batch_capacity,
        args.attempts_batch_timeout_ms,
    ));
    attempts_batch
        .ensure_schema(DELIVERIES_TABLE_DDL)
        .await
        .or_bail("failed to create the deliveries table");

    let retry_policy = args.retry_policy();
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let mut handles = Vec::new();
    for worker_index in 0..args.worker_count {
        let shard = worker_index % args.shard_count;
        let worker = DeliveryWorker::new(
            format!("delivery-{worker_index}"),
            stream_for_shard(shard),
            queue.clone(),
            breakers.clone(),
            attempts_batch.clone(),
            retry_policy,
            args.max_wait_ms,
            50,
        );
        let shutdown_rx = shutdown_tx.subscribe();
        let shutdown_grace = args.shutdown_grace();
        handles.push(tokio::spawn(async move {
            worker.run(shutdown_rx, shutdown_grace).await;
        }));
    }

    ethhook_core::shutdown::wait_for_shutdown_signal().await;
    tracing::info!("received shutdown signal");
    let _ = shutdown_tx.send(());

    for handle in handles {
        let _ = handle.await;
    }
    if let Err(err) = attempts_batch.flush().await {
        tracing::error!(error = %err, "failed to flush attempt-records batch on shutdown");
    }
    Ok(())
}
