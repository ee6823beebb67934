use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::Parser;

use ethhook_batch::rows::EVENTS_TABLE_DDL;
use ethhook_batch::BatchWriter;
use ethhook_core::delivery::EventRow;
use ethhook_core::logging::{self, OrBail};
use ethhook_processor::config::Args;
use ethhook_processor::index::EndpointIndex;
use ethhook_processor::store::MetadataStore;
use ethhook_processor::worker::ProcessorWorker;
use ethhook_queue::{DurableQueue, RedisStreamQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.log_format);

    let chains = args.chain_ids();
    if chains.is_empty() {
        tracing::error!("no chains configured; set --chains");
        std::process::exit(1);
    }

    let store = Arc::new(
        MetadataStore::connect(&args.database_url)
            .await
            .or_bail("failed to connect to the metadata store"),
    );
    let queue: Arc<dyn DurableQueue> = Arc::new(
        RedisStreamQueue::connect(&args.redis_url)
            .await
            .or_bail("failed to connect to redis"),
    );

    let initial_endpoints = store
        .load_active_endpoints()
        .await
        .or_bail("failed to load the initial endpoint index");
    let index = Arc::new(ArcSwap::from_pointee(EndpointIndex::build(initial_endpoints)));

    let events_batch = Arc::new(BatchWriter::<EventRow>::new(
        &args.clickhouse_url,
        args.events_batch_capacity,
        args.events_batch_timeout_ms,
    ));
    events_batch
        .ensure_schema(EVENTS_TABLE_DDL)
        .await
        .or_bail("failed to create the events table");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let refresh_handle = tokio::spawn(ethhook_processor::refresh::run(
        store.clone(),
        index.clone(),
        Duration::from_secs(args.endpoint_refresh_seconds),
        shutdown_tx.subscribe(),
    ));

    let mut worker_handles = Vec::new();
    for worker_index in 0..args.worker_count {
        let worker = ProcessorWorker::new(
            format!("processor-{worker_index}"),
            chains.clone(),
            queue.clone(),
            index.clone(),
            events_batch.clone(),
            args.shard_count,
            args.max_wait_ms,
            100,
        );
        let shutdown_rx = shutdown_tx.subscribe();
        let shutdown_grace = args.shutdown_grace();
        worker_handles.push(tokio::spawn(async move {
            worker.run(shutdown_rx, shutdown_grace).await;
        }));
    }

    ethhook_core::shutdown::wait_for_shutdown_signal().await;
    tracing::info!("received shutdown signal");
    let _ = shutdown_tx.send(());

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = refresh_handle.await;
    if let Err(err) = events_batch.flush().await {
        tracing::error!(error = %err, "failed to flush analytical events batch on shutdown");
    }
    Ok(())
}
