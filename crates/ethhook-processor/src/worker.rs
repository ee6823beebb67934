//! Processor worker pool: block-reads events streams round-robin across
//! configured chains, matches each event against the endpoint index, and
//! fans out delivery jobs and analytical rows, per spec §4.6.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use uuid::Uuid;

use ethhook_batch::BatchWriter;
use ethhook_core::delivery::{DeliveryJob, EventRow};
use ethhook_core::error::EthHookError;
use ethhook_core::event::ChainEvent;
use ethhook_queue::{deliveries_stream_key, events_stream_key, DurableQueue};

use crate::index::EndpointIndex;

const CONSUMER_GROUP: &str = "processor";

/// Picks a delivery shard for an endpoint. A stable function of the
/// endpoint id keeps all of one endpoint's jobs on a single shard, which
/// bounds how many delivery workers must share its circuit breaker state.
pub fn shard_for_endpoint(endpoint_id: Uuid, shard_count: u32) -> u32 {
    let bytes = endpoint_id.as_bytes();
    let mut acc: u64 = 0;
    for &b in bytes {
        acc = acc.wrapping_mul(31).wrapping_add(b as u64);
    }
    (acc % shard_count as u64) as u32
}

pub struct ProcessorWorker {
    pub worker_id: String,
    chains: Vec<u64>,
    cursor: AtomicUsize,
    queue: Arc<dyn DurableQueue>,
    index: Arc<ArcSwap<EndpointIndex>>,
    events_batch: Arc<BatchWriter<EventRow>>,
    shard_count: u32,
    block_ms: u64,
    batch_count: usize,
}

impl ProcessorWorker {
    pub fn new(
        worker_id: String,
        chains: Vec<u64>,
        queue: Arc<dyn DurableQueue>,
        index: Arc<ArcSwap<EndpointIndex>>,
        events_batch: Arc<BatchWriter<EventRow>>,
        shard_count: u32,
        block_ms: u64,
        batch_count: usize,
    ) -> Self {
        ProcessorWorker {
            worker_id,
            chains,
            cursor: AtomicUsize::new(0),
            queue,
            index,
            events_batch,
            shard_count,
            block_ms,
            batch_count,
        }
    }

    /// Runs until shutdown. On signal, a tick already in flight (e.g. a
    /// fan-out still appending delivery jobs) is given up to
    /// `shutdown_grace` to finish before being abandoned, per spec §5's
    /// cancellation contract.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>, shutdown_grace: Duration) {
        loop {
            let tick = self.tick();
            tokio::pin!(tick);
            tokio::select! {
                _ = &mut tick => {}
                _ = shutdown.recv() => {
                    tracing::info!(worker = %self.worker_id, grace_ms = shutdown_grace.as_millis() as u64, "shutting down processor worker, waiting for in-flight work");
                    if tokio::time::timeout(shutdown_grace, &mut tick).await.is_err() {
                        tracing::warn!(worker = %self.worker_id, "grace period elapsed; abandoning in-flight work");
                    }
                    return;
                }
            }
        }
    }

    async fn tick(&self) {
        let chain_id = self.next_chain();
        let stream = events_stream_key(chain_id);
        let messages = self
            .queue
            .read_blocking(&stream, CONSUMER_GROUP, &self.worker_id, self.block_ms, self.batch_count)
            .await;

        let messages = match messages {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(worker = %self.worker_id, chain_id, error = %err, "events stream read failed");
                return;
            }
        };

        for message in messages {
            if let Err(err) = self.process_message(&stream, &message.id, &message).await {
                tracing::warn!(worker = %self.worker_id, error = %err, "dropping malformed event record");
            }
        }
    }

    fn next_chain(&self) -> u64 {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.chains.len().max(1);
        self.chains[i]
    }

    async fn process_message(
        &self,
        stream: &str,
        record_id: &str,
        message: &ethhook_queue::StreamMessage,
    ) -> Result<(), EthHookError> {
        let body = message
            .field("event")
            .ok_or_else(|| EthHookError::InvalidInput("record missing 'event' field".to_string()))?;
        let event: ChainEvent = serde_json::from_slice(body)
            .map_err(|e| EthHookError::InvalidInput(format!("malformed event record: {e}")))?;

        let index = self.index.load();
        let matches = index.matches(&event);

        for endpoint in &matches {
            let payload = event
                .to_canonical_json()
                .map_err(|e| EthHookError::InvalidInput(e.to_string()))?;
            let job = DeliveryJob::first_attempt(
                event.id,
                endpoint.endpoint_id,
                endpoint.webhook_url.clone(),
                endpoint.hmac_secret.clone(),
                payload,
                endpoint.timeout_ms,
                endpoint.max_retries,
            );
            let job_body = serde_json::to_vec(&job)
                .map_err(|e| EthHookError::InvalidInput(e.to_string()))?;
            let shard = shard_for_endpoint(endpoint.endpoint_id, self.shard_count);
            self.queue
                .append(&deliveries_stream_key(shard), &[("delivery", job_body.as_slice())])
                .await?;

            self.events_batch
                .append(EventRow {
                    event_id: event.id,
                    chain_id: event.chain_id,
                    block_number: event.block_number,
                    log_index: event.log_index,
                    endpoint_id: endpoint.endpoint_id,
                    contract_address: event.contract_address.clone(),
                    ingested_at: Utc::now(),
                })
                .await?;
        }

        // Acknowledge only after every delivery job and analytical append
        // above has completed, per the invariant in spec §4.6.
        self.queue.acknowledge(stream, CONSUMER_GROUP, record_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_assignment_is_stable_for_the_same_endpoint() {
        let id = Uuid::new_v4();
        assert_eq!(shard_for_endpoint(id, 8), shard_for_endpoint(id, 8));
    }

    #[test]
    fn shard_assignment_stays_within_range() {
        let id = Uuid::new_v4();
        assert!(shard_for_endpoint(id, 4) < 4);
    }
}
