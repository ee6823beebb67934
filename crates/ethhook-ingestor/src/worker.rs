//! One worker per configured chain: owns an arena, a circuit breaker for
//! the upstream connection, and the counters `events_received`,
//! `events_published`, `errors`, per spec §4.5.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use ethhook_arena::EventArena;
use ethhook_breaker::{BreakerConfig, EndpointBreaker};
use ethhook_core::error::EthHookError;
use ethhook_queue::{events_stream_key, DurableQueue};

use crate::dedup::DedupStore;
use crate::reconnect::ReconnectBackoff;
use crate::rpc::{IncomingMessage, SubscribeRequest};

#[derive(Debug, Default)]
pub struct WorkerCounters {
    pub events_received: AtomicU64,
    pub events_published: AtomicU64,
    pub errors: AtomicU64,
}

pub struct ChainWorker {
    pub chain_id: u64,
    pub upstream_url: String,
    arena: EventArena,
    breaker: EndpointBreaker,
    dedup: DedupStore,
    queue: Arc<dyn DurableQueue>,
    pub counters: WorkerCounters,
}

impl ChainWorker {
    pub fn new(
        chain_id: u64,
        upstream_url: String,
        dedup: DedupStore,
        queue: Arc<dyn DurableQueue>,
        arena_capacity: usize,
    ) -> Self {
        ChainWorker {
            chain_id,
            upstream_url,
            arena: EventArena::new(arena_capacity),
            breaker: EndpointBreaker::new(BreakerConfig::default()),
            dedup,
            queue,
            counters: WorkerCounters::default(),
        }
    }

    /// Runs forever, reconnecting on every disconnect, until `shutdown`
    /// resolves. On signal, the in-flight upstream read (and whatever
    /// frame it's mid-processing) is given up to `shutdown_grace` to
    /// finish before the connection is abandoned, per spec §5's
    /// cancellation contract.
    pub async fn run(
        &mut self,
        reconnect_delay_ms: u64,
        shutdown_grace: std::time::Duration,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) {
        let mut backoff = ReconnectBackoff::new(reconnect_delay_ms);
        let chain_id = self.chain_id;
        loop {
            // Scoped so `run_once`'s `&mut self` borrow ends here, before
            // the match below needs `self.counters`/`self.breaker` again.
            let outcome = {
                let run_once = self.run_once(&mut backoff);
                tokio::pin!(run_once);
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!(chain_id, grace_ms = shutdown_grace.as_millis() as u64, "shutting down chain worker, waiting for in-flight read");
                        if tokio::time::timeout(shutdown_grace, &mut run_once).await.is_err() {
                            tracing::warn!(chain_id, "grace period elapsed; abandoning in-flight upstream connection");
                        }
                        None
                    }
                    result = &mut run_once => Some(result),
                }
            };

            let Some(result) = outcome else { return };

            match result {
                Ok(()) => {
                    // Clean stream end: treat as a disconnect and reconnect.
                }
                Err(err) => {
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(chain_id, error = %err, "upstream connection failed");
                }
            }
            self.breaker.record_failure();
            let delay = backoff.record_disconnected();
            tracing::info!(chain_id, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => return,
            }
        }
    }

    async fn run_once(&mut self, backoff: &mut ReconnectBackoff) -> Result<(), EthHookError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.upstream_url)
            .await
            .map_err(|e| EthHookError::UpstreamUnavailable(e.to_string()))?;
        self.breaker.record_success();
        backoff.record_connected();
        tracing::info!(chain_id = self.chain_id, "connected to upstream");

        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::to_string(&SubscribeRequest::logs())
            .expect("subscribe request serializes");
        write
            .send(Message::Text(subscribe))
            .await
            .map_err(|e| EthHookError::UpstreamUnavailable(e.to_string()))?;

        while let Some(message) = read.next().await {
            let message = message.map_err(|e| EthHookError::UpstreamUnavailable(e.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => break,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        self.counters.errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                },
                Message::Frame(_) => continue,
            };

            if let Err(err) = self.handle_frame(&text).await {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(chain_id = self.chain_id, error = %err, "discarding malformed frame");
            }
        }
        Ok(())
    }

    async fn handle_frame(&mut self, text: &str) -> Result<(), EthHookError> {
        let parsed: IncomingMessage = serde_json::from_str(text)
            .map_err(|e| EthHookError::InvalidInput(format!("malformed frame: {e}")))?;

        let notification = match parsed {
            IncomingMessage::Notification(n) => n,
            IncomingMessage::Response(_) => return Ok(()),
        };
        if notification.method != "eth_subscription" {
            return Ok(());
        }

        self.counters.events_received.fetch_add(1, Ordering::Relaxed);

        let event = crate::normalize::normalize(self.chain_id, notification.params.result)
            .map_err(|e| EthHookError::InvalidInput(e.to_string()))?;

        let identity = event.identity();
        let fresh = self.dedup.check_and_insert(&identity).await?;
        if !fresh {
            tracing::trace!(chain_id = self.chain_id, key = %identity.dedup_key(), "dropping duplicate event");
            return Ok(());
        }

        let _scratch = self.arena.duplicate_bytes(event.contract_address.as_bytes());
        self.arena.reset();

        let body = event
            .to_canonical_json()
            .map_err(|e| EthHookError::InvalidInput(e.to_string()))?;
        self.queue
            .append(&events_stream_key(self.chain_id), &[("event", body.as_slice())])
            .await?;

        self.counters.events_published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
