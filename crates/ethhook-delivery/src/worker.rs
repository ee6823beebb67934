//! Delivery worker: drains a deliveries-stream shard, signs and POSTs each
//! job, classifies the outcome, and either acknowledges a terminal record
//! or re-enqueues a retry. See spec §4.7.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::redirect::Policy;

use ethhook_batch::BatchWriter;
use ethhook_breaker::BreakerRegistry;
use ethhook_core::delivery::{AttemptErrorKind, AttemptRecord, DeliveryJob};
use ethhook_core::error::EthHookError;
use ethhook_core::signature::signature_header;
use ethhook_queue::DurableQueue;

use crate::outcome::{classify_network_error, classify_status, Outcome};
use crate::retry::RetryPolicy;

const CONSUMER_GROUP: &str = "delivery";
const REDIRECT_BUDGET: usize = 3;
/// How long a worker re-enqueues a not-yet-due job for, rather than
/// spinning on it immediately.
const NOT_DUE_REQUEUE_DELAY: Duration = Duration::from_millis(250);

pub struct DeliveryWorker {
    pub worker_id: String,
    stream: String,
    queue: Arc<dyn DurableQueue>,
    breakers: Arc<BreakerRegistry>,
    attempts_batch: Arc<BatchWriter<AttemptRecord>>,
    retry_policy: RetryPolicy,
    http_client: reqwest::Client,
    block_ms: u64,
    batch_count: usize,
}

impl DeliveryWorker {
    pub fn new(
        worker_id: String,
        stream: String,
        queue: Arc<dyn DurableQueue>,
        breakers: Arc<BreakerRegistry>,
        attempts_batch: Arc<BatchWriter<AttemptRecord>>,
        retry_policy: RetryPolicy,
        block_ms: u64,
        batch_count: usize,
    ) -> Self {
        // No client-wide timeout: each job carries its own endpoint
        // timeout, applied per-request in `send`. The redirect policy is
        // fixed, since the redirect budget is a pipeline-wide constant.
        let http_client = reqwest::Client::builder()
            .redirect(Policy::limited(REDIRECT_BUDGET))
            .build()
            .expect("reqwest client configuration is valid");

        DeliveryWorker {
            worker_id,
            stream,
            queue,
            breakers,
            attempts_batch,
            retry_policy,
            http_client,
            block_ms,
            batch_count,
        }
    }

    /// Runs until shutdown. On signal, a tick already in flight (e.g. a
    /// POST awaiting a response) is given up to `shutdown_grace` to finish
    /// before being abandoned, per spec §5's cancellation contract.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>, shutdown_grace: Duration) {
        loop {
            let tick = self.tick();
            tokio::pin!(tick);
            tokio::select! {
                _ = &mut tick => {}
                _ = shutdown.recv() => {
                    tracing::info!(worker = %self.worker_id, grace_ms = shutdown_grace.as_millis() as u64, "shutting down delivery worker, waiting for in-flight delivery");
                    if tokio::time::timeout(shutdown_grace, &mut tick).await.is_err() {
                        tracing::warn!(worker = %self.worker_id, "grace period elapsed; abandoning in-flight delivery");
                    }
                    return;
                }
            }
        }
    }

    async fn tick(&self) {
        let messages = self
            .queue
            .read_blocking(&self.stream, CONSUMER_GROUP, &self.worker_id, self.block_ms, self.batch_count)
            .await;

        let messages = match messages {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(worker = %self.worker_id, error = %err, "deliveries stream read failed");
                return;
            }
        };

        for message in messages {
            if let Err(err) = self.process_message(&message.id, &message).await {
                tracing::warn!(worker = %self.worker_id, error = %err, "dropping malformed delivery record");
            }
        }
    }

    async fn process_message(
        &self,
        record_id: &str,
        message: &ethhook_queue::StreamMessage,
    ) -> Result<(), EthHookError> {
        let body = message.field("delivery").ok_or_else(|| {
            EthHookError::InvalidInput("record missing 'delivery' field".to_string())
        })?;
        let job: DeliveryJob = serde_json::from_slice(body)
            .map_err(|e| EthHookError::InvalidInput(format!("malformed delivery record: {e}")))?;

        // Step 1: not-yet-due jobs are re-enqueued without counting an attempt.
        if job.scheduled_at > Utc::now() {
            self.requeue(&job, NOT_DUE_REQUEUE_DELAY).await?;
            return self.queue.acknowledge(&self.stream, CONSUMER_GROUP, record_id).await;
        }

        let breaker = self.breakers.breaker_for(job.endpoint_id);

        // Step 2: circuit breaker gate. Unlike the transient path, this has
        // no exhaustion clause in spec §4.7 — a job stuck behind an open
        // breaker keeps being rescheduled until the breaker clears, not
        // capped by the endpoint's ordinary `max_retries`.
        if !breaker.may_proceed() {
            let next_retry_at = self.requeue_circuit_open(&job).await?;
            self.record_attempt(
                &job,
                0,
                Some(AttemptErrorKind::CircuitOpen),
                0,
                Some(next_retry_at),
            )
            .await?;
            return self.queue.acknowledge(&self.stream, CONSUMER_GROUP, record_id).await;
        }

        // Steps 3-4: sign and send.
        let started = Instant::now();
        let send_result = self.send(&job).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let outcome = match &send_result {
            Ok((status, hit_redirect_budget)) => classify_status(*status, *hit_redirect_budget),
            Err(err) => classify_network_error(err),
        };
        let http_status = send_result.as_ref().map(|(status, _)| *status).unwrap_or(0);

        match outcome {
            Outcome::Success => {
                breaker.record_success();
                self.record_attempt(&job, http_status, None, latency_ms, None)
                    .await?;
            }
            Outcome::Permanent => {
                // Subscriber misconfiguration, not a dependency failure: breaker untouched.
                self.record_attempt(
                    &job,
                    http_status,
                    outcome.error_kind(),
                    latency_ms,
                    None,
                )
                .await?;
            }
            Outcome::RedirectLoop | Outcome::Transient => {
                breaker.record_failure();
                let next_retry_at = self.schedule_retry_or_exhaust(&job).await?;
                self.record_attempt(
                    &job,
                    http_status,
                    if next_retry_at.is_some() {
                        outcome.error_kind()
                    } else {
                        Some(AttemptErrorKind::Exhausted)
                    },
                    latency_ms,
                    next_retry_at,
                )
                .await?;
            }
        }

        self.queue.acknowledge(&self.stream, CONSUMER_GROUP, record_id).await
    }

    /// Returns the raw `reqwest::Error` on failure, not `EthHookError`:
    /// `classify_network_error` needs `is_redirect()`, which the
    /// `From<reqwest::Error>` conversion in `ethhook_core::error` discards.
    async fn send(&self, job: &DeliveryJob) -> Result<(u16, bool), reqwest::Error> {
        let signature = signature_header(&job.hmac_secret, &job.payload);

        let response = self
            .http_client
            .post(&job.webhook_url)
            .timeout(Duration::from_millis(job.timeout_ms))
            .header("Content-Type", "application/json")
            .header("User-Agent", "EthHook-Delivery/1.0")
            .header("X-Webhook-Signature", signature)
            .header("X-Webhook-Id", job.delivery_id.to_string())
            .header("X-Webhook-Attempt", job.attempt.to_string())
            .body(job.payload.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        // Reaching here with a 3xx (rather than the redirect policy
        // surfacing `Err` with `is_redirect()`) means the final hop itself
        // answered with a redirect that had no further `Location`, which we
        // still treat as exhausting the budget per spec's "3xx after
        // redirect budget" wording.
        let hit_redirect_budget = (300..400).contains(&status);
        Ok((status, hit_redirect_budget))
    }

    /// Unconditionally reschedules a job gated by an open breaker, ignoring
    /// `job.max_retries` — see the comment at the call site. Uses the same
    /// backoff curve as `schedule_retry_or_exhaust` so a long-open breaker
    /// doesn't flood the stream with immediate re-deliveries.
    async fn requeue_circuit_open(
        &self,
        job: &DeliveryJob,
    ) -> Result<chrono::DateTime<Utc>, EthHookError> {
        let delay = self.retry_policy.delay_for(job.attempt + 1);
        self.requeue(job, delay).await?;
        Ok(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default())
    }

    /// Schedules a retry if attempts remain; returns the retry time, or
    /// `None` if the job is now exhausted (no further retry scheduled).
    async fn schedule_retry_or_exhaust(
        &self,
        job: &DeliveryJob,
    ) -> Result<Option<chrono::DateTime<Utc>>, EthHookError> {
        let next_attempt_number = job.attempt + 1;
        if !self.retry_policy.should_retry(next_attempt_number, job.max_retries) {
            return Ok(None);
        }
        let delay = self.retry_policy.delay_for(next_attempt_number);
        self.requeue(job, delay).await?;
        Ok(Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default()))
    }

    async fn requeue(&self, job: &DeliveryJob, delay: Duration) -> Result<(), EthHookError> {
        let retry_job = job.next_attempt(delay);
        let body = serde_json::to_vec(&retry_job)
            .map_err(|e| EthHookError::InvalidInput(e.to_string()))?;
        self.queue
            .append(&self.stream, &[("delivery", body.as_slice())])
            .await?;
        Ok(())
    }

    async fn record_attempt(
        &self,
        job: &DeliveryJob,
        http_status: u16,
        error_kind: Option<AttemptErrorKind>,
        latency_ms: u64,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), EthHookError> {
        self.attempts_batch
            .append(AttemptRecord {
                delivery_id: job.delivery_id,
                event_id: job.event_id,
                endpoint_id: job.endpoint_id,
                attempt_number: job.attempt,
                http_status,
                error_kind,
                latency_ms,
                delivered_at: Utc::now(),
                next_retry_at,
            })
            .await
    }
}

/// Picks the delivery-stream shard a worker should drain, mirroring the
/// processor's own `shard_for_endpoint` so both sides agree on naming.
pub fn stream_for_shard(shard: u32) -> String {
    ethhook_queue::deliveries_stream_key(shard)
}
