//! Delivery job and attempt-record types exchanged between the processor,
//! the deliveries stream, and the analytical store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub delivery_id: Uuid,
    pub event_id: Uuid,
    pub endpoint_id: Uuid,
    pub webhook_url: String,
    pub hmac_secret: Vec<u8>,
    /// Canonical event JSON, carried inline so delivery needs no
    /// metadata-store read on the hot path.
    pub payload: Vec<u8>,
    pub attempt: u32,
    pub scheduled_at: DateTime<Utc>,
    /// Endpoint's configured request timeout, carried inline for the same
    /// reason as `webhook_url`/`hmac_secret`.
    pub timeout_ms: u64,
    /// Endpoint's configured retry ceiling, carried inline so a change to
    /// the endpoint's policy doesn't retroactively alter jobs already in
    /// flight.
    pub max_retries: u32,
}

impl DeliveryJob {
    #[allow(clippy::too_many_arguments)]
    pub fn first_attempt(
        event_id: Uuid,
        endpoint_id: Uuid,
        webhook_url: String,
        hmac_secret: Vec<u8>,
        payload: Vec<u8>,
        timeout_ms: u64,
        max_retries: u32,
    ) -> Self {
        DeliveryJob {
            delivery_id: Uuid::new_v4(),
            event_id,
            endpoint_id,
            webhook_url,
            hmac_secret,
            payload,
            attempt: 0,
            scheduled_at: Utc::now(),
            timeout_ms,
            max_retries,
        }
    }

    /// Builds the next retry of this job: same identity, incremented
    /// attempt, rescheduled per the retry delay.
    pub fn next_attempt(&self, delay: std::time::Duration) -> Self {
        DeliveryJob {
            delivery_id: self.delivery_id,
            event_id: self.event_id,
            endpoint_id: self.endpoint_id,
            webhook_url: self.webhook_url.clone(),
            hmac_secret: self.hmac_secret.clone(),
            payload: self.payload.clone(),
            attempt: self.attempt + 1,
            scheduled_at: Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()),
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
        }
    }
}

/// The `error_kind` recorded on a delivery attempt. A strict subset of
/// `EthHookError`'s kinds: only those that can occur during a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    SubscriberPermanent,
    SubscriberTransient,
    CircuitOpen,
    RedirectLoop,
    Exhausted,
}

impl AttemptErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptErrorKind::SubscriberPermanent => "subscriber_permanent",
            AttemptErrorKind::SubscriberTransient => "subscriber_transient",
            AttemptErrorKind::CircuitOpen => "circuit_open",
            AttemptErrorKind::RedirectLoop => "redirect_loop",
            AttemptErrorKind::Exhausted => "exhausted",
        }
    }
}

/// One row per outbound try, appended to the analytical deliveries table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub delivery_id: Uuid,
    pub event_id: Uuid,
    pub endpoint_id: Uuid,
    pub attempt_number: u32,
    pub http_status: u16,
    pub error_kind: Option<AttemptErrorKind>,
    pub latency_ms: u64,
    pub delivered_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// The analytical event row, one per matched endpoint so downstream
/// analytics can join by endpoint without a secondary table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub event_id: Uuid,
    pub chain_id: u64,
    pub block_number: u64,
    pub log_index: u32,
    pub endpoint_id: Uuid,
    pub contract_address: String,
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_attempt_increments_and_preserves_identity() {
        let job = DeliveryJob::first_attempt(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "https://x.example/h".to_string(),
            b"secret".to_vec(),
            b"{}".to_vec(),
            30_000,
            5,
        );
        let retry = job.next_attempt(std::time::Duration::from_secs(1));
        assert_eq!(retry.delivery_id, job.delivery_id);
        assert_eq!(retry.attempt, job.attempt + 1);
        assert!(retry.scheduled_at > job.scheduled_at);
    }
}
