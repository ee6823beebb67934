//! Error kinds shared across the ingestor, processor, and delivery worker.
//!
//! Variants map one-to-one onto the `Kind` column of the error handling
//! table in the specification: each is either recovered locally by the
//! caller (retried, counted, and dropped) or surfaced as a fatal startup
//! failure. See `EthHookError::is_fatal`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EthHookError {
    /// Malformed upstream log or malformed queue record. Drop, count, continue.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Upstream chain subscription disconnected. Reconnect with backoff.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Durable queue read/append failed.
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    /// Column store or metadata store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// HTTP 4xx other than 408/429. Not retried, breaker untouched.
    #[error("subscriber permanently rejected delivery: {0}")]
    SubscriberPermanent(String),

    /// 408, 429, 5xx, timeout, or network error. Retried per schedule.
    #[error("subscriber transient failure: {0}")]
    SubscriberTransient(String),

    /// The endpoint's circuit breaker is open.
    #[error("circuit open")]
    CircuitOpen,

    /// Process configuration is missing or malformed. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EthHookError {
    /// The stable `error_kind` string recorded in attempt/event rows and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EthHookError::InvalidInput(_) => "invalid_input",
            EthHookError::UpstreamUnavailable(_) => "upstream_unavailable",
            EthHookError::QueueUnavailable(_) => "queue_unavailable",
            EthHookError::StoreUnavailable(_) => "store_unavailable",
            EthHookError::SubscriberPermanent(_) => "subscriber_permanent",
            EthHookError::SubscriberTransient(_) => "subscriber_transient",
            EthHookError::CircuitOpen => "circuit_open",
            EthHookError::Config(_) => "config",
            EthHookError::Io(_) => "io",
        }
    }

    /// Configuration and startup failures exit the process with code 1;
    /// everything else is recovered locally per the propagation policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EthHookError::Config(_))
    }
}

impl From<redis::RedisError> for EthHookError {
    fn from(err: redis::RedisError) -> Self {
        EthHookError::QueueUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for EthHookError {
    fn from(err: sqlx::Error) -> Self {
        EthHookError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for EthHookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EthHookError::SubscriberTransient(err.to_string())
        } else {
            EthHookError::StoreUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, EthHookError>;
