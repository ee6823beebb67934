//! `AnalyticalRow` implementations for the two tables named in spec §7.4:
//! `events` (one row per matched endpoint) and `deliveries` (one row per
//! outbound attempt).

use ethhook_core::delivery::{AttemptRecord, EventRow};

use crate::AnalyticalRow;

impl AnalyticalRow for EventRow {
    fn table_name() -> &'static str {
        "events"
    }
}

impl AnalyticalRow for AttemptRecord {
    fn table_name() -> &'static str {
        "deliveries"
    }
}

/// `CREATE TABLE IF NOT EXISTS` statements for the two analytical tables,
/// partitioned monthly by ingest/delivered time with a ninety-day TTL, per
/// spec §4.3 and §7.4.
pub const EVENTS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    event_id UUID,
    chain_id UInt64,
    block_number UInt64,
    log_index UInt32,
    endpoint_id UUID,
    contract_address String,
    ingested_at DateTime64(3)
) ENGINE = MergeTree
PARTITION BY toYYYYMM(ingested_at)
ORDER BY (chain_id, block_number, log_index)
TTL ingested_at + INTERVAL 90 DAY
"#;

pub const DELIVERIES_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS deliveries (
    delivery_id UUID,
    event_id UUID,
    endpoint_id UUID,
    attempt_number UInt32,
    http_status UInt16,
    error_kind Nullable(String),
    latency_ms UInt64,
    delivered_at DateTime64(3),
    next_retry_at Nullable(DateTime64(3))
) ENGINE = MergeTree
PARTITION BY toYYYYMM(delivered_at)
ORDER BY (endpoint_id, delivered_at)
TTL delivered_at + INTERVAL 90 DAY
"#;
