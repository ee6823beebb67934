//! Exercises `BatchWriter` against a real ClickHouse instance. Skipped by
//! default; run with `cargo test -- --ignored` against a store reachable at
//! `TEST_CLICKHOUSE_URL` (falls back to `http://127.0.0.1:8123`).

use std::env;

use ethhook_batch::{AnalyticalRow, BatchWriter};
use serde::Serialize;

fn test_clickhouse_url() -> String {
    env::var("TEST_CLICKHOUSE_URL").unwrap_or_else(|_| "http://127.0.0.1:8123".to_string())
}

#[derive(Serialize)]
struct ProbeRow {
    id: u64,
    label: String,
}

impl AnalyticalRow for ProbeRow {
    fn table_name() -> &'static str {
        "ethhook_batch_writer_probe"
    }
}

const PROBE_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS ethhook_batch_writer_probe (
    id UInt64,
    label String
) ENGINE = MergeTree
ORDER BY id
"#;

#[ignore]
#[tokio::test]
async fn ensure_schema_then_flush_inserts_rows() {
    let writer: BatchWriter<ProbeRow> =
        BatchWriter::new(test_clickhouse_url(), 100, 60_000);

    writer
        .ensure_schema(PROBE_TABLE_DDL)
        .await
        .expect("ensure_schema");

    writer
        .append(ProbeRow { id: 1, label: "a".to_string() })
        .await
        .expect("append");
    writer
        .append(ProbeRow { id: 2, label: "b".to_string() })
        .await
        .expect("append");

    writer.flush().await.expect("flush");

    let metrics = writer.metrics();
    assert_eq!(metrics.batches_flushed, 1);
    assert_eq!(metrics.rows_inserted, 2);
}

#[ignore]
#[tokio::test]
async fn append_flushes_automatically_at_capacity() {
    let writer: BatchWriter<ProbeRow> = BatchWriter::new(test_clickhouse_url(), 2, 60_000);
    writer
        .ensure_schema(PROBE_TABLE_DDL)
        .await
        .expect("ensure_schema");

    writer.append(ProbeRow { id: 10, label: "x".to_string() }).await.expect("append 1");
    assert_eq!(writer.metrics().batches_flushed, 0);
    writer.append(ProbeRow { id: 11, label: "y".to_string() }).await.expect("append 2");
    assert_eq!(writer.metrics().batches_flushed, 1);
}
