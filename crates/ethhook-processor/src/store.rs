//! Reads the active endpoint set from the metadata store (Postgres),
//! owned externally per spec §1 ("the metadata store ... the core only
//! consumes defined interfaces from each"). This module is the consuming
//! side of that interface, following the teacher's `sqlx` usage in
//! `crates/agent` for typed row queries against Postgres.

use std::collections::HashSet;

use ethhook_core::endpoint::{Endpoint, TopicFilter};
use ethhook_core::error::EthHookError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct EndpointRow {
    endpoint_id: Uuid,
    application_id: Uuid,
    is_active: bool,
    chain_ids: Vec<i64>,
    contract_addresses: Vec<String>,
    topic_filters: Vec<Option<String>>,
    webhook_url: String,
    hmac_secret: Vec<u8>,
    rate_limit_per_sec: i32,
    max_retries: i32,
    timeout_ms: i64,
}

impl From<EndpointRow> for Endpoint {
    fn from(row: EndpointRow) -> Self {
        Endpoint {
            endpoint_id: row.endpoint_id,
            application_id: row.application_id,
            is_active: row.is_active,
            chain_ids: row.chain_ids.into_iter().map(|id| id as u64).collect(),
            contract_addresses: row.contract_addresses.into_iter().collect::<HashSet<_>>(),
            topic_filters: row
                .topic_filters
                .into_iter()
                .map(|slot| match slot {
                    Some(topic) => TopicFilter::Exact(topic),
                    None => TopicFilter::Any,
                })
                .collect(),
            webhook_url: row.webhook_url,
            hmac_secret: row.hmac_secret,
            rate_limit_per_sec: row.rate_limit_per_sec as u32,
            max_retries: row.max_retries as u32,
            timeout_ms: row.timeout_ms as u64,
        }
    }
}

pub struct MetadataStore {
    pool: PgPool,
}

impl MetadataStore {
    pub async fn connect(database_url: &str) -> Result<Self, EthHookError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(MetadataStore { pool })
    }

    /// Loads every active endpoint, joined with its application's webhook
    /// secret, for the in-memory index to bucket by `(chain_id,
    /// contract_address)`.
    pub async fn load_active_endpoints(&self) -> Result<Vec<Endpoint>, EthHookError> {
        let rows = sqlx::query_as::<_, EndpointRow>(
            r#"
            SELECT
                e.endpoint_id,
                e.application_id,
                e.is_active,
                e.chain_ids,
                e.contract_addresses,
                e.topic_filters,
                e.webhook_url,
                a.hmac_secret,
                e.rate_limit_per_sec,
                e.max_retries,
                e.timeout_ms
            FROM endpoints e
            JOIN applications a ON a.application_id = e.application_id
            WHERE e.is_active = true
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Endpoint::from).collect())
    }
}
