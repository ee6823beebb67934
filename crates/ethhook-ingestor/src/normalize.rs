//! Normalizes a raw upstream log into a canonical `ChainEvent`, per
//! spec §4.5 "Normalization": validate identity fields, lowercase hex,
//! assign a fresh id and ingest timestamp.

use chrono::Utc;
use ethhook_core::event::{canonicalize_hex, ChainEvent};
use uuid::Uuid;

use crate::rpc::{parse_hex_u64, RawLog};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("log is missing required field: {0}")]
    MissingField(&'static str),
}

/// Turns a raw log into a `ChainEvent` ready for the events-stream, or
/// rejects it if any identity-tuple field is absent or malformed.
pub fn normalize(chain_id: u64, raw: RawLog) -> Result<ChainEvent, NormalizeError> {
    let contract_address = raw
        .address
        .as_deref()
        .ok_or(NormalizeError::MissingField("address"))?;
    let block_hash = raw
        .block_hash
        .as_deref()
        .ok_or(NormalizeError::MissingField("blockHash"))?;
    let transaction_hash = raw
        .transaction_hash
        .as_deref()
        .ok_or(NormalizeError::MissingField("transactionHash"))?;
    let log_index = raw
        .log_index
        .as_deref()
        .and_then(parse_hex_u64)
        .ok_or(NormalizeError::MissingField("logIndex"))?;
    let block_number = raw
        .block_number
        .as_deref()
        .and_then(parse_hex_u64)
        .ok_or(NormalizeError::MissingField("blockNumber"))?;

    let topics: Vec<String> = raw.topics.iter().map(|t| canonicalize_hex(t)).collect();

    Ok(ChainEvent {
        id: Uuid::new_v4(),
        chain_id,
        block_number,
        block_hash: canonicalize_hex(block_hash),
        transaction_hash: canonicalize_hex(transaction_hash),
        log_index: log_index as u32,
        contract_address: canonicalize_hex(contract_address),
        topics,
        data: raw
            .data
            .map(|d| canonicalize_hex(&d))
            .unwrap_or_else(|| "0x".to_string()),
        timestamp: Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> RawLog {
        RawLog {
            address: Some("0xABCDEF0000000000000000000000000000000F".to_string()),
            topics: vec!["0xABCD".to_string()],
            data: Some("0x1234".to_string()),
            block_number: Some("0x10".to_string()),
            block_hash: Some("0xBEEF".to_string()),
            transaction_hash: Some("0xDEAD".to_string()),
            log_index: Some("0x2".to_string()),
        }
    }

    #[test]
    fn normalizes_case_and_assigns_identity() {
        let event = normalize(1, sample_log()).unwrap();
        assert_eq!(event.contract_address, "0xabcdef0000000000000000000000000000000f");
        assert_eq!(event.block_hash, "0xbeef");
        assert_eq!(event.log_index, 2);
        assert_eq!(event.block_number, 16);
    }

    #[test]
    fn missing_identity_field_is_rejected() {
        let mut log = sample_log();
        log.block_hash = None;
        assert!(normalize(1, log).is_err());
    }

    #[test]
    fn missing_log_index_is_rejected() {
        let mut log = sample_log();
        log.log_index = None;
        assert!(normalize(1, log).is_err());
    }
}
