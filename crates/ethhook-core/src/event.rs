//! The chain event: the unit the ingestor publishes and the processor
//! matches against subscriber filters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uniquely identifies a log within and across chains. This tuple is the
/// deduplication key (glossary: "event identity tuple").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    pub chain_id: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub log_index: u32,
}

impl EventIdentity {
    /// A compact, stable string for use as a dedup-store key.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.chain_id, self.block_hash, self.transaction_hash, self.log_index
        )
    }
}

/// A normalized EVM log, ready for canonical-JSON serialization and
/// publication onto `events:{chain_id}`.
///
/// Field order here is the canonical field order: it is preserved by
/// `serde_json` (which emits struct fields in declaration order) and must
/// not be reordered without updating the canonical-JSON round-trip tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub id: Uuid,
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub log_index: u32,
    pub contract_address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub timestamp: i64,
}

impl ChainEvent {
    pub fn identity(&self) -> EventIdentity {
        EventIdentity {
            chain_id: self.chain_id,
            block_hash: self.block_hash.clone(),
            transaction_hash: self.transaction_hash.clone(),
            log_index: self.log_index,
        }
    }

    /// Serializes to the canonical JSON encoding used for HMAC signing,
    /// webhook bodies, and queue records: fixed field order, no
    /// insignificant whitespace. `serde_json::to_vec` already satisfies
    /// both properties for a struct with `#[derive(Serialize)]`.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Lowercases a hex string and ensures it carries a `0x` prefix.
/// Used to normalize `contract_address`, `block_hash`, `transaction_hash`,
/// and each entry of `topics` at ingest time.
pub fn canonicalize_hex(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_event() -> ChainEvent {
        ChainEvent {
            id: Uuid::nil(),
            chain_id: 1,
            block_number: 17_000_000,
            block_hash: "0x".to_string() + &"aa".repeat(32),
            transaction_hash: "0x".to_string() + &"bb".repeat(32),
            log_index: 0,
            contract_address: "0x".to_string() + &"cc".repeat(20),
            topics: vec!["0x".to_string() + &"dd".repeat(32)],
            data: "0x".to_string(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn canonical_json_round_trips() {
        let event = sample_event();
        let bytes = event.to_canonical_json().unwrap();
        let back: ChainEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn canonical_json_has_no_insignificant_whitespace() {
        let event = sample_event();
        let bytes = event.to_canonical_json().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains('\n'));
        assert!(!text.contains("  "));
    }

    #[test]
    fn canonicalize_hex_lowercases_and_prefixes() {
        assert_eq!(canonicalize_hex("ABCD"), "0xabcd");
        assert_eq!(canonicalize_hex("0xABCD"), "0xabcd");
        assert_eq!(canonicalize_hex("0xabcd"), "0xabcd");
    }

    #[test]
    fn identity_tuple_ignores_non_identity_fields() {
        let a = sample_event();
        let mut b = sample_event();
        b.data = "0xff".to_string();
        b.id = Uuid::new_v4();
        assert_eq!(a.identity(), b.identity());
    }
}
