//! In-memory endpoint index, rebuilt on a periodic refresh and swapped in
//! atomically, in the style of the teacher's `gazette` route table: reads
//! never block on a refresh in progress, and a refresh never blocks
//! concurrent readers.

use std::collections::HashMap;
use std::sync::Arc;

use ethhook_core::endpoint::Endpoint;
use ethhook_core::event::ChainEvent;

/// Endpoints grouped for O(1) candidate lookup by `(chain_id,
/// contract_address)`, with a fall-through bucket per chain for
/// address-agnostic endpoints, per spec §4.6.
#[derive(Default)]
pub struct EndpointIndex {
    by_address: HashMap<(u64, String), Vec<Arc<Endpoint>>>,
    address_agnostic: HashMap<u64, Vec<Arc<Endpoint>>>,
}

impl EndpointIndex {
    pub fn build(endpoints: Vec<Endpoint>) -> Self {
        let mut index = EndpointIndex::default();
        for endpoint in endpoints {
            let endpoint = Arc::new(endpoint);
            if endpoint.is_address_agnostic() {
                for chain_id in &endpoint.chain_ids {
                    index
                        .address_agnostic
                        .entry(*chain_id)
                        .or_default()
                        .push(endpoint.clone());
                }
                continue;
            }
            for address in &endpoint.contract_addresses {
                for chain_id in &endpoint.chain_ids {
                    index
                        .by_address
                        .entry((*chain_id, address.clone()))
                        .or_default()
                        .push(endpoint.clone());
                }
            }
        }
        index
    }

    /// Returns every active endpoint matching `event`'s chain, address,
    /// and topic filters, per the matching algorithm in spec §4.6.
    pub fn matches(&self, event: &ChainEvent) -> Vec<Arc<Endpoint>> {
        let mut candidates: Vec<&Arc<Endpoint>> = Vec::new();
        if let Some(bucket) = self
            .by_address
            .get(&(event.chain_id, event.contract_address.clone()))
        {
            candidates.extend(bucket.iter());
        }
        if let Some(bucket) = self.address_agnostic.get(&event.chain_id) {
            candidates.extend(bucket.iter());
        }

        candidates
            .into_iter()
            .filter(|endpoint| endpoint.is_active)
            .filter(|endpoint| endpoint.topics_match(&event.topics))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn endpoint(chain_id: u64, address: Option<&str>) -> Endpoint {
        Endpoint {
            endpoint_id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            is_active: true,
            chain_ids: HashSet::from([chain_id]),
            contract_addresses: address
                .map(|a| HashSet::from([a.to_string()]))
                .unwrap_or_default(),
            topic_filters: vec![],
            webhook_url: "https://example.com/hook".to_string(),
            hmac_secret: b"secret".to_vec(),
            rate_limit_per_sec: 10,
            max_retries: 5,
            timeout_ms: 30_000,
        }
    }

    fn event(chain_id: u64, address: &str) -> ChainEvent {
        ChainEvent {
            id: Uuid::new_v4(),
            chain_id,
            block_number: 1,
            block_hash: "0xabc".to_string(),
            transaction_hash: "0xdef".to_string(),
            log_index: 0,
            contract_address: address.to_string(),
            topics: vec![],
            data: "0x".to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn matches_by_exact_address() {
        let index = EndpointIndex::build(vec![endpoint(1, Some("0xabc"))]);
        let matches = index.matches(&event(1, "0xabc"));
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn matches_address_agnostic_endpoints_for_the_chain() {
        let index = EndpointIndex::build(vec![endpoint(1, None)]);
        assert_eq!(index.matches(&event(1, "0xdead")).len(), 1);
        assert_eq!(index.matches(&event(2, "0xdead")).len(), 0);
    }

    #[test]
    fn address_agnostic_endpoint_matches_on_every_subscribed_chain() {
        let mut multi = endpoint(1, None);
        multi.chain_ids = HashSet::from([1, 2, 3]);
        let index = EndpointIndex::build(vec![multi]);
        assert_eq!(index.matches(&event(1, "0xdead")).len(), 1);
        assert_eq!(index.matches(&event(2, "0xdead")).len(), 1);
        assert_eq!(index.matches(&event(3, "0xdead")).len(), 1);
        assert_eq!(index.matches(&event(4, "0xdead")).len(), 0);
    }

    #[test]
    fn skips_inactive_endpoints() {
        let mut inactive = endpoint(1, Some("0xabc"));
        inactive.is_active = false;
        let index = EndpointIndex::build(vec![inactive]);
        assert_eq!(index.matches(&event(1, "0xabc")).len(), 0);
    }
}
