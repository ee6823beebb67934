//! The subscriber endpoint record, as cached by the processor from the
//! metadata store.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One positional slot of an endpoint's topic filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicFilter {
    /// Matches any topic value at this position.
    Any,
    /// Matches only this exact (already-lowercased) topic.
    Exact(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub endpoint_id: Uuid,
    pub application_id: Uuid,
    pub is_active: bool,
    pub chain_ids: HashSet<u64>,
    /// Empty means "any contract address" (address-agnostic).
    pub contract_addresses: HashSet<String>,
    pub topic_filters: Vec<TopicFilter>,
    pub webhook_url: String,
    pub hmac_secret: Vec<u8>,
    pub rate_limit_per_sec: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl Endpoint {
    /// True when this endpoint's `contract_addresses` set is empty, i.e. it
    /// subscribes to logs from any contract on its configured chains.
    pub fn is_address_agnostic(&self) -> bool {
        self.contract_addresses.is_empty()
    }

    /// Positional topic-filter match against an event's topics, per §4.6:
    /// - a filter with fewer slots than the event has topics ignores the
    ///   extra trailing topics (they're simply not constrained);
    /// - a filter with more slots than the event has topics never matches;
    /// - `TopicFilter::Any` matches anything at that position;
    /// - otherwise the (already-lowercased) strings must match exactly.
    pub fn topics_match(&self, event_topics: &[String]) -> bool {
        if self.topic_filters.len() > event_topics.len() {
            return false;
        }
        self.topic_filters
            .iter()
            .zip(event_topics.iter())
            .all(|(filter, topic)| match filter {
                TopicFilter::Any => true,
                TopicFilter::Exact(expected) => expected == topic,
            })
    }
}
