//! JSON-RPC 2.0 framing for the upstream `eth_subscribe("logs")` feed, per
//! spec §7.1: a single subscribe request on connect, then a stream of
//! `eth_subscription` notifications each wrapping one raw log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: (&'static str, serde_json::Value),
}

impl SubscribeRequest {
    pub fn logs() -> Self {
        SubscribeRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_subscribe",
            params: ("logs", serde_json::json!({})),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Notification(SubscriptionNotification),
    Response(JsonRpcResponse),
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionNotification {
    pub method: String,
    pub params: SubscriptionParams,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: RawLog,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// A raw log exactly as the upstream node reports it: mixed-case hex,
/// variable topic count, numeric fields hex-encoded per the JSON-RPC
/// convention.
#[derive(Debug, Deserialize)]
pub struct RawLog {
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash")]
    pub block_hash: Option<String>,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(rename = "logIndex")]
    pub log_index: Option<String>,
}

pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(trimmed, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_matches_wire_shape() {
        let req = SubscribeRequest::logs();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["method"], "eth_subscribe");
        assert_eq!(json["params"][0], "logs");
    }

    #[test]
    fn parses_notification_envelope() {
        let raw = serde_json::json!({
            "method": "eth_subscription",
            "params": {
                "subscription": "0xabc",
                "result": {
                    "address": "0xABCDEF0000000000000000000000000000000F",
                    "topics": ["0x1111111111111111111111111111111111111111111111111111111111111"],
                    "data": "0x",
                    "blockNumber": "0x10",
                    "blockHash": "0xbeef",
                    "transactionHash": "0xdead",
                    "logIndex": "0x2"
                }
            }
        });
        let parsed: IncomingMessage = serde_json::from_value(raw).unwrap();
        match parsed {
            IncomingMessage::Notification(n) => {
                assert_eq!(n.method, "eth_subscription");
                assert_eq!(parse_hex_u64(&n.params.result.log_index.unwrap()), Some(2));
            }
            IncomingMessage::Response(_) => panic!("expected a notification"),
        }
    }

    #[test]
    fn parse_hex_u64_handles_missing_prefix() {
        assert_eq!(parse_hex_u64("10"), Some(16));
        assert_eq!(parse_hex_u64("0x10"), Some(16));
    }
}
