//! Chain-log ingestor: one worker per configured chain, subscribing to
//! upstream logs, normalizing, deduplicating, and publishing onto the
//! durable queue. See spec §4.5.

pub mod config;
pub mod dedup;
pub mod normalize;
pub mod reconnect;
pub mod rpc;
pub mod worker;

pub use worker::ChainWorker;
