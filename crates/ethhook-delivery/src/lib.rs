//! Delivery worker: signs, sends, and retries webhook deliveries drained
//! from the deliveries streams. See spec §4.7.

pub mod config;
pub mod outcome;
pub mod retry;
pub mod worker;

pub use retry::RetryPolicy;
pub use worker::DeliveryWorker;
