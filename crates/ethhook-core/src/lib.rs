//! Shared types and ambient infrastructure for the EthHook event pipeline:
//! the wire types exchanged between ingestor, processor, and delivery
//! worker, canonical-JSON helpers, HMAC signing, structured logging, and
//! the common error taxonomy.

pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod logging;
pub mod shutdown;
pub mod signature;

pub use delivery::{AttemptErrorKind, AttemptRecord, DeliveryJob, EventRow};
pub use endpoint::{Endpoint, TopicFilter};
pub use error::{EthHookError, Result};
pub use event::{canonicalize_hex, ChainEvent, EventIdentity};
