//! Redis-backed dedup set, keyed by the event identity tuple, per
//! spec §4.5 step 4: `SET key value NX EX ttl`. A failed check fails
//! closed — the caller must not publish — so a degraded dedup store never
//! silently admits duplicates.

use ethhook_core::error::EthHookError;
use ethhook_core::event::EventIdentity;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct DedupStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl DedupStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        DedupStore { conn, ttl_seconds }
    }

    /// Returns `Ok(true)` if `identity` was not previously seen within the
    /// dedup window (and has now been recorded), `Ok(false)` if it is a
    /// duplicate. Any store error is surfaced rather than treated as
    /// "not a duplicate" — callers must fail closed.
    pub async fn check_and_insert(&self, identity: &EventIdentity) -> Result<bool, EthHookError> {
        let mut conn = self.conn.clone();
        let key = format!("dedup:{}", identity.dedup_key());
        let inserted: bool = conn
            .set_nx(&key, 1)
            .await
            .map_err(EthHookError::from)?;
        if inserted {
            let _: () = conn
                .expire(&key, self.ttl_seconds as i64)
                .await
                .map_err(EthHookError::from)?;
        }
        Ok(inserted)
    }
}
