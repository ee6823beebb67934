//! Periodic endpoint-index refresh: reloads the active endpoint set from
//! the metadata store and swaps it into the shared `ArcSwap`, per spec
//! §4.6's default 30s refresh interval.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::index::EndpointIndex;
use crate::store::MetadataStore;

pub async fn run(
    store: Arc<MetadataStore>,
    index: Arc<ArcSwap<EndpointIndex>>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                match store.load_active_endpoints().await {
                    Ok(endpoints) => {
                        let count = endpoints.len();
                        index.store(Arc::new(EndpointIndex::build(endpoints)));
                        tracing::debug!(endpoint_count = count, "refreshed endpoint index");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "endpoint index refresh failed, keeping stale index");
                    }
                }
            }
        }
    }
}
