//! Reconnect backoff for the upstream subscription, per spec §4.5:
//! "Reconnect delay starts at `reconnect_delay_ms` and doubles on each
//! failure up to 60s, then plateaus; delay resets on sustained success
//! (>= one minute connected)."

use std::time::{Duration, Instant};

const MAX_DELAY: Duration = Duration::from_secs(60);
const SUSTAINED_CONNECTION: Duration = Duration::from_secs(60);

pub struct ReconnectBackoff {
    base: Duration,
    current: Duration,
    connected_since: Option<Instant>,
}

impl ReconnectBackoff {
    pub fn new(base_ms: u64) -> Self {
        let base = Duration::from_millis(base_ms);
        ReconnectBackoff {
            base,
            current: base,
            connected_since: None,
        }
    }

    /// Call when a connection attempt succeeds.
    pub fn record_connected(&mut self) {
        self.connected_since = Some(Instant::now());
    }

    /// Call when the connection is lost or a connection attempt fails.
    /// Returns the delay to wait before the next attempt, doubling the
    /// previous delay (capped at 60s) unless the prior connection was
    /// sustained for at least a minute, in which case the backoff resets
    /// to its base.
    pub fn record_disconnected(&mut self) -> Duration {
        let sustained = self
            .connected_since
            .map(|since| since.elapsed() >= SUSTAINED_CONNECTION)
            .unwrap_or(false);
        self.connected_since = None;

        if sustained {
            self.current = self.base;
        } else {
            self.current = std::cmp::min(self.current * 2, MAX_DELAY);
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_on_repeated_failure() {
        let mut backoff = ReconnectBackoff::new(100);
        assert_eq!(backoff.record_disconnected(), Duration::from_millis(200));
        assert_eq!(backoff.record_disconnected(), Duration::from_millis(400));
        assert_eq!(backoff.record_disconnected(), Duration::from_millis(800));
    }

    #[test]
    fn plateaus_at_sixty_seconds() {
        let mut backoff = ReconnectBackoff::new(50_000);
        backoff.record_disconnected();
        assert_eq!(backoff.record_disconnected(), MAX_DELAY);
        assert_eq!(backoff.record_disconnected(), MAX_DELAY);
    }

    #[test]
    fn resets_after_sustained_connection() {
        let mut backoff = ReconnectBackoff::new(100);
        backoff.record_disconnected();
        backoff.record_disconnected();
        // Simulate a long successful connection by backdating connected_since.
        backoff.connected_since = Some(Instant::now() - SUSTAINED_CONNECTION);
        let delay = backoff.record_disconnected();
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn brief_connection_does_not_reset_backoff() {
        let mut backoff = ReconnectBackoff::new(100);
        backoff.record_disconnected();
        backoff.record_connected();
        let delay = backoff.record_disconnected();
        assert_eq!(delay, Duration::from_millis(400));
    }
}
