use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tokio::time::Instant;

#[inline]
pub fn get_duration_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO)
}

/// Absolute point in time an operation must finish by.
///
/// Built on `tokio::time::Instant` so paused-clock tests drive it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires_at: Instant,
}

/// Roughly 30 years; stands in for deadlines the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

impl Deadline {
    /// Saturates to a far-future instant when `timeout` overflows the clock.
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        let expires_at = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        Self { started, expires_at }
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The shorter of `limit` and the time left.
    pub fn cap(
        &self,
        limit: Duration,
    ) -> Duration {
        limit.min(self.remaining())
    }
}
