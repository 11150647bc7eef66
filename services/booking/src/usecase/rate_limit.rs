use tracing::warn;

use crate::domain::repository::CounterStore;
use crate::error::BookingServiceError;

/// Window shared by every rate class, in seconds.
pub const RATE_WINDOW_SECS: u64 = 60;

/// Operation classes with their own counters and caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    /// Public cancel/reschedule endpoints.
    PublicAction,
    /// Third-party webhook receivers.
    Webhook,
}

impl RateClass {
    pub fn cap(self) -> u64 {
        match self {
            Self::PublicAction => 10,
            Self::Webhook => 60,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::PublicAction => "api_action",
            Self::Webhook => "webhook",
        }
    }

    pub fn key(self, ip: &str) -> String {
        format!("ratelimit:{}:{ip}", self.prefix())
    }
}

pub struct RateLimiter<K: CounterStore> {
    pub counters: K,
}

impl<K: CounterStore> RateLimiter<K> {
    /// Count this request and reject it once the class cap is exceeded.
    ///
    /// The limiter fails open: a counter outage lets the request through.
    pub async fn check(&self, class: RateClass, ip: &str) -> Result<(), BookingServiceError> {
        let count = match self.counters.hit(&class.key(ip), RATE_WINDOW_SECS).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, ip = %ip, "rate limit counter unavailable");
                return Ok(());
            }
        };
        if count > class.cap() {
            warn!(ip = %ip, class = ?class, count, "rate limit exceeded");
            return Err(BookingServiceError::RateLimited);
        }
        Ok(())
    }
}
