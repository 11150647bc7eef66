use deadpool_redis::Pool;
use deadpool_redis::redis::{AsyncCommands, RedisError};

use crate::domain::repository::{AvailabilityCache, CounterStore};
use crate::domain::types::Availability;
use crate::error::BookingServiceError;

fn redis_error(e: RedisError) -> BookingServiceError {
    BookingServiceError::Internal(e.into())
}

// ── Availability cache ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisAvailabilityCache {
    pub pool: Pool,
}

impl AvailabilityCache for RedisAvailabilityCache {
    async fn get(&self, key: &str) -> Result<Option<Availability>, BookingServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BookingServiceError::Internal(e.into()))?;
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| BookingServiceError::Internal(e.into()))?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| BookingServiceError::Internal(e.into()))
    }

    async fn set(
        &self,
        key: &str,
        value: &Availability,
        ttl_secs: u64,
    ) -> Result<(), BookingServiceError> {
        let json =
            serde_json::to_string(value).map_err(|e| BookingServiceError::Internal(e.into()))?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BookingServiceError::Internal(e.into()))?;
        let (): () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

// ── Fixed-window counters ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisCounterStore {
    pub pool: Pool,
}

impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<u64, BookingServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BookingServiceError::Internal(e.into()))?;
        let count: u64 = conn
            .incr(key, 1u64)
            .await
            .map_err(redis_error)?;
        // The first hit opens the window.
        if count == 1 {
            let (): () = conn
                .expire(key, window_secs as i64)
                .await
                .map_err(|e: deadpool_redis::redis::RedisError| {
                    BookingServiceError::Internal(e.into())
                })?;
        }
        Ok(count)
    }
}

// ── Liveness probe ───────────────────────────────────────────────────────────

pub async fn ping(pool: &Pool) -> Result<(), BookingServiceError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| BookingServiceError::Internal(e.into()))?;
    let _: String = deadpool_redis::redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| BookingServiceError::Internal(e.into()))?;
    Ok(())
}
