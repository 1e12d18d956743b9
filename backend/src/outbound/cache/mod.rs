//! Redis-backed availability cache adapter.
//!
//! Uses `bb8-redis` for connection pooling and JSON for values. Bulk
//! invalidation is a namespace version counter: every key embeds the current
//! version, and `invalidate_all` bumps the counter so all previous entries
//! become unreachable and age out through their TTLs.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use bb8_redis::{bb8, RedisConnectionManager};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::ports::{AvailabilityCache, CacheError};
use crate::domain::slots::{AssembledSlot, SlotSettings};

const VERSION_KEY: &str = "cache:version";

fn map_redis_error(error: bb8_redis::redis::RedisError) -> CacheError {
    CacheError::unavailable(error.to_string())
}

fn map_pool_error(error: bb8::RunError<bb8_redis::redis::RedisError>) -> CacheError {
    CacheError::unavailable(error.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|err| CacheError::unavailable(err.to_string()))
}

/// Redis-backed implementation of the availability cache port.
#[derive(Clone)]
pub struct RedisAvailabilityCache {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisAvailabilityCache {
    /// Connect to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the URL is invalid or the
    /// pool cannot be built.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(url).map_err(map_redis_error)?;
        let pool = bb8::Pool::builder()
            .build(manager)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { pool })
    }

    async fn version(&self) -> Result<i64, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let version: Option<i64> = conn.get(VERSION_KEY).await.map_err(map_redis_error)?;
        Ok(version.unwrap_or(1))
    }

    async fn get_json<T: DeserializeOwned>(&self, key: String) -> Result<Option<T>, CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let raw: Option<String> = conn.get(&key).await.map_err(map_redis_error)?;
        match raw {
            // An undecodable entry is a miss, not a failure; the caller
            // will repopulate it.
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize>(
        &self,
        key: String,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let encoded = encode(value)?;
        conn.set_ex::<_, _, ()>(&key, encoded, ttl.as_secs().max(1))
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, key: String) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.del::<_, ()>(&key).await.map_err(map_redis_error)
    }

    async fn day_key(&self, date: NaiveDate) -> Result<String, CacheError> {
        Ok(format!("slots:v{}:{date}", self.version().await?))
    }

    async fn settings_key(&self) -> Result<String, CacheError> {
        Ok(format!("settings:v{}", self.version().await?))
    }

    async fn bookings_key(&self) -> Result<String, CacheError> {
        Ok(format!("bookings:v{}", self.version().await?))
    }
}

#[async_trait]
impl AvailabilityCache for RedisAvailabilityCache {
    async fn get_day(&self, date: NaiveDate) -> Result<Option<Vec<AssembledSlot>>, CacheError> {
        let key = self.day_key(date).await?;
        self.get_json(key).await
    }

    async fn put_day(
        &self,
        date: NaiveDate,
        slots: &[AssembledSlot],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.day_key(date).await?;
        self.put_json(key, &slots, ttl).await
    }

    async fn invalidate_day(&self, date: NaiveDate) -> Result<(), CacheError> {
        let key = self.day_key(date).await?;
        self.delete(key).await
    }

    async fn get_settings(&self) -> Result<Option<SlotSettings>, CacheError> {
        let key = self.settings_key().await?;
        self.get_json(key).await
    }

    async fn put_settings(&self, settings: &SlotSettings, ttl: Duration) -> Result<(), CacheError> {
        let key = self.settings_key().await?;
        self.put_json(key, settings, ttl).await
    }

    async fn get_bookings(&self) -> Result<Option<serde_json::Value>, CacheError> {
        let key = self.bookings_key().await?;
        self.get_json(key).await
    }

    async fn put_bookings(
        &self,
        bookings: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.bookings_key().await?;
        self.put_json(key, bookings, ttl).await
    }

    async fn invalidate_bookings(&self) -> Result<(), CacheError> {
        let key = self.bookings_key().await?;
        self.delete(key).await
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.incr::<_, _, i64>(VERSION_KEY, 1)
            .await
            .map(|_| ())
            .map_err(map_redis_error)
    }
}
