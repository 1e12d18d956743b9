//! Port for the read-through availability cache.
//!
//! The cache is a disposable shadow of the persisted store: adapters may
//! fail, and callers treat any error as a miss. Correctness never depends
//! on a cache hit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::slots::{AssembledSlot, SlotSettings};

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by cache adapters.
    pub enum CacheError {
        /// The cache backend could not be reached or rejected the operation.
        Unavailable { message: String } => "cache unavailable: {message}",
    }
}

/// Default time-to-live for a cached day of slots.
pub const DAY_TTL: Duration = Duration::from_secs(300);

/// Default time-to-live for the cached settings record.
pub const SETTINGS_TTL: Duration = Duration::from_secs(600);

/// Default time-to-live for the cached bookings listing.
pub const BOOKINGS_TTL: Duration = Duration::from_secs(300);

/// Port for caching assembled days, the settings blob and booking listings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    /// Fetch a cached day of assembled slots.
    async fn get_day(&self, date: NaiveDate) -> Result<Option<Vec<AssembledSlot>>, CacheError>;

    /// Store a day of assembled slots.
    async fn put_day(
        &self,
        date: NaiveDate,
        slots: &[AssembledSlot],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop the cached entry for one date.
    async fn invalidate_day(&self, date: NaiveDate) -> Result<(), CacheError>;

    /// Fetch the cached settings record.
    async fn get_settings(&self) -> Result<Option<SlotSettings>, CacheError>;

    /// Store the settings record.
    async fn put_settings(&self, settings: &SlotSettings, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the cached serialised bookings listing.
    async fn get_bookings(&self) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store the serialised bookings listing.
    async fn put_bookings(
        &self,
        bookings: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop the cached bookings listing.
    async fn invalidate_bookings(&self) -> Result<(), CacheError>;

    /// Drop every cached entry (bulk settings changes).
    async fn invalidate_all(&self) -> Result<(), CacheError>;
}

/// Cache implementation that never hits; used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl AvailabilityCache for NoopCache {
    async fn get_day(&self, _date: NaiveDate) -> Result<Option<Vec<AssembledSlot>>, CacheError> {
        Ok(None)
    }

    async fn put_day(
        &self,
        _date: NaiveDate,
        _slots: &[AssembledSlot],
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_day(&self, _date: NaiveDate) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<SlotSettings>, CacheError> {
        Ok(None)
    }

    async fn put_settings(
        &self,
        _settings: &SlotSettings,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get_bookings(&self) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(None)
    }

    async fn put_bookings(
        &self,
        _bookings: &serde_json::Value,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_bookings(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopCache;
        let date = NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date");
        assert!(cache.get_day(date).await.expect("get succeeds").is_none());
        assert!(cache.get_settings().await.expect("get succeeds").is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn noop_cache_accepts_writes() {
        let cache = NoopCache;
        let date = NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date");
        cache
            .put_day(date, &[], DAY_TTL)
            .await
            .expect("put succeeds");
        cache.invalidate_all().await.expect("reset succeeds");
    }
}
