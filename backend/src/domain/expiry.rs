//! Periodic reclaim of lapsed reservation holds.
//!
//! Runs on a timer in its own task and talks to the store only through the
//! same transactional ledger operations request handlers use; per sweep it
//! issues one short-lived update so it never blocks reservation or
//! verification traffic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{AvailabilityCache, BookingLedger, LedgerError, ReclaimOutcome};
use crate::domain::Error;

/// Default sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Async sleep abstraction so tests can drive sweeps directly.
#[async_trait]
pub trait ReclaimSleeper: Send + Sync {
    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl ReclaimSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

fn map_ledger_error(error: LedgerError) -> Error {
    match error {
        LedgerError::Connection { message } => {
            Error::service_unavailable(format!("booking ledger unavailable: {message}"))
        }
        LedgerError::Query { message } => {
            Error::internal(format!("booking ledger error: {message}"))
        }
    }
}

/// The expiry sweep worker.
#[derive(Clone)]
pub struct ExpiryReclaimer {
    ledger: Arc<dyn BookingLedger>,
    cache: Arc<dyn AvailabilityCache>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn ReclaimSleeper>,
    interval: Duration,
}

impl ExpiryReclaimer {
    /// Create a reclaimer sweeping at the default interval.
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        cache: Arc<dyn AvailabilityCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_runtime(
            ledger,
            cache,
            clock,
            Arc::new(TokioSleeper),
            DEFAULT_SWEEP_INTERVAL,
        )
    }

    /// Create a reclaimer with explicit sleeper and interval.
    pub fn with_runtime(
        ledger: Arc<dyn BookingLedger>,
        cache: Arc<dyn AvailabilityCache>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn ReclaimSleeper>,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            cache,
            clock,
            sleeper,
            interval,
        }
    }

    /// Run sweeps forever; intended to be spawned on its own task.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "expiry reclaimer started");
        loop {
            self.sleeper.sleep(self.interval).await;
            if let Err(error) = self.sweep().await {
                warn!(%error, "expiry sweep failed");
            }
        }
    }

    /// One sweep: release lapsed holds and fail their bookings.
    pub async fn sweep(&self) -> Result<ReclaimOutcome, Error> {
        let outcome = self
            .ledger
            .release_expired(self.clock.utc())
            .await
            .map_err(map_ledger_error)?;

        if outcome.released_slots > 0 {
            info!(
                released = outcome.released_slots,
                expired_bookings = outcome.expired_bookings,
                "reclaimed lapsed reservation holds"
            );
            for date in &outcome.dates {
                if let Err(error) = self.cache.invalidate_day(*date).await {
                    warn!(%date, %error, "cache invalidation after reclaim failed");
                }
            }
            if let Err(error) = self.cache.invalidate_bookings().await {
                warn!(%error, "bookings cache invalidation after reclaim failed");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockable::DefaultClock;
    use rstest::rstest;

    use crate::domain::ports::{MockAvailabilityCache, MockBookingLedger};

    #[rstest]
    #[tokio::test]
    async fn sweep_invalidates_affected_dates() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date");
        let mut ledger = MockBookingLedger::new();
        ledger.expect_release_expired().returning(move |_| {
            Ok(ReclaimOutcome {
                released_slots: 2,
                expired_bookings: 1,
                dates: vec![date],
            })
        });
        let mut cache = MockAvailabilityCache::new();
        cache
            .expect_invalidate_day()
            .times(1)
            .returning(|_| Ok(()));
        cache
            .expect_invalidate_bookings()
            .times(1)
            .returning(|| Ok(()));

        let reclaimer = ExpiryReclaimer::new(
            Arc::new(ledger),
            Arc::new(cache),
            Arc::new(DefaultClock),
        );
        let outcome = reclaimer.sweep().await.expect("sweep succeeds");
        assert_eq!(outcome.released_slots, 2);
        assert_eq!(outcome.expired_bookings, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn idle_sweep_touches_nothing() {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_release_expired()
            .returning(|_| Ok(ReclaimOutcome::default()));
        let mut cache = MockAvailabilityCache::new();
        cache.expect_invalidate_day().times(0);
        cache.expect_invalidate_bookings().times(0);

        let reclaimer = ExpiryReclaimer::new(
            Arc::new(ledger),
            Arc::new(cache),
            Arc::new(DefaultClock),
        );
        let outcome = reclaimer.sweep().await.expect("sweep succeeds");
        assert_eq!(outcome, ReclaimOutcome::default());
    }

    #[rstest]
    #[tokio::test]
    async fn ledger_outage_surfaces_as_error() {
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_release_expired()
            .returning(|_| Err(LedgerError::connection("refused")));
        let reclaimer = ExpiryReclaimer::new(
            Arc::new(ledger),
            Arc::new(MockAvailabilityCache::new()),
            Arc::new(DefaultClock),
        );
        assert!(reclaimer.sweep().await.is_err());
    }
}
