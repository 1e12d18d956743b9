//! Availability queries: cache-backed day assembly.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::ports::{AvailabilityCache, SlotStore, SlotStoreError, DAY_TTL};
use crate::domain::settings_service::SettingsService;
use crate::domain::slots::{assemble, bookable, AssembledSlot};
use crate::domain::Error;

fn map_slot_store_error(error: SlotStoreError) -> Error {
    match error {
        SlotStoreError::Connection { message } => {
            Error::service_unavailable(format!("slot store unavailable: {message}"))
        }
        other => Error::internal(format!("slot store error: {other}")),
    }
}

/// Read side of the slot subsystem.
///
/// The cache is consulted first; on a miss the day is assembled from the
/// settings record and the date's persisted rows, then cached. A failing
/// cache only costs latency: the assembled result is identical either way.
#[derive(Clone)]
pub struct AvailabilityService {
    settings: Arc<SettingsService>,
    slots: Arc<dyn SlotStore>,
    cache: Arc<dyn AvailabilityCache>,
}

impl AvailabilityService {
    /// Create the service over the settings service, slot store and cache.
    pub fn new(
        settings: Arc<SettingsService>,
        slots: Arc<dyn SlotStore>,
        cache: Arc<dyn AvailabilityCache>,
    ) -> Self {
        Self {
            settings,
            slots,
            cache,
        }
    }

    /// The full ordered slot sequence for a date.
    pub async fn day(&self, date: NaiveDate) -> Result<Vec<AssembledSlot>, Error> {
        match self.cache.get_day(date).await {
            Ok(Some(slots)) => {
                debug!(%date, "availability cache hit");
                return Ok(slots);
            }
            Ok(None) => debug!(%date, "availability cache miss"),
            Err(error) => warn!(%date, %error, "availability cache read failed"),
        }

        let settings = self.settings.effective().await?;
        if !settings.global_enabled {
            // Global disable hides all slots for all dates; nothing to cache.
            warn!("global slot schedule disabled");
            return Ok(Vec::new());
        }

        let persisted = self
            .slots
            .slots_for_date(date)
            .await
            .map_err(map_slot_store_error)?;
        let assembled = assemble(date, &settings, &persisted);

        if let Err(error) = self.cache.put_day(date, &assembled, DAY_TTL).await {
            warn!(%date, %error, "availability cache write failed");
        }
        Ok(assembled)
    }

    /// Only the slots a client may book right now.
    pub async fn bookable_day(&self, date: NaiveDate) -> Result<Vec<AssembledSlot>, Error> {
        Ok(bookable(&self.day(date).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    use crate::domain::money::Money;
    use crate::domain::ports::{
        CacheError, MockAvailabilityCache, MockSettingsStore, MockSlotStore,
    };
    use crate::domain::slots::{SlotRecord, SlotSettings, SlotStatus, SlotTime};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date")
    }

    fn pending_record(start: &str) -> SlotRecord {
        let start_time = SlotTime::parse(start).expect("valid time");
        SlotRecord {
            id: Uuid::new_v4(),
            date: date(),
            start_time,
            end_time: start_time.end_time(),
            amount: Money::new(20000),
            status: SlotStatus::Pending,
            is_active: true,
            booking_id: Some(Uuid::new_v4()),
            booked_by: Some(Uuid::new_v4()),
            pending_expires_at: None,
        }
    }

    fn settings_service(settings: SlotSettings) -> Arc<SettingsService> {
        let mut store = MockSettingsStore::new();
        store.expect_load().returning(move || Ok(Some(settings.clone())));
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_settings().returning(|| Ok(None));
        cache.expect_put_settings().returning(|_, _| Ok(()));
        Arc::new(SettingsService::new(
            Arc::new(store),
            Arc::new(MockSlotStore::new()),
            Arc::new(cache),
        ))
    }

    #[rstest]
    #[tokio::test]
    async fn cache_hit_skips_assembly() {
        let mut cache = MockAvailabilityCache::new();
        cache
            .expect_get_day()
            .returning(|_| Ok(Some(Vec::new())));
        let mut slots = MockSlotStore::new();
        slots.expect_slots_for_date().times(0);

        let service = AvailabilityService::new(
            settings_service(SlotSettings::default()),
            Arc::new(slots),
            Arc::new(cache),
        );
        let day = service.day(date()).await.expect("query succeeds");
        assert!(day.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn cache_miss_assembles_and_populates() {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_day().returning(|_| Ok(None));
        cache.expect_put_day().times(1).returning(|_, _, _| Ok(()));
        let mut slots = MockSlotStore::new();
        slots
            .expect_slots_for_date()
            .returning(|_| Ok(vec![]));

        let service = AvailabilityService::new(
            settings_service(SlotSettings::default()),
            Arc::new(slots),
            Arc::new(cache),
        );
        let day = service.day(date()).await.expect("query succeeds");
        assert_eq!(day.len(), SlotSettings::default().slots_per_day.len());
    }

    #[rstest]
    #[tokio::test]
    async fn cache_failure_degrades_to_direct_assembly() {
        let mut cache = MockAvailabilityCache::new();
        cache
            .expect_get_day()
            .returning(|_| Err(CacheError::unavailable("redis down")));
        cache
            .expect_put_day()
            .returning(|_, _, _| Err(CacheError::unavailable("redis down")));
        let mut slots = MockSlotStore::new();
        slots.expect_slots_for_date().returning(|_| Ok(vec![]));

        let service = AvailabilityService::new(
            settings_service(SlotSettings::default()),
            Arc::new(slots),
            Arc::new(cache),
        );
        let day = service.day(date()).await.expect("assembly still answers");
        assert_eq!(day.len(), SlotSettings::default().slots_per_day.len());
    }

    #[rstest]
    #[tokio::test]
    async fn global_disable_returns_empty_without_caching() {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_day().returning(|_| Ok(None));
        cache.expect_put_day().times(0);
        let mut slots = MockSlotStore::new();
        slots.expect_slots_for_date().times(0);

        let disabled = SlotSettings {
            global_enabled: false,
            ..SlotSettings::default()
        };
        let service = AvailabilityService::new(
            settings_service(disabled),
            Arc::new(slots),
            Arc::new(cache),
        );
        let day = service.day(date()).await.expect("query succeeds");
        assert!(day.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn bookable_day_excludes_held_slots() {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_day().returning(|_| Ok(None));
        cache.expect_put_day().returning(|_, _, _| Ok(()));
        let mut slots = MockSlotStore::new();
        slots
            .expect_slots_for_date()
            .returning(|_| Ok(vec![pending_record("09:00")]));

        let service = AvailabilityService::new(
            settings_service(SlotSettings::default()),
            Arc::new(slots),
            Arc::new(cache),
        );
        let open = service.bookable_day(date()).await.expect("query succeeds");
        assert!(!open
            .iter()
            .any(|s| s.start_time == SlotTime::parse("09:00").expect("valid time")));
    }
}
