//! Admin editing of individual slot rows.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::domain::ports::{
    AvailabilityCache, SlotPatch, SlotStore, SlotStoreError,
};
use crate::domain::settings_service::SettingsService;
use crate::domain::slots::{virtual_slot_for, SlotRecord, SlotStatus, SlotTime};
use crate::domain::Error;

fn map_store_error(error: SlotStoreError) -> Error {
    match error {
        SlotStoreError::Connection { message } => {
            Error::service_unavailable(format!("slot store unavailable: {message}"))
        }
        SlotStoreError::AlreadyExists { date, time } => {
            Error::conflict(format!("Slot already exists for {date} {time}"))
        }
        SlotStoreError::NotFound { date, time } => {
            Error::not_found(format!("No slot for {date} {time}"))
        }
        SlotStoreError::Query { message } => {
            Error::internal(format!("slot store error: {message}"))
        }
    }
}

/// Admin surface for creating, editing and deleting slot rows.
///
/// Booked rows are immutable here; releasing one goes through the
/// cancellation path so the owning booking is handled consistently.
#[derive(Clone)]
pub struct SlotAdminService {
    slots: Arc<dyn SlotStore>,
    settings: Arc<SettingsService>,
    cache: Arc<dyn AvailabilityCache>,
}

impl SlotAdminService {
    /// Create the service over the slot store, settings and cache.
    pub fn new(
        slots: Arc<dyn SlotStore>,
        settings: Arc<SettingsService>,
        cache: Arc<dyn AvailabilityCache>,
    ) -> Self {
        Self {
            slots,
            settings,
            cache,
        }
    }

    /// Apply a patch to a slot, materialising the row if needed.
    pub async fn update_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, Error> {
        let existing = self
            .slots
            .find_slot(date, time)
            .await
            .map_err(map_store_error)?;

        let record = match existing {
            None => {
                let record = self.materialise(date, time, patch).await?;
                self.slots
                    .create_slot(record)
                    .await
                    .map_err(map_store_error)?
            }
            Some(slot) if slot.status == SlotStatus::Booked => {
                return Err(Error::forbidden("Cannot modify a booked slot"));
            }
            Some(slot) => {
                if let Some(next) = patch.status {
                    if next != slot.status && !slot.status.can_transition_to(next) {
                        return Err(Error::invalid_request(format!(
                            "Slot cannot move from {} to {next}",
                            slot.status
                        )));
                    }
                }
                self.slots
                    .update_slot(date, time, patch)
                    .await
                    .map_err(map_store_error)?
            }
        };

        self.invalidate(date).await;
        Ok(record)
    }

    /// Toggle a slot's activity flag, materialising the row if needed.
    pub async fn toggle_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        is_active: bool,
    ) -> Result<SlotRecord, Error> {
        self.update_slot(
            date,
            time,
            SlotPatch {
                is_active: Some(is_active),
                ..SlotPatch::default()
            },
        )
        .await
    }

    /// Create a slot row explicitly; fails if one already exists.
    pub async fn create_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, Error> {
        let record = self.materialise(date, time, patch).await?;
        let record = self
            .slots
            .create_slot(record)
            .await
            .map_err(map_store_error)?;
        self.invalidate(date).await;
        Ok(record)
    }

    /// Delete a slot row; booked rows are refused.
    pub async fn delete_slot(&self, date: NaiveDate, time: SlotTime) -> Result<(), Error> {
        let slot = self
            .slots
            .find_slot(date, time)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("No slot for {date} {time}")))?;
        if slot.status == SlotStatus::Booked {
            return Err(Error::forbidden("Cannot delete a booked slot"));
        }
        self.slots
            .delete_slot(date, time)
            .await
            .map_err(map_store_error)?;
        self.invalidate(date).await;
        Ok(())
    }

    /// Build a fresh row from the effective template plus the patch.
    async fn materialise(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, Error> {
        let settings = self.settings.effective().await?;
        let template = virtual_slot_for(date, time, &settings);
        Ok(SlotRecord {
            id: Uuid::new_v4(),
            date,
            start_time: time,
            end_time: time.end_time(),
            amount: patch.amount.unwrap_or(template.amount),
            status: patch.status.unwrap_or(SlotStatus::Available),
            is_active: patch.is_active.unwrap_or(template.is_active),
            booking_id: None,
            booked_by: None,
            pending_expires_at: None,
        })
    }

    async fn invalidate(&self, date: NaiveDate) {
        if let Err(error) = self.cache.invalidate_day(date).await {
            warn!(%date, %error, "cache invalidation after slot edit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use crate::domain::money::Money;
    use crate::domain::ports::{
        MockAvailabilityCache, MockSettingsStore, MockSlotStore,
    };
    use crate::domain::slots::SlotSettings;
    use crate::domain::ErrorCode;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date")
    }

    fn time(raw: &str) -> SlotTime {
        SlotTime::parse(raw).expect("valid time")
    }

    fn record(status: SlotStatus) -> SlotRecord {
        SlotRecord {
            id: Uuid::new_v4(),
            date: date(),
            start_time: time("09:00"),
            end_time: time("10:00"),
            amount: Money::new(20000),
            status,
            is_active: true,
            booking_id: None,
            booked_by: None,
            pending_expires_at: None,
        }
    }

    fn settings_service() -> Arc<SettingsService> {
        let mut store = MockSettingsStore::new();
        store
            .expect_load()
            .returning(|| Ok(Some(SlotSettings::default())));
        let mut cache = MockAvailabilityCache::new();
        cache.expect_get_settings().returning(|| Ok(None));
        cache.expect_put_settings().returning(|_, _| Ok(()));
        Arc::new(SettingsService::new(
            Arc::new(store),
            Arc::new(MockSlotStore::new()),
            Arc::new(cache),
        ))
    }

    fn quiet_cache() -> MockAvailabilityCache {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_invalidate_day().returning(|_| Ok(()));
        cache
    }

    fn service(slots: MockSlotStore, cache: MockAvailabilityCache) -> SlotAdminService {
        SlotAdminService::new(Arc::new(slots), settings_service(), Arc::new(cache))
    }

    #[rstest]
    #[tokio::test]
    async fn update_materialises_missing_rows_from_the_template() {
        let mut slots = MockSlotStore::new();
        slots.expect_find_slot().returning(|_, _| Ok(None));
        slots
            .expect_create_slot()
            .withf(|record| {
                record.amount == Money::new(20000) && record.end_time == time("10:00")
            })
            .returning(Ok);

        let service = service(slots, quiet_cache());
        let record = service
            .update_slot(date(), time("09:00"), SlotPatch::default())
            .await
            .expect("row materialised");
        assert_eq!(record.status, SlotStatus::Available);
    }

    #[rstest]
    #[tokio::test]
    async fn update_refuses_booked_slots() {
        let mut slots = MockSlotStore::new();
        slots
            .expect_find_slot()
            .returning(|_, _| Ok(Some(record(SlotStatus::Booked))));
        slots.expect_update_slot().times(0);

        let service = service(slots, MockAvailabilityCache::new());
        let error = service
            .update_slot(
                date(),
                time("09:00"),
                SlotPatch {
                    amount: Some(Money::new(1)),
                    ..SlotPatch::default()
                },
            )
            .await
            .expect_err("booked slots immutable");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn update_rejects_illegal_status_transitions() {
        let mut slots = MockSlotStore::new();
        slots
            .expect_find_slot()
            .returning(|_, _| Ok(Some(record(SlotStatus::Available))));
        slots.expect_update_slot().times(0);

        let service = service(slots, MockAvailabilityCache::new());
        let error = service
            .update_slot(
                date(),
                time("09:00"),
                SlotPatch {
                    status: Some(SlotStatus::Booked),
                    ..SlotPatch::default()
                },
            )
            .await
            .expect_err("available cannot jump to booked");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn create_maps_existing_rows_to_conflict() {
        let mut slots = MockSlotStore::new();
        slots.expect_create_slot().returning(|record| {
            Err(SlotStoreError::AlreadyExists {
                date: record.date,
                time: record.start_time,
            })
        });

        let service = service(slots, MockAvailabilityCache::new());
        let error = service
            .create_slot(date(), time("09:00"), SlotPatch::default())
            .await
            .expect_err("existing row conflicts");
        assert_eq!(error.code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[tokio::test]
    async fn delete_refuses_booked_slots() {
        let mut slots = MockSlotStore::new();
        slots
            .expect_find_slot()
            .returning(|_, _| Ok(Some(record(SlotStatus::Booked))));
        slots.expect_delete_slot().times(0);

        let service = service(slots, MockAvailabilityCache::new());
        let error = service
            .delete_slot(date(), time("09:00"))
            .await
            .expect_err("booked slots undeletable");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn delete_invalidates_the_date() {
        let mut slots = MockSlotStore::new();
        slots
            .expect_find_slot()
            .returning(|_, _| Ok(Some(record(SlotStatus::Available))));
        slots.expect_delete_slot().returning(|_, _| Ok(()));
        let mut cache = MockAvailabilityCache::new();
        cache
            .expect_invalidate_day()
            .times(1)
            .returning(|_| Ok(()));

        let service = service(slots, cache);
        service
            .delete_slot(date(), time("09:00"))
            .await
            .expect("delete succeeds");
    }
}
