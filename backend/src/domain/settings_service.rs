//! Slot settings service.
//!
//! Owns the singleton configuration record: reads go through the cache with
//! the store as authority, and every admin write persists first, then
//! refreshes the cached copy and busts all cached availability.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::money::Money;
use crate::domain::ports::{
    AvailabilityCache, SettingsStore, SettingsStoreError, SlotStore, SlotStoreError,
    TemplateSyncOutcome, SETTINGS_TTL,
};
use crate::domain::slots::{SettingsPatch, SlotSettings, SlotTime};
use crate::domain::Error;

/// Which layer a scoped amount update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountScope {
    /// The default amount applied when no override matches.
    Global,
    /// The per-time override for one template time.
    Time(SlotTime),
    /// The per-date override for one date.
    Date(NaiveDate),
}

fn map_store_error(error: SettingsStoreError) -> Error {
    match error {
        SettingsStoreError::Connection { message } => {
            Error::service_unavailable(format!("settings store unavailable: {message}"))
        }
        SettingsStoreError::Query { message } => {
            Error::internal(format!("settings store error: {message}"))
        }
    }
}

fn map_slot_store_error(error: SlotStoreError) -> Error {
    match error {
        SlotStoreError::Connection { message } => {
            Error::service_unavailable(format!("slot store unavailable: {message}"))
        }
        other => Error::internal(format!("slot store error: {other}")),
    }
}

/// Service owning reads and admin writes of the settings record.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    slots: Arc<dyn SlotStore>,
    cache: Arc<dyn AvailabilityCache>,
}

impl SettingsService {
    /// Create the service over its store, slot store and cache.
    pub fn new(
        store: Arc<dyn SettingsStore>,
        slots: Arc<dyn SlotStore>,
        cache: Arc<dyn AvailabilityCache>,
    ) -> Self {
        Self {
            store,
            slots,
            cache,
        }
    }

    /// The effective settings record.
    ///
    /// Cache first, then the store; a store without a record yet gets the
    /// defaults persisted so later admin edits patch a real row.
    pub async fn effective(&self) -> Result<SlotSettings, Error> {
        match self.cache.get_settings().await {
            Ok(Some(settings)) => return Ok(settings),
            Ok(None) => {}
            Err(error) => warn!(%error, "settings cache read failed; falling through"),
        }

        let settings = match self.store.load().await.map_err(map_store_error)? {
            Some(settings) => settings,
            None => {
                let defaults = SlotSettings::default();
                self.store.save(&defaults).await.map_err(map_store_error)?;
                defaults
            }
        };

        if let Err(error) = self.cache.put_settings(&settings, SETTINGS_TTL).await {
            warn!(%error, "settings cache write failed");
        }
        Ok(settings)
    }

    /// Merge a partial update into the settings record.
    ///
    /// Persists, refreshes the cached copy, busts all cached availability
    /// and, when the day template changed, reconciles materialised slot
    /// rows with the new template.
    pub async fn update(&self, patch: SettingsPatch) -> Result<SlotSettings, Error> {
        let template_changed = patch.changes_template();
        let settings = self
            .mutate(move |settings| settings.apply(patch))
            .await?;

        if template_changed {
            let outcome = self
                .slots
                .sync_template(&settings.slots_per_day, settings.default_amount)
                .await
                .map_err(map_slot_store_error)?;
            log_sync(outcome);
        }
        Ok(settings)
    }

    /// Record a per-time activity toggle.
    pub async fn toggle_time(
        &self,
        time: SlotTime,
        is_active: bool,
    ) -> Result<SlotSettings, Error> {
        self.mutate(move |settings| settings.toggle_time(time, is_active))
            .await
    }

    /// Update an amount at one of the three override layers.
    pub async fn set_amount(
        &self,
        scope: AmountScope,
        amount: Money,
    ) -> Result<SlotSettings, Error> {
        self.mutate(move |settings| match scope {
            AmountScope::Global => settings.default_amount = amount,
            AmountScope::Time(time) => settings.set_time_amount(time, amount),
            AmountScope::Date(date) => settings.set_date_amount(date, amount),
        })
        .await
    }

    /// Add a time to the day template and create matching rows for
    /// materialised dates.
    pub async fn add_template_time(&self, time: SlotTime) -> Result<SlotSettings, Error> {
        let settings = self
            .mutate(move |settings| settings.add_template_time(time))
            .await?;
        let outcome = self
            .slots
            .sync_template(&settings.slots_per_day, settings.default_amount)
            .await
            .map_err(map_slot_store_error)?;
        log_sync(outcome);
        Ok(settings)
    }

    /// Remove a time from the day template and delete its unbooked rows.
    pub async fn remove_template_time(&self, time: SlotTime) -> Result<SlotSettings, Error> {
        let settings = self
            .mutate(move |settings| settings.remove_template_time(time))
            .await?;
        let outcome = self
            .slots
            .sync_template(&settings.slots_per_day, settings.default_amount)
            .await
            .map_err(map_slot_store_error)?;
        log_sync(outcome);
        Ok(settings)
    }

    /// Load-mutate-save with the cache refresh every write shares.
    async fn mutate(
        &self,
        apply: impl FnOnce(&mut SlotSettings),
    ) -> Result<SlotSettings, Error> {
        let mut settings = self
            .store
            .load()
            .await
            .map_err(map_store_error)?
            .unwrap_or_default();
        apply(&mut settings);
        self.store.save(&settings).await.map_err(map_store_error)?;

        if let Err(error) = self.cache.invalidate_all().await {
            warn!(%error, "cache reset after settings write failed");
        }
        if let Err(error) = self.cache.put_settings(&settings, SETTINGS_TTL).await {
            warn!(%error, "settings cache refresh failed");
        }
        Ok(settings)
    }
}

fn log_sync(outcome: TemplateSyncOutcome) {
    if outcome.created > 0 || outcome.deleted > 0 {
        tracing::info!(
            created = outcome.created,
            deleted = outcome.deleted,
            "slot rows reconciled with day template"
        );
    }
}
