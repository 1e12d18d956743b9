//! PostgreSQL-backed `SettingsStore` implementation using Diesel.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SettingsStore, SettingsStoreError};
use crate::domain::slots::SlotSettings;
use crate::domain::Money;

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{SettingsRow, SettingsUpsert};
use super::pool::{DbPool, PoolError};
use super::schema::slot_settings;

const SINGLETON_ID: i16 = 1;

/// Diesel-backed implementation of the settings store port.
#[derive(Clone)]
pub struct DieselSettingsStore {
    pool: DbPool,
}

impl DieselSettingsStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> SettingsStoreError {
    map_pool_error(error, SettingsStoreError::connection)
}

fn map_diesel(error: diesel::result::Error) -> SettingsStoreError {
    map_diesel_error(
        error,
        SettingsStoreError::query,
        SettingsStoreError::connection,
    )
}

fn decode_field<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, SettingsStoreError> {
    serde_json::from_value(value)
        .map_err(|err| SettingsStoreError::query(format!("decode {field}: {err}")))
}

fn encode_field<T: serde::Serialize>(
    value: &T,
    field: &str,
) -> Result<serde_json::Value, SettingsStoreError> {
    serde_json::to_value(value)
        .map_err(|err| SettingsStoreError::query(format!("encode {field}: {err}")))
}

fn row_to_settings(row: SettingsRow) -> Result<SlotSettings, SettingsStoreError> {
    Ok(SlotSettings {
        global_enabled: row.global_enabled,
        default_amount: Money::new(row.default_amount),
        slots_per_day: decode_field(row.slots_per_day, "slots_per_day")?,
        slot_toggles: decode_field(row.slot_toggles, "slot_toggles")?,
        slot_amounts: decode_field(row.slot_amounts, "slot_amounts")?,
        date_overrides: decode_field(row.date_overrides, "date_overrides")?,
    })
}

fn settings_to_upsert(settings: &SlotSettings) -> Result<SettingsUpsert, SettingsStoreError> {
    Ok(SettingsUpsert {
        id: SINGLETON_ID,
        global_enabled: settings.global_enabled,
        default_amount: settings.default_amount.major_units(),
        slots_per_day: encode_field(&settings.slots_per_day, "slots_per_day")?,
        slot_toggles: encode_field(&settings.slot_toggles, "slot_toggles")?,
        slot_amounts: encode_field(&settings.slot_amounts, "slot_amounts")?,
        date_overrides: encode_field(&settings.date_overrides, "date_overrides")?,
        updated_at: Utc::now(),
    })
}

#[async_trait]
impl SettingsStore for DieselSettingsStore {
    async fn load(&self) -> Result<Option<SlotSettings>, SettingsStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = slot_settings::table
            .filter(slot_settings::id.eq(SINGLETON_ID))
            .select(SettingsRow::as_select())
            .first::<SettingsRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;
        row.map(row_to_settings).transpose()
    }

    async fn save(&self, settings: &SlotSettings) -> Result<(), SettingsStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let upsert = settings_to_upsert(settings)?;
        diesel::insert_into(slot_settings::table)
            .values(&upsert)
            .on_conflict(slot_settings::id)
            .do_update()
            .set(&upsert)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel)
    }
}
