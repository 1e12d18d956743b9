//! PostgreSQL-backed `SlotStore` implementation using Diesel.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{SlotPatch, SlotStore, SlotStoreError, TemplateSyncOutcome};
use crate::domain::slots::{SlotRecord, SlotStatus, SlotTime};
use crate::domain::Money;

use super::error_mapping::{is_unique_violation, map_diesel_error, map_pool_error};
use super::models::{NewSlotRow, SlotRow};
use super::pool::{DbPool, PoolError};
use super::schema::slots;

/// Diesel-backed implementation of the slot store port.
#[derive(Clone)]
pub struct DieselSlotStore {
    pool: DbPool,
}

impl DieselSlotStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool(error: PoolError) -> SlotStoreError {
    map_pool_error(error, SlotStoreError::connection)
}

fn map_diesel(error: diesel::result::Error) -> SlotStoreError {
    map_diesel_error(error, SlotStoreError::query, SlotStoreError::connection)
}

/// Convert a database row into a validated domain slot record.
pub(super) fn row_to_record(row: SlotRow) -> Result<SlotRecord, SlotStoreError> {
    let start_time: SlotTime = row
        .start_time
        .parse()
        .map_err(|err| SlotStoreError::query(format!("decode start_time: {err}")))?;
    let end_time: SlotTime = row
        .end_time
        .parse()
        .map_err(|err| SlotStoreError::query(format!("decode end_time: {err}")))?;
    let status: SlotStatus = row
        .status
        .parse()
        .map_err(|err| SlotStoreError::query(format!("decode status: {err}")))?;
    Ok(SlotRecord {
        id: row.id,
        date: row.date,
        start_time,
        end_time,
        amount: Money::new(row.amount),
        status,
        is_active: row.is_active,
        booking_id: row.booking_id,
        booked_by: row.booked_by,
        pending_expires_at: row.pending_expires_at,
    })
}

pub(super) fn record_to_insert(record: &SlotRecord) -> NewSlotRow {
    NewSlotRow {
        id: record.id,
        date: record.date,
        start_time: record.start_time.to_string(),
        end_time: record.end_time.to_string(),
        amount: record.amount.major_units(),
        status: record.status.as_str().to_owned(),
        is_active: record.is_active,
        booking_id: record.booking_id,
        booked_by: record.booked_by,
        pending_expires_at: record.pending_expires_at,
    }
}

#[async_trait]
impl SlotStore for DieselSlotStore {
    async fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<SlotRecord>, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let rows: Vec<SlotRow> = slots::table
            .filter(slots::date.eq(date))
            .order(slots::start_time.asc())
            .select(SlotRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn find_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<SlotRecord>, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let row = slots::table
            .filter(slots::date.eq(date))
            .filter(slots::start_time.eq(time.to_string()))
            .select(SlotRow::as_select())
            .first::<SlotRow>(&mut conn)
            .await
            .optional()
            .map_err(map_diesel)?;
        row.map(row_to_record).transpose()
    }

    async fn create_slot(&self, record: SlotRecord) -> Result<SlotRecord, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let insert = record_to_insert(&record);
        diesel::insert_into(slots::table)
            .values(&insert)
            .execute(&mut conn)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    SlotStoreError::AlreadyExists {
                        date: record.date,
                        time: record.start_time,
                    }
                } else {
                    map_diesel(error)
                }
            })?;
        Ok(record)
    }

    async fn update_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let target = slots::table
            .filter(slots::date.eq(date))
            .filter(slots::start_time.eq(time.to_string()));

        let row: SlotRow = diesel::update(target)
            .set((
                patch
                    .amount
                    .map(|amount| slots::amount.eq(amount.major_units())),
                patch.is_active.map(|flag| slots::is_active.eq(flag)),
                patch
                    .status
                    .map(|status| slots::status.eq(status.as_str().to_owned())),
                slots::updated_at.eq(Utc::now()),
            ))
            .returning(SlotRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|error| match error {
                diesel::result::Error::NotFound => SlotStoreError::NotFound { date, time },
                other => map_diesel(other),
            })?;
        row_to_record(row)
    }

    async fn delete_slot(&self, date: NaiveDate, time: SlotTime) -> Result<(), SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let deleted = diesel::delete(
            slots::table
                .filter(slots::date.eq(date))
                .filter(slots::start_time.eq(time.to_string())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel)?;
        if deleted == 0 {
            return Err(SlotStoreError::NotFound { date, time });
        }
        Ok(())
    }

    async fn slots_for_user(&self, user_id: Uuid) -> Result<Vec<SlotRecord>, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let rows: Vec<SlotRow> = slots::table
            .filter(slots::booked_by.eq(user_id))
            .order((slots::date.desc(), slots::start_time.asc()))
            .select(SlotRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel)?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn sync_template(
        &self,
        template: &[SlotTime],
        default_amount: Money,
    ) -> Result<TemplateSyncOutcome, SlotStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool)?;
        let template_strings: Vec<String> = template.iter().map(ToString::to_string).collect();
        let template: Vec<SlotTime> = template.to_vec();

        conn.transaction::<TemplateSyncOutcome, diesel::result::Error, _>(|conn| {
            async move {
                let dates: Vec<NaiveDate> = slots::table
                    .select(slots::date)
                    .distinct()
                    .load(conn)
                    .await?;

                let mut outcome = TemplateSyncOutcome::default();
                for date in dates {
                    let existing: Vec<String> = slots::table
                        .filter(slots::date.eq(date))
                        .select(slots::start_time)
                        .load(conn)
                        .await?;

                    for time in &template {
                        if !existing.contains(&time.to_string()) {
                            let insert = NewSlotRow {
                                id: Uuid::new_v4(),
                                date,
                                start_time: time.to_string(),
                                end_time: time.end_time().to_string(),
                                amount: default_amount.major_units(),
                                status: SlotStatus::Available.as_str().to_owned(),
                                is_active: true,
                                booking_id: None,
                                booked_by: None,
                                pending_expires_at: None,
                            };
                            diesel::insert_into(slots::table)
                                .values(&insert)
                                .execute(conn)
                                .await?;
                            outcome.created += 1;
                        }
                    }

                    // Booked rows survive template removal.
                    outcome.deleted += diesel::delete(
                        slots::table
                            .filter(slots::date.eq(date))
                            .filter(slots::start_time.ne_all(template_strings.clone()))
                            .filter(slots::status.ne(SlotStatus::Booked.as_str())),
                    )
                    .execute(conn)
                    .await?;
                }
                Ok(outcome)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel)
    }
}
