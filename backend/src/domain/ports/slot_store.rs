//! Port for slot row persistence outside the reservation path.
//!
//! Reservation and confirmation mutate slots only through the transactional
//! [`super::BookingLedger`] operations; this port covers per-date reads and
//! the admin editing surface.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::slots::{SlotRecord, SlotStatus, SlotTime};

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by slot store adapters.
    pub enum SlotStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "slot store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "slot store query failed: {message}",
        /// A slot already exists for the requested date and time.
        AlreadyExists { date: NaiveDate, time: SlotTime } =>
            "slot already exists for {date} {time}",
        /// No slot exists for the requested date and time.
        NotFound { date: NaiveDate, time: SlotTime } =>
            "no slot for {date} {time}",
    }
}

/// Field updates applied to a slot by admin editing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotPatch {
    /// New price, if provided.
    pub amount: Option<Money>,
    /// New activity flag, if provided.
    pub is_active: Option<bool>,
    /// New status, if provided.
    pub status: Option<SlotStatus>,
}

/// Outcome of a template sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateSyncOutcome {
    /// Rows created for template times missing on materialised dates.
    pub created: usize,
    /// Rows deleted for times removed from the template.
    pub deleted: usize,
}

/// Port for reading and editing slot rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// All persisted rows for a date, unordered.
    async fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<SlotRecord>, SlotStoreError>;

    /// One persisted row, if present.
    async fn find_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<SlotRecord>, SlotStoreError>;

    /// Insert a new row; fails when the (date, time) pair already exists.
    async fn create_slot(&self, record: SlotRecord) -> Result<SlotRecord, SlotStoreError>;

    /// Apply a patch to an existing row.
    async fn update_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, SlotStoreError>;

    /// Delete a row.
    async fn delete_slot(&self, date: NaiveDate, time: SlotTime) -> Result<(), SlotStoreError>;

    /// All slot rows held or owned by a user, newest date first.
    async fn slots_for_user(&self, user_id: Uuid) -> Result<Vec<SlotRecord>, SlotStoreError>;

    /// Reconcile materialised dates with a new day template: create missing
    /// rows at the default amount and delete rows for removed times, never
    /// touching booked rows.
    async fn sync_template(
        &self,
        template: &[SlotTime],
        default_amount: Money,
    ) -> Result<TemplateSyncOutcome, SlotStoreError>;
}
