//! Row structs bridging Diesel and the domain types.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{bookings, slot_settings, slots};

/// A full slot row as read from the database.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = slots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SlotRow {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub amount: i64,
    pub status: String,
    pub is_active: bool,
    pub booking_id: Option<Uuid>,
    pub booked_by: Option<Uuid>,
    pub pending_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written when a slot row is created.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = slots)]
pub struct NewSlotRow {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub amount: i64,
    pub status: String,
    pub is_active: bool,
    pub booking_id: Option<Uuid>,
    pub booked_by: Option<Uuid>,
    pub pending_expires_at: Option<DateTime<Utc>>,
}

/// A full booking row as read from the database.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub slot_ids: Vec<Uuid>,
    pub total_amount: i64,
    pub status: String,
    pub payment_ref: Option<String>,
    pub payment_verified: bool,
    pub ticket_id: Option<String>,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written when a booking row is created.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBookingRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub slot_ids: Vec<Uuid>,
    pub total_amount: i64,
    pub status: String,
}

/// The settings singleton row as read from the database.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = slot_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SettingsRow {
    pub id: i16,
    pub global_enabled: bool,
    pub default_amount: i64,
    pub slots_per_day: serde_json::Value,
    pub slot_toggles: serde_json::Value,
    pub slot_amounts: serde_json::Value,
    pub date_overrides: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written when the settings singleton is saved.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = slot_settings)]
pub struct SettingsUpsert {
    pub id: i16,
    pub global_enabled: bool,
    pub default_amount: i64,
    pub slots_per_day: serde_json::Value,
    pub slot_toggles: serde_json::Value,
    pub slot_amounts: serde_json::Value,
    pub date_overrides: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
