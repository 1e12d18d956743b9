//! PostgreSQL persistence adapters (Diesel).

mod diesel_booking_ledger;
mod diesel_settings_store;
mod diesel_slot_store;
mod error_mapping;
pub mod models;
mod pool;
pub mod schema;

pub use diesel_booking_ledger::DieselBookingLedger;
pub use diesel_settings_store::DieselSettingsStore;
pub use diesel_slot_store::DieselSlotStore;
pub use pool::{DbPool, PoolConfig, PoolError};
