//! Shared harness wiring domain services over the in-memory adapters.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::DefaultClock;

use backend::domain::slots::{SlotSettings, SlotTime};
use backend::domain::{
    AvailabilityService, BookingsService, ExpiryReclaimer, PaymentService, ReservationService,
    SettingsService, SlotAdminService,
};
use backend::test_support::{
    MemoryBookingLedger, MemoryCache, MemorySettingsStore, MemorySlotStore, MemoryStore,
    RecordingMailer, ScriptedGateway,
};

/// Fully wired service stack over shared in-memory state.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub gateway: Arc<ScriptedGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub settings: Arc<SettingsService>,
    pub availability: Arc<AvailabilityService>,
    pub reservations: Arc<ReservationService>,
    pub payments: Arc<PaymentService>,
    pub bookings: Arc<BookingsService>,
    pub slot_admin: Arc<SlotAdminService>,
    pub reclaimer: ExpiryReclaimer,
}

/// Build the stack with the given reservation hold TTL in minutes.
///
/// A negative TTL writes holds that are already lapsed, which lets expiry
/// tests run against the real clock.
pub fn harness(hold_ttl_minutes: i64) -> Harness {
    let store = MemoryStore::new();
    let cache = Arc::new(MemoryCache::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let mailer = Arc::new(RecordingMailer::new());
    let clock = Arc::new(DefaultClock);

    let ledger = Arc::new(MemoryBookingLedger::new(store.clone()));
    let slot_store = Arc::new(MemorySlotStore::new(store.clone()));
    let settings_store = Arc::new(MemorySettingsStore::seeded(SlotSettings::default()));

    let settings = Arc::new(SettingsService::new(
        settings_store,
        slot_store.clone(),
        cache.clone(),
    ));
    let availability = Arc::new(AvailabilityService::new(
        settings.clone(),
        slot_store.clone(),
        cache.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        ledger.clone(),
        gateway.clone(),
        mailer.clone(),
        cache.clone(),
        clock.clone(),
    ));
    let reservations = Arc::new(ReservationService::with_hold_ttl(
        settings.clone(),
        ledger.clone(),
        cache.clone(),
        payments.clone(),
        clock.clone(),
        chrono::Duration::minutes(hold_ttl_minutes),
    ));
    let bookings = Arc::new(BookingsService::new(
        ledger.clone(),
        slot_store.clone(),
        cache.clone(),
    ));
    let slot_admin = Arc::new(SlotAdminService::new(
        slot_store,
        settings.clone(),
        cache.clone(),
    ));
    let reclaimer = ExpiryReclaimer::new(ledger, cache.clone(), clock);

    Harness {
        store,
        cache,
        gateway,
        mailer,
        settings,
        availability,
        reservations,
        payments,
        bookings,
        slot_admin,
        reclaimer,
    }
}

pub fn date(raw: &str) -> NaiveDate {
    raw.parse().expect("valid test date")
}

pub fn time(raw: &str) -> SlotTime {
    SlotTime::parse(raw).expect("valid test time")
}

/// Give spawned fire-and-forget tasks (ticket email) a chance to run.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
