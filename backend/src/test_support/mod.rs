//! In-memory adapters for integration tests.
//!
//! The ledger and slot store share one state behind a single mutex, so the
//! reservation path has the same atomicity the Diesel adapter gets from its
//! transaction: check-then-claim happens under one lock and concurrent
//! reservations serialise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::ports::{
    AvailabilityCache, BookingLedger, BookingWithSlots, CacheError, CancelError, CancelOutcome,
    CancelRequester, ChargeStatus, ChargeVerification, ConfirmError, ConfirmOutcome,
    ConfirmedBooking, ConfirmedSlot, InitializePayment, LedgerError, PaymentAuthorization,
    PaymentGateway, PaymentGatewayError, ReclaimOutcome, ReservationRequest, ReserveError,
    ReservedBooking, ReservedSlot, SettingsStore, SettingsStoreError, SlotPatch, SlotStore,
    SlotStoreError, TemplateSyncOutcome, TicketEmail, TicketMailer, TicketMailerError,
};
use crate::domain::slots::{AssembledSlot, SlotRecord, SlotSettings, SlotStatus, SlotTime};
use crate::domain::ticket::TicketId;
use crate::domain::Money;

#[derive(Default)]
struct State {
    slots: HashMap<Uuid, SlotRecord>,
    bookings: HashMap<Uuid, Booking>,
}

/// Shared in-memory store backing [`MemoryBookingLedger`] and
/// [`MemorySlotStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Direct read of a slot row, for assertions.
    pub fn slot(&self, date: NaiveDate, time: SlotTime) -> Option<SlotRecord> {
        self.lock()
            .slots
            .values()
            .find(|slot| slot.date == date && slot.start_time == time)
            .cloned()
    }

    /// Direct read of a booking row, for assertions.
    pub fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.lock().bookings.get(&booking_id).cloned()
    }
}

/// In-memory implementation of the booking ledger port.
#[derive(Clone)]
pub struct MemoryBookingLedger {
    store: Arc<MemoryStore>,
}

impl MemoryBookingLedger {
    /// Create a ledger over the shared store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn confirmed_details(booking: &Booking, slots: &[SlotRecord], ticket: TicketId) -> ConfirmedBooking {
    ConfirmedBooking {
        booking_id: booking.id,
        user_id: booking.user_id,
        user_email: booking.user_email.clone(),
        ticket_id: booking.ticket_id.clone().unwrap_or(ticket),
        amount: booking.total_amount,
        slots: slots
            .iter()
            .map(|slot| ConfirmedSlot {
                date: slot.date,
                start_time: slot.start_time,
                end_time: slot.end_time,
                status: slot.status,
            })
            .collect(),
        email_sent: booking.email_sent,
    }
}

#[async_trait]
impl BookingLedger for MemoryBookingLedger {
    async fn reserve(&self, request: ReservationRequest) -> Result<ReservedBooking, ReserveError> {
        let mut state = self.store.lock();

        let mut unavailable = Vec::new();
        let mut claimed: Vec<ReservedSlot> = Vec::new();
        let mut created: Vec<SlotRecord> = Vec::new();

        for claim in &request.slots {
            let existing = state
                .slots
                .values()
                .find(|slot| slot.date == request.date && slot.start_time == claim.start_time)
                .cloned();
            match existing {
                None => {
                    let record = SlotRecord {
                        id: Uuid::new_v4(),
                        date: request.date,
                        start_time: claim.start_time,
                        end_time: claim.end_time,
                        amount: claim.amount,
                        status: SlotStatus::Available,
                        is_active: true,
                        booking_id: None,
                        booked_by: None,
                        pending_expires_at: None,
                    };
                    claimed.push(ReservedSlot {
                        id: record.id,
                        start_time: record.start_time,
                        end_time: record.end_time,
                        amount: record.amount,
                    });
                    created.push(record);
                }
                Some(slot) if slot.status == SlotStatus::Available => {
                    claimed.push(ReservedSlot {
                        id: slot.id,
                        start_time: slot.start_time,
                        end_time: slot.end_time,
                        amount: slot.amount,
                    });
                }
                Some(_) => unavailable.push(claim.start_time),
            }
        }

        if !unavailable.is_empty() {
            // Nothing was inserted: created rows are dropped with the call.
            return Err(ReserveError::Unavailable { times: unavailable });
        }

        for record in created {
            state.slots.insert(record.id, record);
        }

        let booking_id = Uuid::new_v4();
        let total: Money = claimed.iter().map(|slot| slot.amount).sum();
        for slot in &claimed {
            if let Some(record) = state.slots.get_mut(&slot.id) {
                record.status = SlotStatus::Pending;
                record.booking_id = Some(booking_id);
                record.booked_by = Some(request.user_id);
                record.pending_expires_at = Some(request.hold_expires_at);
            }
        }
        state.bookings.insert(
            booking_id,
            Booking {
                id: booking_id,
                user_id: request.user_id,
                user_email: request.user_email.clone(),
                slot_ids: claimed.iter().map(|slot| slot.id).collect(),
                total_amount: total,
                status: BookingStatus::Pending,
                payment_ref: None,
                payment_verified: false,
                ticket_id: None,
                email_sent: false,
                created_at: Utc::now(),
            },
        );

        Ok(ReservedBooking {
            booking_id,
            date: request.date,
            total_amount: total,
            slots: claimed,
        })
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, LedgerError> {
        Ok(self.store.lock().bookings.get(&booking_id).cloned())
    }

    async fn find_by_payment_ref(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, LedgerError> {
        Ok(self
            .store
            .lock()
            .bookings
            .values()
            .find(|booking| booking.payment_ref.as_deref() == Some(reference))
            .cloned())
    }

    async fn record_payment_ref(
        &self,
        booking_id: Uuid,
        reference: &str,
    ) -> Result<(), LedgerError> {
        let mut state = self.store.lock();
        if let Some(booking) = state.bookings.get_mut(&booking_id) {
            booking.payment_ref = Some(reference.to_owned());
        }
        Ok(())
    }

    async fn confirm_payment(
        &self,
        reference: &str,
        ticket_id: &TicketId,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        let mut state = self.store.lock();
        let booking = state
            .bookings
            .values()
            .find(|booking| booking.payment_ref.as_deref() == Some(reference))
            .cloned()
            .ok_or_else(|| ConfirmError::NotFound {
                reference: reference.to_owned(),
            })?;

        let slot_rows: Vec<SlotRecord> = booking
            .slot_ids
            .iter()
            .filter_map(|id| state.slots.get(id).cloned())
            .collect();

        if booking.payment_verified || booking.status.is_settled() {
            return Ok(ConfirmOutcome::AlreadyProcessed(confirmed_details(
                &booking,
                &slot_rows,
                ticket_id.clone(),
            )));
        }
        if !booking.status.is_payable() {
            return Err(ConfirmError::NotPayable {
                booking_id: booking.id,
                status: booking.status,
            });
        }

        for id in &booking.slot_ids {
            if let Some(slot) = state.slots.get_mut(id) {
                slot.status = SlotStatus::Booked;
                slot.booking_id = Some(booking.id);
                slot.booked_by = Some(booking.user_id);
                slot.pending_expires_at = None;
            }
        }
        let updated = {
            let entry = state
                .bookings
                .get_mut(&booking.id)
                .ok_or_else(|| ConfirmError::Ledger(LedgerError::query("booking vanished")))?;
            entry.status = BookingStatus::Confirmed;
            entry.payment_verified = true;
            entry.ticket_id = Some(ticket_id.clone());
            entry.clone()
        };
        let slot_rows: Vec<SlotRecord> = updated
            .slot_ids
            .iter()
            .filter_map(|id| state.slots.get(id).cloned())
            .collect();
        Ok(ConfirmOutcome::Confirmed(confirmed_details(
            &updated,
            &slot_rows,
            ticket_id.clone(),
        )))
    }

    async fn mark_email_sent(&self, booking_id: Uuid) -> Result<(), LedgerError> {
        let mut state = self.store.lock();
        if let Some(booking) = state.bookings.get_mut(&booking_id) {
            booking.email_sent = true;
        }
        Ok(())
    }

    async fn cancel(
        &self,
        booking_ids: &[Uuid],
        requester: CancelRequester,
    ) -> Result<CancelOutcome, CancelError> {
        let mut state = self.store.lock();

        // Validate the whole batch before mutating anything.
        let mut batch = Vec::with_capacity(booking_ids.len());
        for booking_id in booking_ids {
            let booking = state
                .bookings
                .get(booking_id)
                .cloned()
                .ok_or(CancelError::NotFound {
                    booking_id: *booking_id,
                })?;
            if !requester.is_admin {
                if booking.user_id != requester.user_id {
                    return Err(CancelError::Forbidden {
                        booking_id: booking.id,
                    });
                }
                if booking.status != BookingStatus::Pending {
                    return Err(CancelError::NotCancellable {
                        booking_id: booking.id,
                        status: booking.status,
                    });
                }
            }
            batch.push(booking);
        }

        let mut dates = Vec::new();
        for booking in &batch {
            for slot_id in &booking.slot_ids {
                if let Some(slot) = state.slots.get_mut(slot_id) {
                    if slot.booking_id == Some(booking.id) {
                        slot.status = SlotStatus::Available;
                        slot.booking_id = None;
                        slot.booked_by = None;
                        slot.pending_expires_at = None;
                        dates.push(slot.date);
                    }
                }
            }
            if requester.is_admin {
                state.bookings.remove(&booking.id);
            } else if let Some(entry) = state.bookings.get_mut(&booking.id) {
                entry.status = BookingStatus::Cancelled;
            }
        }

        dates.sort_unstable();
        dates.dedup();
        Ok(CancelOutcome {
            affected: batch.len(),
            deleted: requester.is_admin,
            dates,
        })
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<ReclaimOutcome, LedgerError> {
        let mut state = self.store.lock();
        let mut dates = Vec::new();
        let mut owners = Vec::new();
        let mut released = 0;

        for slot in state.slots.values_mut() {
            let lapsed = slot.status == SlotStatus::Pending
                && slot.pending_expires_at.is_some_and(|at| at < now);
            if lapsed {
                if let Some(owner) = slot.booking_id {
                    owners.push(owner);
                }
                slot.status = SlotStatus::Available;
                slot.booking_id = None;
                slot.booked_by = None;
                slot.pending_expires_at = None;
                dates.push(slot.date);
                released += 1;
            }
        }

        owners.sort_unstable();
        owners.dedup();
        let mut expired_bookings = 0;
        for owner in owners {
            if let Some(booking) = state.bookings.get_mut(&owner) {
                if booking.status == BookingStatus::Pending {
                    booking.status = BookingStatus::Failed;
                    expired_bookings += 1;
                }
            }
        }

        dates.sort_unstable();
        dates.dedup();
        Ok(ReclaimOutcome {
            released_slots: released,
            expired_bookings,
            dates,
        })
    }

    async fn list_bookings(&self) -> Result<Vec<BookingWithSlots>, LedgerError> {
        let state = self.store.lock();
        let mut entries: Vec<BookingWithSlots> = state
            .bookings
            .values()
            .map(|booking| BookingWithSlots {
                booking: booking.clone(),
                slots: booking
                    .slot_ids
                    .iter()
                    .filter_map(|id| state.slots.get(id).cloned())
                    .collect(),
            })
            .collect();
        entries.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(entries)
    }
}

/// In-memory implementation of the slot store port.
#[derive(Clone)]
pub struct MemorySlotStore {
    store: Arc<MemoryStore>,
}

impl MemorySlotStore {
    /// Create a store over the shared state.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<SlotRecord>, SlotStoreError> {
        let state = self.store.lock();
        let mut records: Vec<SlotRecord> = state
            .slots
            .values()
            .filter(|slot| slot.date == date)
            .cloned()
            .collect();
        records.sort_by_key(|slot| slot.start_time);
        Ok(records)
    }

    async fn find_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<SlotRecord>, SlotStoreError> {
        Ok(self.store.slot(date, time))
    }

    async fn create_slot(&self, record: SlotRecord) -> Result<SlotRecord, SlotStoreError> {
        let mut state = self.store.lock();
        let exists = state
            .slots
            .values()
            .any(|slot| slot.date == record.date && slot.start_time == record.start_time);
        if exists {
            return Err(SlotStoreError::AlreadyExists {
                date: record.date,
                time: record.start_time,
            });
        }
        state.slots.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_slot(
        &self,
        date: NaiveDate,
        time: SlotTime,
        patch: SlotPatch,
    ) -> Result<SlotRecord, SlotStoreError> {
        let mut state = self.store.lock();
        let record = state
            .slots
            .values_mut()
            .find(|slot| slot.date == date && slot.start_time == time)
            .ok_or(SlotStoreError::NotFound { date, time })?;
        if let Some(amount) = patch.amount {
            record.amount = amount;
        }
        if let Some(is_active) = patch.is_active {
            record.is_active = is_active;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        Ok(record.clone())
    }

    async fn delete_slot(&self, date: NaiveDate, time: SlotTime) -> Result<(), SlotStoreError> {
        let mut state = self.store.lock();
        let id = state
            .slots
            .values()
            .find(|slot| slot.date == date && slot.start_time == time)
            .map(|slot| slot.id)
            .ok_or(SlotStoreError::NotFound { date, time })?;
        state.slots.remove(&id);
        Ok(())
    }

    async fn slots_for_user(&self, user_id: Uuid) -> Result<Vec<SlotRecord>, SlotStoreError> {
        let state = self.store.lock();
        let mut records: Vec<SlotRecord> = state
            .slots
            .values()
            .filter(|slot| slot.booked_by == Some(user_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(a.start_time.cmp(&b.start_time)));
        Ok(records)
    }

    async fn sync_template(
        &self,
        template: &[SlotTime],
        default_amount: Money,
    ) -> Result<TemplateSyncOutcome, SlotStoreError> {
        let mut state = self.store.lock();
        let dates: Vec<NaiveDate> = {
            let mut dates: Vec<NaiveDate> = state.slots.values().map(|slot| slot.date).collect();
            dates.sort_unstable();
            dates.dedup();
            dates
        };

        let mut outcome = TemplateSyncOutcome::default();
        for date in dates {
            let existing: Vec<SlotTime> = state
                .slots
                .values()
                .filter(|slot| slot.date == date)
                .map(|slot| slot.start_time)
                .collect();

            for &time in template {
                if !existing.contains(&time) {
                    let record = SlotRecord {
                        id: Uuid::new_v4(),
                        date,
                        start_time: time,
                        end_time: time.end_time(),
                        amount: default_amount,
                        status: SlotStatus::Available,
                        is_active: true,
                        booking_id: None,
                        booked_by: None,
                        pending_expires_at: None,
                    };
                    state.slots.insert(record.id, record);
                    outcome.created += 1;
                }
            }

            let removable: Vec<Uuid> = state
                .slots
                .values()
                .filter(|slot| {
                    slot.date == date
                        && !template.contains(&slot.start_time)
                        && slot.status != SlotStatus::Booked
                })
                .map(|slot| slot.id)
                .collect();
            for id in removable {
                state.slots.remove(&id);
                outcome.deleted += 1;
            }
        }
        Ok(outcome)
    }
}

/// In-memory implementation of the settings store port.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<SlotSettings>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given settings.
    pub fn seeded(settings: SlotSettings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<SlotSettings>, SettingsStoreError> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, settings: &SlotSettings) -> Result<(), SettingsStoreError> {
        *self
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}

#[derive(Default)]
struct CacheState {
    days: HashMap<NaiveDate, Vec<AssembledSlot>>,
    settings: Option<SlotSettings>,
    bookings: Option<serde_json::Value>,
}

/// In-memory implementation of the availability cache port.
///
/// TTLs are accepted and ignored; tests drive invalidation explicitly.
#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether a day entry is currently cached.
    pub fn has_day(&self, date: NaiveDate) -> bool {
        self.lock().days.contains_key(&date)
    }
}

#[async_trait]
impl AvailabilityCache for MemoryCache {
    async fn get_day(&self, date: NaiveDate) -> Result<Option<Vec<AssembledSlot>>, CacheError> {
        Ok(self.lock().days.get(&date).cloned())
    }

    async fn put_day(
        &self,
        date: NaiveDate,
        slots: &[AssembledSlot],
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.lock().days.insert(date, slots.to_vec());
        Ok(())
    }

    async fn invalidate_day(&self, date: NaiveDate) -> Result<(), CacheError> {
        self.lock().days.remove(&date);
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<SlotSettings>, CacheError> {
        Ok(self.lock().settings.clone())
    }

    async fn put_settings(
        &self,
        settings: &SlotSettings,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.lock().settings = Some(settings.clone());
        Ok(())
    }

    async fn get_bookings(&self) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(self.lock().bookings.clone())
    }

    async fn put_bookings(
        &self,
        bookings: &serde_json::Value,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.lock().bookings = Some(bookings.clone());
        Ok(())
    }

    async fn invalidate_bookings(&self) -> Result<(), CacheError> {
        self.lock().bookings = None;
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<(), CacheError> {
        let mut state = self.lock();
        state.days.clear();
        state.settings = None;
        state.bookings = None;
        Ok(())
    }
}

/// Gateway double that issues authorizations and verifies what was charged.
///
/// `initialize` records the reference and amount; `verify` answers success
/// with the recorded amount unless a scripted verification overrides it.
#[derive(Default)]
pub struct ScriptedGateway {
    charges: Mutex<HashMap<String, i64>>,
    scripted: Mutex<HashMap<String, ChargeVerification>>,
    fail_initialize: AtomicBool,
    last_reference: Mutex<Option<String>>,
}

impl ScriptedGateway {
    /// Create a gateway that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `initialize` calls fail at the transport level.
    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Script the verification answer for a reference.
    pub fn script_verification(&self, reference: impl Into<String>, verification: ChargeVerification) {
        self.scripted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(reference.into(), verification);
    }

    /// The reference issued by the most recent `initialize` call.
    pub fn last_reference(&self) -> Option<String> {
        self.last_reference
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(
        &self,
        request: InitializePayment,
    ) -> Result<PaymentAuthorization, PaymentGatewayError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(PaymentGatewayError::transport("scripted outage"));
        }
        self.charges
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(request.reference.clone(), request.amount_minor);
        *self
            .last_reference
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(request.reference.clone());
        Ok(PaymentAuthorization {
            authorization_url: format!("https://gateway.test/pay/{}", request.reference),
            reference: request.reference,
        })
    }

    async fn verify(
        &self,
        reference: &str,
    ) -> Result<ChargeVerification, PaymentGatewayError> {
        if let Some(scripted) = self
            .scripted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(reference)
        {
            return Ok(scripted.clone());
        }
        let charges = self
            .charges
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match charges.get(reference) {
            Some(&amount_minor) => Ok(ChargeVerification {
                status: ChargeStatus::Success,
                amount_minor,
                raw: serde_json::json!({ "reference": reference }),
            }),
            None => Err(PaymentGatewayError::rejected("unknown reference")),
        }
    }
}

/// Mailer double that records every dispatched ticket.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<TicketEmail>>,
}

impl RecordingMailer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets dispatched so far.
    pub fn sent(&self) -> Vec<TicketEmail> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TicketMailer for RecordingMailer {
    async fn send_ticket(&self, email: TicketEmail) -> Result<(), TicketMailerError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(email);
        Ok(())
    }
}
