//! Booking queries and cancellation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::domain::booking::BookingStatus;
use crate::domain::money::Money;
use crate::domain::ports::{
    AvailabilityCache, BookingLedger, CancelError, CancelOutcome, CancelRequester, LedgerError,
    SlotStore, SlotStoreError, BOOKINGS_TTL,
};
use crate::domain::slots::{SlotRecord, SlotStatus, SlotTime};
use crate::domain::ticket::TicketId;
use crate::domain::Error;

fn map_ledger_error(error: LedgerError) -> Error {
    match error {
        LedgerError::Connection { message } => {
            Error::service_unavailable(format!("booking ledger unavailable: {message}"))
        }
        LedgerError::Query { message } => {
            Error::internal(format!("booking ledger error: {message}"))
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

/// One slot line in a user's booking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSlotLine {
    /// Persisted slot row.
    pub slot_id: Uuid,
    /// Calendar date.
    pub date: chrono::NaiveDate,
    /// Start of the interval.
    pub start_time: SlotTime,
    /// End of the interval.
    pub end_time: SlotTime,
    /// Price at claim time.
    pub amount: Money,
    /// Current slot status.
    pub status: SlotStatus,
}

impl From<SlotRecord> for BookedSlotLine {
    fn from(record: SlotRecord) -> Self {
        Self {
            slot_id: record.id,
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
            amount: record.amount,
            status: record.status,
        }
    }
}

/// A user's slots grouped under one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBookingGroup {
    /// The owning booking, absent for orphaned slot rows.
    pub booking_id: Option<Uuid>,
    /// The slots in this group, newest date first.
    pub slots: Vec<BookedSlotLine>,
}

/// Summary of a user's booking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBookingsSummary {
    /// Sum over every listed slot.
    pub total_amount: Money,
    /// Number of booking groups.
    pub total_bookings: usize,
    /// The groups themselves.
    pub bookings: Vec<UserBookingGroup>,
}

/// One booking in the admin listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOverview {
    /// Client-facing booking id.
    pub booking_id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Owner email.
    pub user_email: String,
    /// Booking total.
    pub total_amount: Money,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// Gateway reference, once payment was initiated.
    pub payment_ref: Option<String>,
    /// Whether verification succeeded.
    pub payment_verified: bool,
    /// Ticket, once confirmed.
    pub ticket_id: Option<TicketId>,
    /// Whether the ticket email went out.
    pub email_sent: bool,
    /// Row creation time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// The claimed slots.
    pub slots: Vec<BookedSlotLine>,
}

/// Result of a cancellation batch, shaped for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationResult {
    /// Bookings affected.
    pub affected: usize,
    /// Whether rows were deleted (admin) rather than marked cancelled.
    pub deleted: bool,
}

/// Booking listings and the cancellation operation.
#[derive(Clone)]
pub struct BookingsService {
    ledger: Arc<dyn BookingLedger>,
    slots: Arc<dyn SlotStore>,
    cache: Arc<dyn AvailabilityCache>,
}

impl BookingsService {
    /// Create the service over the ledger, slot store and cache.
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        slots: Arc<dyn SlotStore>,
        cache: Arc<dyn AvailabilityCache>,
    ) -> Self {
        Self {
            ledger,
            slots,
            cache,
        }
    }

    /// Cancel (or, for admins, delete) a batch of bookings atomically.
    ///
    /// Any booking failing its permission or status check aborts the whole
    /// batch; no partial cancellation is observable.
    pub async fn cancel(
        &self,
        booking_ids: &[Uuid],
        requester: CancelRequester,
    ) -> Result<CancellationResult, Error> {
        if booking_ids.is_empty() {
            return Err(Error::invalid_request("No bookings provided"));
        }

        let outcome = self
            .ledger
            .cancel(booking_ids, requester)
            .await
            .map_err(|error| match error {
                CancelError::NotFound { booking_id } => {
                    Error::not_found(format!("Booking {booking_id} not found"))
                }
                CancelError::Forbidden { .. } => {
                    Error::forbidden("You can only cancel your own bookings")
                }
                CancelError::NotCancellable { booking_id, status } => Error::invalid_request(
                    format!("Booking {booking_id} is {status} and cannot be cancelled"),
                ),
                CancelError::Ledger(inner) => map_ledger_error(inner),
            })?;

        self.invalidate(&outcome).await;
        Ok(CancellationResult {
            affected: outcome.affected,
            deleted: outcome.deleted,
        })
    }

    /// A user's booking history, grouped by booking.
    pub async fn user_bookings(&self, user_id: Uuid) -> Result<UserBookingsSummary, Error> {
        let slots = self
            .slots
            .slots_for_user(user_id)
            .await
            .map_err(map_slot_store_error)?;

        let mut groups: Vec<UserBookingGroup> = Vec::new();
        let mut total_amount = Money::new(0);
        for record in slots {
            total_amount = total_amount.saturating_add(record.amount);
            let booking_id = record.booking_id;
            match groups.iter_mut().find(|g| g.booking_id == booking_id) {
                Some(group) => group.slots.push(record.into()),
                None => groups.push(UserBookingGroup {
                    booking_id,
                    slots: vec![record.into()],
                }),
            }
        }

        Ok(UserBookingsSummary {
            total_amount,
            total_bookings: groups.len(),
            bookings: groups,
        })
    }

    /// Every booking with payment and ticket state, newest first.
    ///
    /// Served from the bookings cache when possible; the listing is
    /// invalidated by every booking mutation.
    pub async fn all_bookings(&self) -> Result<Vec<BookingOverview>, Error> {
        match self.cache.get_bookings().await {
            Ok(Some(cached)) => match serde_json::from_value(cached) {
                Ok(listing) => return Ok(listing),
                Err(error) => warn!(%error, "cached bookings listing undecodable; refreshing"),
            },
            Ok(None) => {}
            Err(error) => warn!(%error, "bookings cache read failed"),
        }

        let listing: Vec<BookingOverview> = self
            .ledger
            .list_bookings()
            .await
            .map_err(map_ledger_error)?
            .into_iter()
            .map(|entry| BookingOverview {
                booking_id: entry.booking.id,
                user_id: entry.booking.user_id,
                user_email: entry.booking.user_email,
                total_amount: entry.booking.total_amount,
                status: entry.booking.status,
                payment_ref: entry.booking.payment_ref,
                payment_verified: entry.booking.payment_verified,
                ticket_id: entry.booking.ticket_id,
                email_sent: entry.booking.email_sent,
                created_at: entry.booking.created_at,
                slots: entry.slots.into_iter().map(Into::into).collect(),
            })
            .collect();

        match serde_json::to_value(&listing) {
            Ok(value) => {
                if let Err(error) = self.cache.put_bookings(&value, BOOKINGS_TTL).await {
                    warn!(%error, "bookings cache write failed");
                }
            }
            Err(error) => warn!(%error, "bookings listing did not serialise for caching"),
        }
        Ok(listing)
    }

    async fn invalidate(&self, outcome: &CancelOutcome) {
        for date in &outcome.dates {
            if let Err(error) = self.cache.invalidate_day(*date).await {
                warn!(%date, %error, "cache invalidation after cancellation failed");
            }
        }
        if let Err(error) = self.cache.invalidate_bookings().await {
            warn!(%error, "bookings cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;

    use crate::domain::booking::Booking;
    use crate::domain::ports::{
        BookingWithSlots, MockAvailabilityCache, MockBookingLedger, MockSlotStore,
    };
    use crate::domain::ErrorCode;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 12).expect("valid date")
    }

    fn slot_record(booking_id: Option<Uuid>, amount: i64) -> SlotRecord {
        let start_time = SlotTime::parse("09:00").expect("valid time");
        SlotRecord {
            id: Uuid::new_v4(),
            date: date(),
            start_time,
            end_time: start_time.end_time(),
            amount: Money::new(amount),
            status: SlotStatus::Booked,
            is_active: true,
            booking_id,
            booked_by: Some(Uuid::new_v4()),
            pending_expires_at: None,
        }
    }

    fn quiet_cache() -> MockAvailabilityCache {
        let mut cache = MockAvailabilityCache::new();
        cache.expect_invalidate_day().returning(|_| Ok(()));
        cache.expect_invalidate_bookings().returning(|| Ok(()));
        cache.expect_get_bookings().returning(|| Ok(None));
        cache.expect_put_bookings().returning(|_, _| Ok(()));
        cache
    }

    fn service(
        ledger: MockBookingLedger,
        slots: MockSlotStore,
        cache: MockAvailabilityCache,
    ) -> BookingsService {
        BookingsService::new(Arc::new(ledger), Arc::new(slots), Arc::new(cache))
    }

    #[rstest]
    #[tokio::test]
    async fn cancel_rejects_empty_batches() {
        let mut ledger = MockBookingLedger::new();
        ledger.expect_cancel().times(0);
        let service = service(ledger, MockSlotStore::new(), quiet_cache());
        let requester = CancelRequester {
            user_id: Uuid::new_v4(),
            is_admin: false,
        };
        let error = service
            .cancel(&[], requester)
            .await
            .expect_err("empty batch rejected");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn cancel_maps_foreign_booking_to_forbidden() {
        let foreign = Uuid::new_v4();
        let mut ledger = MockBookingLedger::new();
        ledger
            .expect_cancel()
            .returning(move |_, _| Err(CancelError::Forbidden { booking_id: foreign }));
        let service = service(ledger, MockSlotStore::new(), quiet_cache());
        let requester = CancelRequester {
            user_id: Uuid::new_v4(),
            is_admin: false,
        };
        let error = service
            .cancel(&[foreign], requester)
            .await
            .expect_err("foreign booking rejected");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn cancel_reports_batch_outcome_and_invalidates() {
        let mut ledger = MockBookingLedger::new();
        ledger.expect_cancel().returning(|ids, _| {
            Ok(CancelOutcome {
                affected: ids.len(),
                deleted: true,
                dates: vec![date()],
            })
        });
        let mut cache = MockAvailabilityCache::new();
        cache
            .expect_invalidate_day()
            .times(1)
            .returning(|_| Ok(()));
        cache
            .expect_invalidate_bookings()
            .times(1)
            .returning(|| Ok(()));

        let service = service(ledger, MockSlotStore::new(), cache);
        let requester = CancelRequester {
            user_id: Uuid::new_v4(),
            is_admin: true,
        };
        let result = service
            .cancel(&[Uuid::new_v4(), Uuid::new_v4()], requester)
            .await
            .expect("batch succeeds");
        assert_eq!(result.affected, 2);
        assert!(result.deleted);
    }

    #[rstest]
    #[tokio::test]
    async fn user_bookings_groups_by_booking() {
        let booking_a = Uuid::new_v4();
        let booking_b = Uuid::new_v4();
        let mut slots = MockSlotStore::new();
        slots.expect_slots_for_user().returning(move |_| {
            Ok(vec![
                slot_record(Some(booking_a), 20000),
                slot_record(Some(booking_a), 20000),
                slot_record(Some(booking_b), 15000),
            ])
        });

        let service = service(MockBookingLedger::new(), slots, quiet_cache());
        let summary = service
            .user_bookings(Uuid::new_v4())
            .await
            .expect("history loads");
        assert_eq!(summary.total_bookings, 2);
        assert_eq!(summary.total_amount, Money::new(55000));
        let group_a = summary
            .bookings
            .iter()
            .find(|g| g.booking_id == Some(booking_a))
            .expect("group present");
        assert_eq!(group_a.slots.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn user_bookings_with_no_slots_is_empty() {
        let mut slots = MockSlotStore::new();
        slots.expect_slots_for_user().returning(|_| Ok(vec![]));
        let service = service(MockBookingLedger::new(), slots, quiet_cache());
        let summary = service
            .user_bookings(Uuid::new_v4())
            .await
            .expect("history loads");
        assert_eq!(summary.total_bookings, 0);
        assert_eq!(summary.total_amount, Money::new(0));
    }

    #[rstest]
    #[tokio::test]
    async fn all_bookings_round_trips_through_the_cache() {
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_email: "team@example.test".to_owned(),
            slot_ids: vec![],
            total_amount: Money::new(20000),
            status: BookingStatus::Confirmed,
            payment_ref: Some("ref-9".to_owned()),
            payment_verified: true,
            ticket_id: Some(TicketId::from_stored("SCZ123456")),
            email_sent: true,
            created_at: Utc::now(),
        };
        let mut ledger = MockBookingLedger::new();
        let entry = BookingWithSlots {
            booking: booking.clone(),
            slots: vec![slot_record(Some(booking.id), 20000)],
        };
        ledger
            .expect_list_bookings()
            .times(1)
            .returning(move || Ok(vec![entry.clone()]));

        let service = service(ledger, MockSlotStore::new(), quiet_cache());
        let listing = service.all_bookings().await.expect("listing loads");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].booking_id, booking.id);
        assert!(listing[0].payment_verified);

        // A cached copy decodes back into the same listing shape.
        let cached = serde_json::to_value(&listing).expect("serialises");
        let decoded: Vec<BookingOverview> =
            serde_json::from_value(cached).expect("cache round trip");
        assert_eq!(decoded, listing);
    }
}
