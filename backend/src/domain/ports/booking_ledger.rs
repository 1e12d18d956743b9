//! Port for the transactional booking ledger.
//!
//! Every operation here is a single atomic unit in the adapter: a failure
//! leaves no partial slot or booking mutation observable, and two concurrent
//! reservations can never both claim the same slot.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::money::Money;
use crate::domain::slots::{join_times, SlotRecord, SlotStatus, SlotTime};
use crate::domain::ticket::TicketId;

use super::macros::define_port_error;

define_port_error! {
    /// Storage-level errors raised by ledger adapters.
    pub enum LedgerError {
        /// Ledger connection could not be established.
        Connection { message: String } =>
            "booking ledger connection failed: {message}",
        /// Query or transaction failed during execution.
        Query { message: String } =>
            "booking ledger query failed: {message}",
    }
}

/// Errors raised by [`BookingLedger::reserve`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReserveError {
    /// One or more requested slots were not claimable; nothing was written.
    #[error("slots not available: {}", join_times(times))]
    Unavailable {
        /// The requested start times that could not be claimed.
        times: Vec<SlotTime>,
    },
    /// Underlying storage failure; the transaction rolled back.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by [`BookingLedger::confirm_payment`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmError {
    /// No booking carries the supplied payment reference.
    #[error("no booking for payment reference {reference:?}")]
    NotFound {
        /// The unmatched reference.
        reference: String,
    },
    /// The booking can no longer be confirmed (hold reclaimed or cancelled).
    #[error("booking {booking_id} is {status} and cannot be confirmed")]
    NotPayable {
        /// The affected booking.
        booking_id: Uuid,
        /// Its current status.
        status: BookingStatus,
    },
    /// Underlying storage failure; the transaction rolled back.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by [`BookingLedger::cancel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    /// One of the supplied booking ids does not exist.
    #[error("booking {booking_id} not found")]
    NotFound {
        /// The unknown booking.
        booking_id: Uuid,
    },
    /// The requester does not own one of the bookings.
    #[error("booking {booking_id} belongs to another user")]
    Forbidden {
        /// The foreign booking.
        booking_id: Uuid,
    },
    /// A non-admin attempted to cancel a booking that is not pending.
    #[error("booking {booking_id} is {status} and cannot be cancelled")]
    NotCancellable {
        /// The affected booking.
        booking_id: Uuid,
        /// Its current status.
        status: BookingStatus,
    },
    /// Underlying storage failure; the transaction rolled back.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Effective template values for one slot being claimed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotClaim {
    /// Start of the requested interval.
    pub start_time: SlotTime,
    /// End of the requested interval.
    pub end_time: SlotTime,
    /// Price to charge if the row is created lazily.
    pub amount: Money,
}

/// One atomic reservation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRequest {
    /// Requesting user.
    pub user_id: Uuid,
    /// Email payment goes to.
    pub user_email: String,
    /// Date being booked.
    pub date: NaiveDate,
    /// Requested slots with their effective template values.
    pub slots: Vec<SlotClaim>,
    /// When the resulting hold lapses.
    pub hold_expires_at: DateTime<Utc>,
}

/// A slot claimed by a successful reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedSlot {
    /// Persisted row id.
    pub id: Uuid,
    /// Start of the interval.
    pub start_time: SlotTime,
    /// End of the interval.
    pub end_time: SlotTime,
    /// Price at claim time.
    pub amount: Money,
}

/// The booking written by a successful reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedBooking {
    /// Client-facing booking id.
    pub booking_id: Uuid,
    /// Date booked.
    pub date: NaiveDate,
    /// Sum of claimed slot amounts.
    pub total_amount: Money,
    /// The claimed slots, in request order.
    pub slots: Vec<ReservedSlot>,
}

/// A confirmed slot as reported to verification callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedSlot {
    /// Calendar date.
    pub date: NaiveDate,
    /// Start of the interval.
    pub start_time: SlotTime,
    /// End of the interval.
    pub end_time: SlotTime,
    /// Status after confirmation.
    pub status: SlotStatus,
}

/// Details of a confirmed booking.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedBooking {
    /// Client-facing booking id.
    pub booking_id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Email the ticket goes to.
    pub user_email: String,
    /// Ticket attached to the booking.
    pub ticket_id: TicketId,
    /// Amount paid.
    pub amount: Money,
    /// The booked slots.
    pub slots: Vec<ConfirmedSlot>,
    /// Whether the ticket email was already dispatched.
    pub email_sent: bool,
}

/// Outcome of a confirmation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    /// This call performed the one effective transition.
    Confirmed(ConfirmedBooking),
    /// A previous call already confirmed the booking; nothing was mutated.
    AlreadyProcessed(ConfirmedBooking),
}

impl ConfirmOutcome {
    /// The confirmed booking either way.
    pub fn booking(&self) -> &ConfirmedBooking {
        match self {
            Self::Confirmed(booking) | Self::AlreadyProcessed(booking) => booking,
        }
    }
}

/// Who is asking for a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRequester {
    /// Requesting user.
    pub user_id: Uuid,
    /// Whether the requester holds the admin role.
    pub is_admin: bool,
}

/// Outcome of an atomic cancellation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// Bookings cancelled or deleted.
    pub affected: usize,
    /// Whether rows were deleted (admin) rather than marked cancelled.
    pub deleted: bool,
    /// Dates whose slots were released.
    pub dates: Vec<NaiveDate>,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReclaimOutcome {
    /// Slot holds released back to available.
    pub released_slots: usize,
    /// Pending bookings marked failed because their hold lapsed.
    pub expired_bookings: usize,
    /// Dates whose availability changed.
    pub dates: Vec<NaiveDate>,
}

/// A booking joined with its slot rows, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingWithSlots {
    /// The booking row.
    pub booking: Booking,
    /// Its claimed slots.
    pub slots: Vec<SlotRecord>,
}

/// Port for the transactional booking ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Atomically claim the requested slots and write a pending booking.
    ///
    /// Missing slot rows are created lazily at the supplied template amount;
    /// rows not currently available abort the whole transaction. Claimed
    /// rows move to pending with the supplied hold expiry.
    async fn reserve(&self, request: ReservationRequest) -> Result<ReservedBooking, ReserveError>;

    /// Load a booking by its client-facing id.
    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, LedgerError>;

    /// Load a booking by its gateway payment reference.
    async fn find_by_payment_ref(&self, reference: &str)
        -> Result<Option<Booking>, LedgerError>;

    /// Record the gateway reference handed out for a booking.
    async fn record_payment_ref(
        &self,
        booking_id: Uuid,
        reference: &str,
    ) -> Result<(), LedgerError>;

    /// Atomically confirm the booking carrying `reference`.
    ///
    /// Idempotent: a booking already verified reports
    /// [`ConfirmOutcome::AlreadyProcessed`] without further mutation.
    /// Otherwise the booking moves to confirmed with `ticket_id` attached
    /// and every claimed slot moves to booked.
    async fn confirm_payment(
        &self,
        reference: &str,
        ticket_id: &TicketId,
    ) -> Result<ConfirmOutcome, ConfirmError>;

    /// Record that the ticket email for a booking was dispatched.
    async fn mark_email_sent(&self, booking_id: Uuid) -> Result<(), LedgerError>;

    /// Atomically cancel (or, for admins, delete) a batch of bookings.
    ///
    /// Any booking failing its permission or status check aborts the whole
    /// batch. Released slots return to available.
    async fn cancel(
        &self,
        booking_ids: &[Uuid],
        requester: CancelRequester,
    ) -> Result<CancelOutcome, CancelError>;

    /// Release every slot hold that lapsed before `now` and fail the
    /// bookings those holds belonged to.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<ReclaimOutcome, LedgerError>;

    /// All bookings with their slots, newest first.
    async fn list_bookings(&self) -> Result<Vec<BookingWithSlots>, LedgerError>;
}
