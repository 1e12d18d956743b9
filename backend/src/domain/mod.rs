//! Domain core: entities, services and the ports adapters implement.
//!
//! Services depend only on the port traits in [`ports`]; transactional
//! guarantees live behind the [`ports::BookingLedger`] port so the domain
//! never sees a partially applied reservation or confirmation.

pub mod availability;
pub mod booking;
pub mod bookings;
pub mod error;
pub mod expiry;
pub mod money;
pub mod payment;
pub mod ports;
pub mod reservation;
pub mod settings_service;
pub mod slot_admin;
pub mod slots;
pub mod ticket;

pub use self::availability::AvailabilityService;
pub use self::booking::{Booking, BookingStatus, ParseBookingStatusError};
pub use self::bookings::{
    BookedSlotLine, BookingOverview, BookingsService, CancellationResult, UserBookingGroup,
    UserBookingsSummary,
};
pub use self::error::{Error, ErrorCode};
pub use self::expiry::{ExpiryReclaimer, ReclaimSleeper, TokioSleeper};
pub use self::money::Money;
pub use self::payment::{PaymentService, VerifyOutcome};
pub use self::reservation::{ReservationOutcome, ReservationService};
pub use self::settings_service::{AmountScope, SettingsService};
pub use self::slot_admin::SlotAdminService;
pub use self::ticket::TicketId;

/// Convenient domain result alias.
pub type DomainResult<T> = Result<T, Error>;
