//! Driven ports implemented by outbound adapters.

mod availability_cache;
mod booking_ledger;
pub(crate) mod macros;
mod payment_gateway;
mod settings_store;
mod slot_store;
mod ticket_mailer;

pub use availability_cache::{
    AvailabilityCache, CacheError, NoopCache, BOOKINGS_TTL, DAY_TTL, SETTINGS_TTL,
};
pub use booking_ledger::{
    BookingLedger, BookingWithSlots, CancelError, CancelOutcome, CancelRequester, ConfirmError,
    ConfirmOutcome, ConfirmedBooking, ConfirmedSlot, LedgerError, ReclaimOutcome,
    ReservationRequest, ReserveError, ReservedBooking, ReservedSlot, SlotClaim,
};
pub use payment_gateway::{
    ChargeStatus, ChargeVerification, InitializePayment, PaymentAuthorization, PaymentGateway,
    PaymentGatewayError,
};
pub use settings_store::{SettingsStore, SettingsStoreError};
pub use slot_store::{SlotPatch, SlotStore, SlotStoreError, TemplateSyncOutcome};
pub use ticket_mailer::{TicketEmail, TicketLine, TicketMailer, TicketMailerError};

#[cfg(test)]
pub use availability_cache::MockAvailabilityCache;
#[cfg(test)]
pub use booking_ledger::MockBookingLedger;
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
#[cfg(test)]
pub use settings_store::MockSettingsStore;
#[cfg(test)]
pub use slot_store::MockSlotStore;
#[cfg(test)]
pub use ticket_mailer::MockTicketMailer;
