//! Payment orchestration: initiation and idempotent verification.

use std::sync::Arc;

use mockable::Clock;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::booking::Booking;
use crate::domain::money::Money;
use crate::domain::ports::{
    AvailabilityCache, BookingLedger, ChargeStatus, ConfirmError, ConfirmOutcome, ConfirmedBooking,
    ConfirmedSlot, InitializePayment, LedgerError, PaymentAuthorization, PaymentGateway,
    PaymentGatewayError, TicketEmail, TicketLine, TicketMailer,
};
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

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::Timeout { .. } => Error::upstream(
            "payment gateway timed out; the charge outcome is unknown, retry verification",
        ),
        PaymentGatewayError::Transport { message } => {
            Error::upstream(format!("payment gateway unreachable: {message}"))
        }
        PaymentGatewayError::Rejected { message } => {
            Error::upstream(format!("payment gateway rejected the request: {message}"))
        }
        PaymentGatewayError::Decode { message } => {
            Error::upstream(format!("payment gateway response invalid: {message}"))
        }
    }
}

/// Result of a verification call.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    /// The confirmed booking.
    pub booking_id: Uuid,
    /// Ticket attached to the booking.
    pub ticket_id: TicketId,
    /// Amount paid.
    pub amount: Money,
    /// The booked slots.
    pub slots: Vec<ConfirmedSlot>,
    /// True when a previous call already confirmed this reference and this
    /// call performed no state mutation.
    pub already_processed: bool,
}

/// Orchestrates gateway initiation and verification for bookings.
#[derive(Clone)]
pub struct PaymentService {
    ledger: Arc<dyn BookingLedger>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn TicketMailer>,
    cache: Arc<dyn AvailabilityCache>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    /// Create the service over its ports.
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn TicketMailer>,
        cache: Arc<dyn AvailabilityCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            mailer,
            cache,
            clock,
        }
    }

    /// Open a payment authorization for a pending booking.
    ///
    /// A fresh gateway reference is generated per attempt so a retried
    /// initiation never reuses a reference the gateway has already seen.
    pub async fn initiate(
        &self,
        booking_id: Uuid,
        email: &str,
    ) -> Result<PaymentAuthorization, Error> {
        let booking = self.require_booking(booking_id).await?;

        if booking.status.is_settled() {
            return Err(Error::invalid_request(
                "Booking has already been confirmed or paid for",
            ));
        }
        if !booking.status.is_payable() {
            return Err(Error::conflict(format!(
                "Booking {booking_id} is {} and can no longer be paid",
                booking.status
            )));
        }

        let reference = format!("{booking_id}-{}", self.clock.utc().timestamp_millis());
        let authorization = self
            .gateway
            .initialize(InitializePayment {
                email: email.to_owned(),
                amount_minor: booking.total_amount.minor_units(),
                reference: reference.clone(),
                booking_id,
            })
            .await
            .map_err(map_gateway_error)?;

        self.ledger
            .record_payment_ref(booking_id, &authorization.reference)
            .await
            .map_err(map_ledger_error)?;

        info!(%booking_id, reference = %authorization.reference, "payment initialised");
        Ok(authorization)
    }

    /// Verify a charge and confirm its booking, at most once per reference.
    ///
    /// Repeat calls (webhook plus polling client) report `already_processed`
    /// without further mutation. The amount assertion runs before any state
    /// change; a mismatch leaves the booking unconfirmed.
    pub async fn verify(&self, reference: &str) -> Result<VerifyOutcome, Error> {
        let verification = self
            .gateway
            .verify(reference)
            .await
            .map_err(map_gateway_error)?;

        if verification.status != ChargeStatus::Success {
            return Err(Error::invalid_request(
                "Payment not successful. Please try again.",
            ));
        }

        let booking = self
            .ledger
            .find_by_payment_ref(reference)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found("Booking not found for this reference"))?;

        let already_settled = booking.payment_verified || booking.status.is_settled();
        if !already_settled {
            if !booking.status.is_payable() {
                return Err(Error::conflict(format!(
                    "Booking {} is {}; its reservation hold has lapsed",
                    booking.id, booking.status
                )));
            }
            if verification.amount_minor != booking.total_amount.minor_units() {
                // Generic message only; gateway internals stay out of responses.
                return Err(Error::amount_mismatch(
                    "Amount mismatch between gateway and booking record",
                ));
            }
        }

        let ticket_id = TicketId::generate(&mut SmallRng::from_entropy());
        let outcome = self
            .ledger
            .confirm_payment(reference, &ticket_id)
            .await
            .map_err(|error| match error {
                ConfirmError::NotFound { .. } => {
                    Error::not_found("Booking not found for this reference")
                }
                ConfirmError::NotPayable { booking_id, status } => Error::conflict(format!(
                    "Booking {booking_id} is {status}; its reservation hold has lapsed"
                )),
                ConfirmError::Ledger(inner) => map_ledger_error(inner),
            })?;

        match outcome {
            ConfirmOutcome::Confirmed(confirmed) => {
                info!(booking_id = %confirmed.booking_id, %reference, "payment verified, booking confirmed");
                self.invalidate_after_confirm(&confirmed).await;
                self.dispatch_ticket(&confirmed);
                Ok(build_outcome(confirmed, false))
            }
            ConfirmOutcome::AlreadyProcessed(confirmed) => {
                info!(booking_id = %confirmed.booking_id, %reference, "payment already processed");
                Ok(build_outcome(confirmed, true))
            }
        }
    }

    async fn require_booking(&self, booking_id: Uuid) -> Result<Booking, Error> {
        self.ledger
            .find_booking(booking_id)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found("Booking not found"))
    }

    async fn invalidate_after_confirm(&self, confirmed: &ConfirmedBooking) {
        let mut dates: Vec<_> = confirmed.slots.iter().map(|s| s.date).collect();
        dates.sort_unstable();
        dates.dedup();
        for date in dates {
            if let Err(error) = self.cache.invalidate_day(date).await {
                warn!(%date, %error, "cache invalidation after confirmation failed");
            }
        }
        if let Err(error) = self.cache.invalidate_bookings().await {
            warn!(%error, "bookings cache invalidation failed");
        }
    }

    /// Send the confirmation ticket without blocking the verification
    /// response; failures are logged and never un-confirm the booking.
    fn dispatch_ticket(&self, confirmed: &ConfirmedBooking) {
        let email = TicketEmail {
            to: confirmed.user_email.clone(),
            booking_id: confirmed.booking_id,
            ticket_id: confirmed.ticket_id.clone(),
            lines: confirmed
                .slots
                .iter()
                .map(|slot| TicketLine {
                    date: slot.date,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                })
                .collect(),
        };
        let mailer = Arc::clone(&self.mailer);
        let ledger = Arc::clone(&self.ledger);
        let booking_id = confirmed.booking_id;
        tokio::spawn(async move {
            match mailer.send_ticket(email).await {
                Ok(()) => {
                    if let Err(error) = ledger.mark_email_sent(booking_id).await {
                        warn!(%booking_id, %error, "failed to record ticket email dispatch");
                    }
                }
                Err(error) => warn!(%booking_id, %error, "ticket email failed"),
            }
        });
    }
}

fn build_outcome(confirmed: ConfirmedBooking, already_processed: bool) -> VerifyOutcome {
    VerifyOutcome {
        booking_id: confirmed.booking_id,
        ticket_id: confirmed.ticket_id,
        amount: confirmed.amount,
        slots: confirmed.slots,
        already_processed,
    }
}
