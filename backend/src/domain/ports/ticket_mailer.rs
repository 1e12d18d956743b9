//! Port for outbound ticket email dispatch.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::slots::SlotTime;
use crate::domain::ticket::TicketId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by mailer adapters.
    pub enum TicketMailerError {
        /// The message could not be handed to the mail system.
        Send { message: String } => "ticket email failed: {message}",
    }
}

/// One booked interval listed on the ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketLine {
    /// Calendar date.
    pub date: NaiveDate,
    /// Start of the interval.
    pub start_time: SlotTime,
    /// End of the interval.
    pub end_time: SlotTime,
}

/// The confirmation ticket email payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketEmail {
    /// Recipient address.
    pub to: String,
    /// Confirmed booking.
    pub booking_id: Uuid,
    /// Ticket presented at the facility.
    pub ticket_id: TicketId,
    /// Booked intervals.
    pub lines: Vec<TicketLine>,
}

/// Port for dispatching confirmation tickets.
///
/// Callers treat dispatch as fire-and-forget: failures are logged and never
/// propagate into the payment path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketMailer: Send + Sync {
    /// Send a confirmation ticket.
    async fn send_ticket(&self, email: TicketEmail) -> Result<(), TicketMailerError>;
}
