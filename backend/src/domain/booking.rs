//! Booking records and their payment lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::ticket::TicketId;

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Reservation created, payment outstanding; slots are held.
    Pending,
    /// Legacy confirmed state kept for rows written by earlier revisions.
    Booked,
    /// Payment verified; the terminal success state.
    Confirmed,
    /// Cancelled by its owner; slots released.
    Cancelled,
    /// Hold expired before payment; slots reclaimed.
    Failed,
}

/// Error raised when decoding a stored status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status {raw:?}")]
pub struct ParseBookingStatusError {
    raw: String,
}

impl BookingStatus {
    /// The canonical storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether payment has already succeeded for this booking.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Confirmed | Self::Booked)
    }

    /// Whether the booking can still be paid for.
    pub fn is_payable(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = ParseBookingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "booked" => Ok(Self::Booked),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseBookingStatusError { raw: s.to_owned() }),
        }
    }
}

/// A persisted booking: one row per reservation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Client-facing booking identifier.
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Email the payment and ticket go to.
    pub user_email: String,
    /// Claimed slot rows, in request order.
    pub slot_ids: Vec<Uuid>,
    /// Sum of the claimed slots' amounts at claim time.
    pub total_amount: Money,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// Gateway-facing reference, distinct from the booking id.
    pub payment_ref: Option<String>,
    /// Whether a successful verification has been recorded.
    pub payment_verified: bool,
    /// Confirmation ticket, present once confirmed.
    pub ticket_id: Option<TicketId>,
    /// Whether the ticket email was dispatched.
    pub email_sent: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}
