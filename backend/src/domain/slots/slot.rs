//! Persisted slot records and their lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::domain::slots::SlotTime;

/// Lifecycle state of a persisted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// Bookable; the default for lazily created rows.
    Available,
    /// Held by a pending booking, subject to expiry.
    Pending,
    /// Claimed by a confirmed booking.
    Booked,
    /// Taken out of service by an admin.
    Unavailable,
}

/// Error raised when decoding a stored status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown slot status {raw:?}")]
pub struct ParseSlotStatusError {
    raw: String,
}

impl SlotStatus {
    /// The canonical storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether the status may move to `next`.
    ///
    /// This is the single authoritative transition table; adapters and
    /// services must consult it rather than comparing strings ad hoc.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Pending)
                | (Self::Available, Self::Unavailable)
                | (Self::Pending, Self::Booked)
                | (Self::Pending, Self::Available)
                | (Self::Unavailable, Self::Available)
                // Admin cancellation releases a booked slot.
                | (Self::Booked, Self::Available)
        )
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SlotStatus {
    type Err = ParseSlotStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "pending" => Ok(Self::Pending),
            "booked" => Ok(Self::Booked),
            "unavailable" => Ok(Self::Unavailable),
            _ => Err(ParseSlotStatusError { raw: s.to_owned() }),
        }
    }
}

/// A persisted slot row.
///
/// Rows exist only for slots that were actually touched (booked or edited);
/// untouched times are materialised on the fly by the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    /// Stable row identifier.
    pub id: Uuid,
    /// Calendar date the slot belongs to.
    pub date: NaiveDate,
    /// Start of the slot interval.
    pub start_time: SlotTime,
    /// End of the slot interval (start + 1 hour).
    pub end_time: SlotTime,
    /// Price charged when this slot is claimed.
    pub amount: Money,
    /// Lifecycle state.
    pub status: SlotStatus,
    /// Whether the slot is offered at all.
    pub is_active: bool,
    /// Owning booking while pending or booked.
    pub booking_id: Option<Uuid>,
    /// User holding or owning the slot.
    pub booked_by: Option<Uuid>,
    /// When a pending hold lapses and may be reclaimed.
    pub pending_expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SlotStatus::Available, SlotStatus::Pending, true)]
    #[case(SlotStatus::Pending, SlotStatus::Booked, true)]
    #[case(SlotStatus::Pending, SlotStatus::Available, true)]
    #[case(SlotStatus::Booked, SlotStatus::Available, true)]
    #[case(SlotStatus::Available, SlotStatus::Booked, false)]
    #[case(SlotStatus::Booked, SlotStatus::Pending, false)]
    #[case(SlotStatus::Unavailable, SlotStatus::Pending, false)]
    fn transition_table(#[case] from: SlotStatus, #[case] to: SlotStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    #[case(SlotStatus::Available, "available")]
    #[case(SlotStatus::Pending, "pending")]
    #[case(SlotStatus::Booked, "booked")]
    #[case(SlotStatus::Unavailable, "unavailable")]
    fn status_round_trips_through_storage_form(#[case] status: SlotStatus, #[case] raw: &str) {
        assert_eq!(status.as_str(), raw);
        assert_eq!(raw.parse::<SlotStatus>().expect("parses"), status);
    }

    #[rstest]
    fn unknown_status_is_rejected() {
        assert!("paid".parse::<SlotStatus>().is_err());
    }
}
