//! Validated `HH:MM` start-of-slot times.

use serde::{Deserialize, Serialize};

/// Error raised when parsing a slot time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot time must be a valid HH:MM string, got {raw:?}")]
pub struct SlotTimeParseError {
    raw: String,
}

/// A slot's start (or end) time of day, minute precision.
///
/// Serialises as the `HH:MM` string clients send and the store persists, so
/// it can key JSON maps directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    /// Construct from hour and minute components.
    pub fn new(hour: u8, minute: u8) -> Result<Self, SlotTimeParseError> {
        if hour > 23 || minute > 59 {
            return Err(SlotTimeParseError {
                raw: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Parse an `HH:MM` string.
    pub fn parse(raw: &str) -> Result<Self, SlotTimeParseError> {
        let invalid = || SlotTimeParseError { raw: raw.to_owned() };
        let (hour, minute) = raw.split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }

    /// The matching slot end time, one hour after the start.
    ///
    /// Schedules are daytime-only by convention; the hour wraps at midnight
    /// to keep the arithmetic total.
    pub fn end_time(self) -> Self {
        Self {
            hour: (self.hour + 1) % 24,
            minute: self.minute,
        }
    }
}

impl std::fmt::Display for SlotTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for SlotTime {
    type Err = SlotTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = SlotTimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

/// Join times into the comma-separated list used in conflict messages.
pub fn join_times(times: &[SlotTime]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
