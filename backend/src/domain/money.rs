//! Monetary amounts in the facility's major currency unit.

use serde::{Deserialize, Serialize};

/// An amount of money in whole major units (e.g. naira).
///
/// The payment gateway deals in minor units (kobo); conversion happens only
/// at the gateway boundary via [`Money::minor_units`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Construct an amount from whole major units.
    pub const fn new(major_units: i64) -> Self {
        Self(major_units)
    }

    /// The amount in whole major units.
    pub const fn major_units(self) -> i64 {
        self.0
    }

    /// The amount in gateway minor units (1 major unit = 100 minor units).
    pub const fn minor_units(self) -> i64 {
        self.0 * 100
    }

    /// Construct an amount from gateway minor units.
    ///
    /// Sub-unit remainders are truncated; the verification path compares in
    /// minor units so truncation never masks a mismatch.
    pub const fn from_minor_units(minor: i64) -> Self {
        Self(minor / 100)
    }

    /// Saturating sum, used when totalling claimed slots.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(0), Self::saturating_add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Money::new(20000), 2_000_000)]
    #[case(Money::new(0), 0)]
    fn converts_to_minor_units(#[case] amount: Money, #[case] expected: i64) {
        assert_eq!(amount.minor_units(), expected);
    }

    #[rstest]
    fn sums_slot_amounts() {
        let total: Money = [Money::new(20000), Money::new(15000)].into_iter().sum();
        assert_eq!(total, Money::new(35000));
    }

    #[rstest]
    fn round_trips_through_minor_units() {
        let amount = Money::new(20000);
        assert_eq!(Money::from_minor_units(amount.minor_units()), amount);
    }
}
