//! Money in the smallest currency unit (paise).
//!
//! All storefront arithmetic is integral. Percentages are expressed in basis
//! points (1% = 100 bp) and always round down.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// An INR amount in paise.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    pub const fn from_rupees(rupees: u64) -> Self {
        Self(rupees * 100)
    }

    pub const fn paise(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Multiply by a line quantity (saturating).
    pub fn times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(quantity)))
    }

    /// `basis_points / 10_000` of this amount, rounded down.
    pub fn percent_of(self, basis_points: u32) -> Money {
        let scaled = u128::from(self.0) * u128::from(basis_points) / 10_000;
        Money(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 { self } else { other }
    }

    /// Amount in rupees with two decimals, no symbol (`1234.50`).
    pub fn rupees_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl core::fmt::Display for Money {
    /// Renders `₹1,234.56`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let rupees = (self.0 / 100).to_string();
        let mut grouped = String::with_capacity(rupees.len() + rupees.len() / 3);
        for (i, ch) in rupees.chars().enumerate() {
            if i > 0 && (rupees.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "₹{}.{:02}", grouped, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Money::from_paise(0).to_string(), "₹0.00");
        assert_eq!(Money::from_paise(5_000).to_string(), "₹50.00");
        assert_eq!(Money::from_paise(123_456).to_string(), "₹1,234.56");
        assert_eq!(Money::from_paise(5_000_000_00).to_string(), "₹5,000,000.00");
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(Money::from_paise(999).percent_of(1_000), Money::from_paise(99));
        assert_eq!(Money::from_paise(150_000).percent_of(200), Money::from_paise(3_000));
    }

    #[test]
    fn rupees_string_keeps_two_decimals() {
        assert_eq!(Money::from_paise(123_405).rupees_string(), "1234.05");
    }

    proptest! {
        #[test]
        fn percent_never_exceeds_whole(amount in 0u64..10_000_000_000, bp in 0u32..=10_000) {
            let m = Money::from_paise(amount);
            prop_assert!(m.percent_of(bp) <= m);
        }
    }
}
