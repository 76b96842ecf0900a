//! # Quantity Module
//!
//! Fixed-point quantities for stock and sale lines.
//!
//! ## Why Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The shop sells loose goods: 0.5 kg of lentils, 1.25 L of oil.          │
//! │                                                                         │
//! │  Floats drift. Thousandths don't:                                       │
//! │    0.5 kg   = 500 thousandths                                           │
//! │    1.25 L   = 1250 thousandths                                          │
//! │    3 pieces = 3000 thousandths                                          │
//! │                                                                         │
//! │  Stock arithmetic (reserve, restore, deltas) stays exact integer math.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

// =============================================================================
// Quantity Type
// =============================================================================

/// A quantity in thousandths of a unit.
///
/// Signed, because sale edits work in deltas (new − old may be negative).
/// Stock levels themselves are kept non-negative by the inventory ledger.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths.
    #[inline]
    pub const fn from_thousandths(thousandths: i64) -> Self {
        Quantity(thousandths)
    }

    /// Creates a quantity from whole units.
    #[inline]
    pub const fn from_whole(units: i64) -> Self {
        Quantity(units * 1000)
    }

    /// Returns the raw thousandths value.
    #[inline]
    pub const fn thousandths(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion (truncated toward zero).
    #[inline]
    pub const fn whole(&self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps at zero from below.
    ///
    /// The oversell rule: reserving more than the shelf holds floors the
    /// stock at zero rather than rejecting the sale.
    #[inline]
    pub fn clamped_non_negative(self) -> Self {
        Quantity(self.0.max(0))
    }

    /// Saturating subtraction floored at zero.
    #[inline]
    pub fn reserve(self, qty: Quantity) -> Self {
        Quantity((self.0 - qty.0).max(0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frac = (self.0 % 1000).abs();
        if frac == 0 {
            write!(f, "{}", self.whole())
        } else {
            let sign = if self.0 < 0 { "-" } else { "" };
            // Trim trailing zeros: 500 → ".5", 250 → ".25"
            let mut frac_str = format!("{:03}", frac);
            while frac_str.ends_with('0') {
                frac_str.pop();
            }
            write!(f, "{}{}.{}", sign, self.whole().abs(), frac_str)
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_whole_and_thousandths() {
        assert_eq!(Quantity::from_whole(3).thousandths(), 3000);
        assert_eq!(Quantity::from_thousandths(500).whole(), 0);
        assert_eq!(Quantity::from_thousandths(2500).whole(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Quantity::from_whole(3)), "3");
        assert_eq!(format!("{}", Quantity::from_thousandths(500)), "0.5");
        assert_eq!(format!("{}", Quantity::from_thousandths(1250)), "1.25");
        assert_eq!(format!("{}", Quantity::from_thousandths(-500)), "-0.5");
    }

    #[test]
    fn test_reserve_clamps_at_zero() {
        let stock = Quantity::from_whole(3);
        assert_eq!(stock.reserve(Quantity::from_whole(2)), Quantity::from_whole(1));
        assert_eq!(stock.reserve(Quantity::from_whole(5)), Quantity::zero());
    }

    #[test]
    fn test_delta_arithmetic() {
        let old = Quantity::from_whole(2);
        let new = Quantity::from_thousandths(3500);
        let delta = new - old;
        assert_eq!(delta.thousandths(), 1500);
        assert!((old - new).is_negative());
    }
}
