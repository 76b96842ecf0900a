//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The shop's old ledger app stored taka as JavaScript numbers:           │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Poisha                                           │
//! │    ৳10.00 is 1000 poisha. 1000 / 3 = 333 poisha (×3 = 999)              │
//! │    We KNOW we lost 1 poisha, and handle it explicitly                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use khata_core::money::Money;
//!
//! let price = Money::from_poisha(1099); // ৳10.99
//! let total = price + Money::from_taka(5); // ৳15.99
//!
//! // NEVER do this:
//! // let bad = Money::from_float(10.99); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::quantity::Quantity;
use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in poisha (1/100 of a taka).
///
/// ## Design Decisions
/// - **i64 (signed)**: the mobile-banking running balance may legitimately
///   go negative, and deltas during sale edits are signed
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serializes as a bare integer**: document payloads stay schemaless
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from poisha (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    ///
    /// let price = Money::from_poisha(1099); // ৳10.99
    /// assert_eq!(price.poisha(), 1099);
    /// ```
    #[inline]
    pub const fn from_poisha(poisha: i64) -> Self {
        Money(poisha)
    }

    /// Creates a Money value from whole taka.
    #[inline]
    pub const fn from_taka(taka: i64) -> Self {
        Money(taka * 100)
    }

    /// Returns the value in poisha.
    #[inline]
    pub const fn poisha(&self) -> i64 {
        self.0
    }

    /// Returns the whole-taka portion.
    #[inline]
    pub const fn taka(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the poisha portion (always 0-99).
    #[inline]
    pub const fn poisha_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of two values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// Clamps a value at zero from below.
    ///
    /// The due-balance law: a reduction never produces a negative due, the
    /// excess is realised elsewhere by the caller.
    #[inline]
    pub fn clamped_non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Computes a commission at the given rate, rounded half-up to the poisha.
    ///
    /// ## Implementation
    /// Integer math: `(poisha * bps + 5000) / 10000`. The +5000 provides
    /// half-up rounding (5000/10000 = 0.5). i128 avoids overflow on large
    /// amounts.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    /// use khata_core::types::Rate;
    ///
    /// // ৳400.00 cash-out at 1.85% (185 bps) = ৳7.40
    /// let amount = Money::from_taka(400);
    /// assert_eq!(amount.commission(Rate::from_bps(185)).poisha(), 740);
    /// ```
    pub fn commission(&self, rate: Rate) -> Money {
        let poisha = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_poisha(poisha as i64)
    }

    /// Multiplies a unit price by a fixed-point quantity, rounded half-up.
    ///
    /// ## Example
    /// ```rust
    /// use khata_core::money::Money;
    /// use khata_core::quantity::Quantity;
    ///
    /// // 2.5 kg @ ৳50.00/kg = ৳125.00
    /// let unit_price = Money::from_taka(50);
    /// let line = unit_price.multiply_quantity(Quantity::from_thousandths(2500));
    /// assert_eq!(line, Money::from_taka(125));
    /// ```
    pub fn multiply_quantity(&self, qty: Quantity) -> Money {
        let poisha = (self.0 as i128 * qty.thousandths() as i128 + 500) / 1000;
        Money::from_poisha(poisha as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. UI localisation (Bengali numerals) is the
/// frontend's job, not the core's.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}৳{}.{:02}", sign, self.taka().abs(), self.poisha_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_poisha() {
        let money = Money::from_poisha(1099);
        assert_eq!(money.poisha(), 1099);
        assert_eq!(money.taka(), 10);
        assert_eq!(money.poisha_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_poisha(1099)), "৳10.99");
        assert_eq!(format!("{}", Money::from_poisha(500)), "৳5.00");
        assert_eq!(format!("{}", Money::from_poisha(-550)), "-৳5.50");
        assert_eq!(format!("{}", Money::zero()), "৳0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_poisha(1000);
        let b = Money::from_poisha(500);

        assert_eq!((a + b).poisha(), 1500);
        assert_eq!((a - b).poisha(), 500);
        assert_eq!((-a).poisha(), -1000);
    }

    #[test]
    fn test_clamped_non_negative() {
        assert_eq!(Money::from_poisha(-100).clamped_non_negative(), Money::zero());
        assert_eq!(
            Money::from_poisha(100).clamped_non_negative(),
            Money::from_poisha(100)
        );
    }

    #[test]
    fn test_commission_exact() {
        // ৳1,000.00 at 1% = ৳10.00
        let amount = Money::from_taka(1000);
        assert_eq!(amount.commission(Rate::from_bps(100)), Money::from_taka(10));
    }

    #[test]
    fn test_commission_rounds_half_up() {
        // ৳400.00 at 1.85% = ৳7.40 exactly
        assert_eq!(
            Money::from_taka(400).commission(Rate::from_bps(185)).poisha(),
            740
        );
        // ৳1.35 at 1.85% = 2.4975 poisha → rounds to 2
        assert_eq!(Money::from_poisha(135).commission(Rate::from_bps(185)).poisha(), 2);
        // 27.027 poisha worth: ৳2.70 at 1% = 2.7 poisha → 3
        assert_eq!(Money::from_poisha(270).commission(Rate::from_bps(100)).poisha(), 3);
    }

    #[test]
    fn test_commission_unconfigured_rate_is_zero() {
        let amount = Money::from_taka(5000);
        assert_eq!(amount.commission(Rate::zero()), Money::zero());
    }

    #[test]
    fn test_multiply_quantity_whole_and_fractional() {
        let price = Money::from_taka(50);
        assert_eq!(price.multiply_quantity(Quantity::from_whole(2)), Money::from_taka(100));
        assert_eq!(
            price.multiply_quantity(Quantity::from_thousandths(500)),
            Money::from_taka(25)
        );
    }

    #[test]
    fn test_multiply_quantity_rounds_half_up() {
        // ৳0.01 × 0.5 = 0.5 poisha → 1 poisha
        let price = Money::from_poisha(1);
        assert_eq!(price.multiply_quantity(Quantity::from_thousandths(500)).poisha(), 1);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].iter().map(|p| Money::from_poisha(*p)).sum();
        assert_eq!(total.poisha(), 1000);
    }

    /// Documents the intentional precision loss when splitting money.
    #[test]
    fn test_division_precision_loss_documented() {
        let ten = Money::from_taka(10);
        let one_third = Money::from_poisha(ten.poisha() / 3); // 333
        let reconstructed = one_third + one_third + one_third; // 999

        assert_eq!((ten - reconstructed).poisha(), 1);
    }
}
