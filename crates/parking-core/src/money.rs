//! # Money Module
//!
//! Provides the `Money` type for tariffs and parking charges.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Hourly rate 0.1 × 3 hours = 0.30000000000000004  ❌                   │
//! │                                                                         │
//! │  A charge must be reproducible byte-for-byte when the same stay is     │
//! │  billed again (audits, disputes, re-printed receipts).                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    rate 200000 cents × 2 hours = 400000 cents, always                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use parking_core::money::Money;
//!
//! let rate = Money::from_major_minor(2000, 0); // $2000.00 per hour
//! let charge = rate.checked_times(2);
//! assert_eq!(charge, Some(Money::from_cents(400_000)));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that administrative adjustments can be expressed, although
/// tariffs and charges produced by the engine are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use parking_core::money::Money;
    ///
    /// let rate = Money::from_cents(150_000);
    /// assert_eq!(rate.cents(), 150_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use parking_core::money::Money;
    ///
    /// let rate = Money::from_major_minor(2000, 50);
    /// assert_eq!(rate.cents(), 200_050);
    /// ```
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a whole number of billing units (hours).
    ///
    /// `None` when the product does not fit; a charge is never wrapped.
    ///
    /// ## Example
    /// ```rust
    /// use parking_core::money::Money;
    ///
    /// let rate = Money::from_cents(299);
    /// assert_eq!(rate.checked_times(3), Some(Money::from_cents(897)));
    /// ```
    #[inline]
    pub fn checked_times(&self, units: i64) -> Option<Self> {
        self.0.checked_mul(units).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering. Receipts format amounts on the terminal side.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(2000, 0).cents(), 200_000);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_major_minor(4000, 0)), "$4000.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::zero()), "$0.00");
    }

    #[test]
    fn test_checked_times_overflow() {
        assert_eq!(Money::from_cents(7).checked_times(6), Some(Money::from_cents(42)));
        assert_eq!(Money::from_cents(i64::MAX).checked_times(2), None);
    }
}
