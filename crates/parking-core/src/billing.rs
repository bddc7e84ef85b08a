//! # Billing
//!
//! Turns an entry/exit pair and the tariff frozen at entry into a charge.
//!
//! ## Rounding Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entry 10:00:00 ─────────────► exit 11:30:00                            │
//! │                                                                         │
//! │  1. duration_minutes = ceil(elapsed / 60s)           = 90               │
//! │  2. billed_hours     = ceil(duration_minutes / 60)   = 2                │
//! │  3. total_cost       = billed_hours × tariff_applied = 2 × rate         │
//! │                                                                         │
//! │  Partial minutes and partial hours always round UP:                    │
//! │  a one-second stay is one minute and bills one full hour.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is integer arithmetic on the stored inputs, so billing the
//! same stay twice always yields the same charge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

const MILLIS_PER_MINUTE: i64 = 60_000;
const MINUTES_PER_HOUR: i64 = 60;

/// Result of billing a single stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub duration_minutes: i64,
    pub billed_hours: i64,
    pub tariff_applied: Money,
    pub total_cost: Money,
}

impl Charge {
    /// Stay length in hours rounded to two decimals, for receipts only.
    pub fn duration_hours(&self) -> f64 {
        duration_hours_for_display(self.duration_minutes)
    }
}

/// Computes the charge for a stay.
///
/// ## Errors
/// * `CoreError::ClockSkew` - `exit` precedes `entry`
/// * `CoreError::InvalidTariff` - negative hourly rate
/// * `CoreError::ChargeOverflow` - the product does not fit in cents
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use parking_core::billing::compute_charge;
/// use parking_core::money::Money;
///
/// let entry = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
/// let exit = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 1).unwrap();
/// let charge = compute_charge(entry, exit, Money::from_major_minor(2000, 0)).unwrap();
///
/// assert_eq!(charge.duration_minutes, 1);
/// assert_eq!(charge.billed_hours, 1);
/// assert_eq!(charge.total_cost, Money::from_major_minor(2000, 0));
/// ```
pub fn compute_charge(
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    tariff: Money,
) -> CoreResult<Charge> {
    if tariff.is_negative() {
        return Err(CoreError::InvalidTariff {
            cents: tariff.cents(),
        });
    }

    let duration_minutes = duration_minutes(entry, exit)?;
    let billed_hours = billed_hours(duration_minutes);
    let total_cost = tariff
        .checked_times(billed_hours)
        .ok_or(CoreError::ChargeOverflow {
            billed_hours,
            tariff_cents: tariff.cents(),
        })?;

    Ok(Charge {
        duration_minutes,
        billed_hours,
        tariff_applied: tariff,
        total_cost,
    })
}

/// Whole minutes between entry and exit, rounded up.
///
/// Fails with `ClockSkew` when the interval is negative.
pub fn duration_minutes(entry: DateTime<Utc>, exit: DateTime<Utc>) -> CoreResult<i64> {
    let elapsed_ms = (exit - entry).num_milliseconds();
    if elapsed_ms < 0 {
        return Err(CoreError::ClockSkew { entry, exit });
    }
    Ok(div_ceil(elapsed_ms, MILLIS_PER_MINUTE))
}

/// Billable hours for a stay: `ceil(minutes / 60)`.
#[inline]
pub fn billed_hours(duration_minutes: i64) -> i64 {
    div_ceil(duration_minutes.max(0), MINUTES_PER_HOUR)
}

/// `minutes / 60` rounded to two decimals.
pub fn duration_hours_for_display(duration_minutes: i64) -> f64 {
    (duration_minutes as f64 / MINUTES_PER_HOUR as f64 * 100.0).round() / 100.0
}

#[inline]
fn div_ceil(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    fn rate() -> Money {
        Money::from_major_minor(2000, 0)
    }

    #[test]
    fn test_one_second_bills_one_full_hour() {
        let charge = compute_charge(at(10, 0, 0), at(10, 0, 1), rate()).unwrap();
        assert_eq!(charge.duration_minutes, 1);
        assert_eq!(charge.billed_hours, 1);
        assert_eq!(charge.total_cost, Money::from_major_minor(2000, 0));
    }

    #[test]
    fn test_ninety_minutes_bills_two_hours() {
        let charge = compute_charge(at(10, 0, 0), at(11, 30, 0), rate()).unwrap();
        assert_eq!(charge.duration_minutes, 90);
        assert_eq!(charge.billed_hours, 2);
        assert_eq!(charge.total_cost, Money::from_major_minor(4000, 0));
        assert!((charge.duration_hours() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_exact_hour_is_not_rounded_up() {
        let charge = compute_charge(at(10, 0, 0), at(11, 0, 0), rate()).unwrap();
        assert_eq!(charge.duration_minutes, 60);
        assert_eq!(charge.billed_hours, 1);
    }

    #[test]
    fn test_sixty_one_minutes_bills_two_hours() {
        let charge = compute_charge(at(10, 0, 0), at(11, 0, 30), rate()).unwrap();
        assert_eq!(charge.duration_minutes, 61);
        assert_eq!(charge.billed_hours, 2);
    }

    #[test]
    fn test_zero_length_stay_bills_nothing() {
        let charge = compute_charge(at(10, 0, 0), at(10, 0, 0), rate()).unwrap();
        assert_eq!(charge.duration_minutes, 0);
        assert_eq!(charge.billed_hours, 0);
        assert!(charge.total_cost.is_zero());
    }

    #[test]
    fn test_negative_interval_is_clock_skew() {
        let err = compute_charge(at(10, 0, 0), at(10, 0, 0) - Duration::milliseconds(1), rate())
            .unwrap_err();
        assert!(matches!(err, CoreError::ClockSkew { .. }));
    }

    #[test]
    fn test_negative_tariff_rejected() {
        let err = compute_charge(at(10, 0, 0), at(10, 5, 0), Money::from_cents(-1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTariff { cents: -1 }));
    }

    #[test]
    fn test_overflowing_charge_rejected() {
        let err = compute_charge(at(0, 0, 0), at(23, 0, 0), Money::from_cents(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, CoreError::ChargeOverflow { billed_hours: 23, .. }));
    }

    #[test]
    fn test_free_zone_charges_zero() {
        let charge = compute_charge(at(8, 0, 0), at(17, 45, 0), Money::zero()).unwrap();
        assert_eq!(charge.billed_hours, 10);
        assert!(charge.total_cost.is_zero());
    }

    #[test]
    fn test_duration_hours_rounding() {
        assert!((duration_hours_for_display(1) - 0.02).abs() < f64::EPSILON);
        assert!((duration_hours_for_display(100) - 1.67).abs() < f64::EPSILON);
        assert!((duration_hours_for_display(0)).abs() < f64::EPSILON);
    }
}
