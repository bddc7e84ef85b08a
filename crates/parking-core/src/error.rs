//! # Error Types
//!
//! Domain-specific error types for parking-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  parking-core errors (this file)                                       │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Structural input failures                      │
//! │                                                                         │
//! │  parking-db errors (separate crate)                                    │
//! │  ├── DbError          - Storage failures                               │
//! │  └── EngineError      - Entry/exit taxonomy                            │
//! │                                                                         │
//! │  parking-gateway errors                                                │
//! │  └── ApiError         - What kiosks see (serialized)                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → Kiosk    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Exit timestamp precedes entry timestamp.
    ///
    /// ## When This Occurs
    /// - The host clock was stepped backwards between entry and exit
    /// - Records were written by a terminal with a skewed clock
    ///
    /// Billing refuses to produce a zero or negative charge in this case.
    #[error("Exit time {exit} precedes entry time {entry}")]
    ClockSkew {
        entry: DateTime<Utc>,
        exit: DateTime<Utc>,
    },

    /// Hourly rate is negative.
    #[error("Invalid tariff: {cents} cents per hour")]
    InvalidTariff { cents: i64 },

    /// The charge does not fit in the money representation.
    #[error("Charge overflow: {billed_hours} hours at {tariff_cents} cents per hour")]
    ChargeOverflow { billed_hours: i64, tariff_cents: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed plate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A zone allows a vehicle type without pricing it.
    #[error("tariff missing for allowed vehicle type '{vehicle_type}'")]
    MissingTariff { vehicle_type: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_skew_message() {
        let entry = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let exit = Utc.with_ymd_and_hms(2026, 3, 2, 9, 59, 0).unwrap();
        let err = CoreError::ClockSkew { entry, exit };
        assert_eq!(
            err.to_string(),
            "Exit time 2026-03-02 09:59:00 UTC precedes entry time 2026-03-02 10:00:00 UTC"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "plate".to_string(),
        };
        assert_eq!(err.to_string(), "plate is required");

        let err = ValidationError::MissingTariff {
            vehicle_type: "bus".to_string(),
        };
        assert_eq!(err.to_string(), "tariff missing for allowed vehicle type 'bus'");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
