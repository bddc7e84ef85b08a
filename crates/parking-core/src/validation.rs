//! # Validation Module
//!
//! Structural checks the engine needs for its own administrative writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Gateway (Rust)                                               │
//! │  ├── Request ids present and bounded                                   │
//! │  └── Payment method / vehicle type parse via serde                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Plates, names, capacities                                         │
//! │  └── Zone definitions (allowed types priced, rates ≥ 0)                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (available_slots BETWEEN 0 AND capacity_max)                │
//! │  └── UNIQUE active record per vehicle                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field-shape validation of stored documents belongs to the external schema
//! layer; only the rules the engine itself depends on are repeated here.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::VehicleType;
use crate::MAX_ZONE_CAPACITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a licence plate.
///
/// ## Rules
/// - 6 to 8 characters
/// - Uppercase ASCII letters and digits only
///
/// ## Example
/// ```rust
/// use parking_core::validation::validate_plate;
///
/// assert!(validate_plate("ABC123").is_ok());
/// assert!(validate_plate("abc123").is_err());
/// assert!(validate_plate("AB-123").is_err());
/// ```
pub fn validate_plate(plate: &str) -> ValidationResult<()> {
    if plate.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "plate".to_string(),
        });
    }

    let valid_len = (6..=8).contains(&plate.len());
    let valid_chars = plate
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if !valid_len || !valid_chars {
        return Err(ValidationError::InvalidFormat {
            field: "plate".to_string(),
            reason: "must be 6-8 uppercase letters or digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (site or zone).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an entity reference passed in a request.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    validate_name(field, id, 64)
}

/// Maximum length of a free-text remark on an occupancy record.
pub const MAX_NOTES_LEN: usize = 500;

/// Validates a free-text remark (cancellation reason, operator note).
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    validate_name("notes", notes, MAX_NOTES_LEN)
}

// =============================================================================
// Zone Validators
// =============================================================================

/// Validates a zone capacity.
///
/// ## Rules
/// - Between 1 and MAX_ZONE_CAPACITY (1000)
pub fn validate_capacity(capacity_max: i64) -> ValidationResult<()> {
    if !(1..=MAX_ZONE_CAPACITY).contains(&capacity_max) {
        return Err(ValidationError::OutOfRange {
            field: "capacity_max".to_string(),
            min: 1,
            max: MAX_ZONE_CAPACITY,
        });
    }

    Ok(())
}

/// Validates a zone's allowed types against its tariff table.
///
/// ## Rules
/// - At least one allowed vehicle type
/// - Every allowed type has a rate
/// - No negative rate
///
/// Rates for types the zone does not allow are permitted.
///
/// ## Example
/// ```rust
/// use parking_core::money::Money;
/// use parking_core::types::VehicleType;
/// use parking_core::validation::validate_tariffs;
///
/// let allowed = [VehicleType::Car].into_iter().collect();
/// let tariffs = [(VehicleType::Car, Money::from_cents(2000))].into_iter().collect();
/// assert!(validate_tariffs(&allowed, &tariffs).is_ok());
/// ```
pub fn validate_tariffs(
    allowed: &BTreeSet<VehicleType>,
    tariffs: &BTreeMap<VehicleType, Money>,
) -> ValidationResult<()> {
    if allowed.is_empty() {
        return Err(ValidationError::Required {
            field: "allowed_vehicle_types".to_string(),
        });
    }

    if tariffs.values().any(Money::is_negative) {
        return Err(ValidationError::MustNotBeNegative {
            field: "tariff_by_type".to_string(),
        });
    }

    if let Some(missing) = allowed.iter().find(|t| !tariffs.contains_key(t)) {
        return Err(ValidationError::MissingTariff {
            vehicle_type: missing.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_plate() {
        assert!(validate_plate("ABC123").is_ok());
        assert!(validate_plate("XYZ12A").is_ok());
        assert!(validate_plate("AB123456").is_ok());

        assert!(validate_plate("").is_err());
        assert!(validate_plate("AB12").is_err());
        assert!(validate_plate("ABC1234567").is_err());
        assert!(validate_plate("abc123").is_err());
        assert!(validate_plate("ABC 12").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Zone A", 50).is_ok());
        assert!(validate_name("name", "   ", 50).is_err());
        assert!(validate_name("name", &"A".repeat(51), 50).is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert!(validate_notes("Duplicate entry at gate 2").is_ok());
        assert!(validate_notes("").is_err());
        assert!(validate_notes(&"x".repeat(MAX_NOTES_LEN)).is_ok());
        assert!(validate_notes(&"x".repeat(MAX_NOTES_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(1).is_ok());
        assert!(validate_capacity(1000).is_ok());
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(-3).is_err());
        assert!(validate_capacity(1001).is_err());
    }

    #[test]
    fn test_validate_tariffs() {
        let allowed: BTreeSet<_> = [VehicleType::Car, VehicleType::Motorcycle]
            .into_iter()
            .collect();
        let mut tariffs: BTreeMap<_, _> = [
            (VehicleType::Car, Money::from_cents(200_000)),
            (VehicleType::Motorcycle, Money::from_cents(100_000)),
            (VehicleType::Bus, Money::from_cents(500_000)),
        ]
        .into_iter()
        .collect();
        assert!(validate_tariffs(&allowed, &tariffs).is_ok());

        tariffs.remove(&VehicleType::Motorcycle);
        assert!(matches!(
            validate_tariffs(&allowed, &tariffs),
            Err(ValidationError::MissingTariff { .. })
        ));

        tariffs.insert(VehicleType::Motorcycle, Money::from_cents(-1));
        assert!(matches!(
            validate_tariffs(&allowed, &tariffs),
            Err(ValidationError::MustNotBeNegative { .. })
        ));

        assert!(validate_tariffs(&BTreeSet::new(), &tariffs).is_err());
    }
}
