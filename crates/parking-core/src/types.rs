//! # Domain Types
//!
//! Core domain types shared by the stores, the engine and the gateway.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Site       │ 1 │      Zone       │   │    Vehicle      │       │
//! │  │  ─────────────  │──►│  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │ * │  capacity_max   │   │  plate          │       │
//! │  │  name, city     │   │  available      │   │  vehicle_type   │       │
//! │  │  state          │   │  allowed types  │   │  state          │       │
//! │  └─────────────────┘   │  tariffs        │   └────────┬────────┘       │
//! │                        │  state, version │            │                │
//! │                        └────────┬────────┘            │                │
//! │                                 │ 1                 1 │                │
//! │                                 ▼ *                 * ▼                │
//! │                        ┌─────────────────────────────────────┐         │
//! │                        │          OccupancyRecord            │         │
//! │                        │  entry_time, exit_time              │         │
//! │                        │  tariff_applied (frozen at entry)   │         │
//! │                        │  duration_minutes, total_cost       │         │
//! │                        │  state: active → finalized|cancelled│         │
//! │                        └─────────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation;

// =============================================================================
// Vehicle Type
// =============================================================================

/// Vehicle category. Zones allow and price vehicles by category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Car,
    Motorcycle,
    Bicycle,
    Truck,
    Bus,
}

impl VehicleType {
    /// Every category, in declaration order.
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Car,
        VehicleType::Motorcycle,
        VehicleType::Bicycle,
        VehicleType::Truck,
        VehicleType::Bus,
    ];

    /// Stable tag used in storage and on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Bicycle => "bicycle",
            VehicleType::Truck => "truck",
            VehicleType::Bus => "bus",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "vehicle_type".to_string(),
                allowed: VehicleType::ALL.iter().map(|t| t.to_string()).collect(),
            })
    }
}

// =============================================================================
// Site
// =============================================================================

/// Operational state of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SiteState {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

/// A parking site (campus, building) grouping several zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Site {
    pub id: String,
    pub name: String,
    pub city: String,
    pub state: SiteState,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Creates an active site with a fresh id.
    pub fn new(name: &str, city: &str, now: DateTime<Utc>) -> CoreResult<Self> {
        validation::validate_name("name", name, 100)?;
        validation::validate_name("city", city, 100)?;

        Ok(Site {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            city: city.trim().to_string(),
            state: SiteState::Active,
            created_at: now,
        })
    }
}

// =============================================================================
// Zone
// =============================================================================

/// Operational state of a zone.
///
/// `Full` is a cache of `available_slots == 0`. It is recomputed on every
/// reservation and release, never trusted as an independent fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Full,
}

impl ZoneState {
    /// Returns true if the zone may start new occupancy at all.
    ///
    /// A `Full` zone still "accepts" in this sense; the capacity check
    /// reports it separately as full rather than unavailable.
    pub const fn accepts_entries(&self) -> bool {
        !matches!(self, ZoneState::Inactive | ZoneState::Maintenance)
    }

    /// Recomputes the cached state for a new availability count.
    ///
    /// Administrative states (`Inactive`, `Maintenance`) are never touched by
    /// slot accounting.
    pub const fn with_availability(self, available_slots: i64) -> ZoneState {
        match self {
            ZoneState::Inactive | ZoneState::Maintenance => self,
            ZoneState::Active | ZoneState::Full => {
                if available_slots == 0 {
                    ZoneState::Full
                } else {
                    ZoneState::Active
                }
            }
        }
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZoneState::Active => "active",
            ZoneState::Inactive => "inactive",
            ZoneState::Maintenance => "maintenance",
            ZoneState::Full => "full",
        };
        f.write_str(s)
    }
}

/// A capacity-limited parking zone (the resource pool unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,

    /// Owning site, immutable after creation.
    pub site_id: String,

    pub name: String,

    /// Fixed at creation.
    pub capacity_max: i64,

    /// Always within `[0, capacity_max]`.
    pub available_slots: i64,

    /// Non-empty.
    pub allowed_vehicle_types: BTreeSet<VehicleType>,

    /// Hourly rate per category; covers every allowed type.
    pub tariff_by_type: BTreeMap<VehicleType, Money>,

    pub state: ZoneState,

    /// Optimistic concurrency counter, bumped on every write to the row.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Creates an empty zone: every slot free, state `Active`, version 0.
    ///
    /// ## Errors
    /// * capacity outside `1..=MAX_ZONE_CAPACITY`
    /// * no allowed vehicle type, or an allowed type without a rate
    /// * a negative rate
    pub fn new(
        site_id: &str,
        name: &str,
        capacity_max: i64,
        allowed_vehicle_types: BTreeSet<VehicleType>,
        tariff_by_type: BTreeMap<VehicleType, Money>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validation::validate_id("site_id", site_id)?;
        validation::validate_name("name", name, 100)?;
        validation::validate_capacity(capacity_max)?;
        validation::validate_tariffs(&allowed_vehicle_types, &tariff_by_type)?;

        Ok(Zone {
            id: Uuid::new_v4().to_string(),
            site_id: site_id.to_string(),
            name: name.trim().to_string(),
            capacity_max,
            available_slots: capacity_max,
            allowed_vehicle_types,
            tariff_by_type,
            state: ZoneState::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if the zone admits vehicles of this category.
    #[inline]
    pub fn allows(&self, vehicle_type: VehicleType) -> bool {
        self.allowed_vehicle_types.contains(&vehicle_type)
    }

    /// Hourly rate for a category, if priced.
    #[inline]
    pub fn tariff_for(&self, vehicle_type: VehicleType) -> Option<Money> {
        self.tariff_by_type.get(&vehicle_type).copied()
    }

    /// Number of slots currently taken.
    #[inline]
    pub fn occupied(&self) -> i64 {
        self.capacity_max - self.available_slots
    }

    #[inline]
    pub fn has_free_slot(&self) -> bool {
        self.available_slots > 0
    }
}

// =============================================================================
// Vehicle
// =============================================================================

/// Operational state of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    #[default]
    Active,
    Inactive,
    Blocked,
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleState::Active => "active",
            VehicleState::Inactive => "inactive",
            VehicleState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// A registered vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Vehicle {
    pub id: String,
    pub plate: String,
    pub owner_id: String,
    pub vehicle_type: VehicleType,
    pub state: VehicleState,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Registers an active vehicle with a fresh id.
    pub fn new(
        plate: &str,
        owner_id: &str,
        vehicle_type: VehicleType,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validation::validate_plate(plate)?;
        validation::validate_id("owner_id", owner_id)?;

        Ok(Vehicle {
            id: Uuid::new_v4().to_string(),
            plate: plate.to_string(),
            owner_id: owner_id.to_string(),
            vehicle_type,
            state: VehicleState::Active,
            created_at: now,
        })
    }

    /// Only active vehicles may start a new occupancy.
    #[inline]
    pub fn can_enter(&self) -> bool {
        self.state == VehicleState::Active
    }
}

// =============================================================================
// Occupancy Record
// =============================================================================

/// Lifecycle of a parking session.
///
/// ```text
///   Active ──exit──► Finalized
///      │
///      └──void──► Cancelled
/// ```
/// Both terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyState {
    #[default]
    Active,
    Finalized,
    Cancelled,
}

impl fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OccupancyState::Active => "active",
            OccupancyState::Finalized => "finalized",
            OccupancyState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How a finalized stay was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    MobileApp,
}

/// One vehicle visit to one zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OccupancyRecord {
    pub id: String,
    pub vehicle_id: String,
    pub site_id: String,
    pub zone_id: String,
    pub entry_operator_id: String,
    pub exit_operator_id: Option<String>,

    /// Set once at creation.
    pub entry_time: DateTime<Utc>,

    /// Set exactly once at exit.
    pub exit_time: Option<DateTime<Utc>>,

    /// Source of truth for the stay length; hours are derived for display.
    pub duration_minutes: Option<i64>,

    /// Hourly rate frozen at entry.
    pub tariff_applied_cents: i64,

    pub total_cost_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub state: OccupancyState,
}

impl OccupancyRecord {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == OccupancyState::Active
    }

    #[inline]
    pub fn tariff_applied(&self) -> Money {
        Money::from_cents(self.tariff_applied_cents)
    }

    #[inline]
    pub fn total_cost(&self) -> Option<Money> {
        self.total_cost_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Engine Results
// =============================================================================

/// Success payload of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EntryReceipt {
    pub record_id: String,
    pub plate: String,
    pub zone_name: String,
    pub tariff_applied: Money,
    /// Zone availability right after this reservation committed.
    pub available_slots: i64,
    #[ts(as = "String")]
    pub entry_time: DateTime<Utc>,
}

/// Success payload of an exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExitReceipt {
    pub record_id: String,
    pub duration_minutes: i64,
    /// Display only, two decimals.
    pub duration_hours: f64,
    pub billed_hours: i64,
    pub total_cost: Money,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub exit_time: DateTime<Utc>,
}

/// Success payload of an administrative cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CancellationReceipt {
    pub record_id: String,
    pub available_slots: i64,
}

/// Snapshot comparing a zone counter with its active records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAudit {
    pub zone_id: String,
    pub capacity_max: i64,
    pub available_slots: i64,
    pub active_records: i64,
}

impl ZoneAudit {
    /// `available_slots == capacity_max - active_records` and in bounds.
    pub fn is_consistent(&self) -> bool {
        self.available_slots >= 0
            && self.available_slots <= self.capacity_max
            && self.available_slots == self.capacity_max - self.active_records
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(available: i64, state: ZoneState) -> Zone {
        let now = Utc::now();
        Zone {
            id: "zone-a".to_string(),
            site_id: "site-1".to_string(),
            name: "A".to_string(),
            capacity_max: 10,
            available_slots: available,
            allowed_vehicle_types: [VehicleType::Car].into_iter().collect(),
            tariff_by_type: [(VehicleType::Car, Money::from_cents(2000))]
                .into_iter()
                .collect(),
            state,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_vehicle_type_round_trip_through_str() {
        for t in VehicleType::ALL {
            assert_eq!(t.as_str().parse::<VehicleType>().unwrap(), t);
        }
        assert_eq!(" Bus ".parse::<VehicleType>().unwrap(), VehicleType::Bus);
        assert!("tractor".parse::<VehicleType>().is_err());
    }

    #[test]
    fn test_zone_state_accepts_entries() {
        assert!(ZoneState::Active.accepts_entries());
        assert!(ZoneState::Full.accepts_entries());
        assert!(!ZoneState::Inactive.accepts_entries());
        assert!(!ZoneState::Maintenance.accepts_entries());
    }

    #[test]
    fn test_full_state_tracks_availability() {
        assert_eq!(ZoneState::Active.with_availability(0), ZoneState::Full);
        assert_eq!(ZoneState::Active.with_availability(3), ZoneState::Active);
        assert_eq!(ZoneState::Full.with_availability(1), ZoneState::Active);
        assert_eq!(ZoneState::Full.with_availability(0), ZoneState::Full);
    }

    #[test]
    fn test_administrative_state_survives_slot_accounting() {
        assert_eq!(ZoneState::Maintenance.with_availability(0), ZoneState::Maintenance);
        assert_eq!(ZoneState::Inactive.with_availability(5), ZoneState::Inactive);
    }

    #[test]
    fn test_zone_helpers() {
        let z = zone(4, ZoneState::Active);
        assert!(z.allows(VehicleType::Car));
        assert!(!z.allows(VehicleType::Motorcycle));
        assert_eq!(z.tariff_for(VehicleType::Car), Some(Money::from_cents(2000)));
        assert_eq!(z.tariff_for(VehicleType::Bus), None);
        assert_eq!(z.occupied(), 6);
        assert!(z.has_free_slot());
        assert!(!zone(0, ZoneState::Full).has_free_slot());
    }

    #[test]
    fn test_zone_audit_consistency() {
        let audit = ZoneAudit {
            zone_id: "z".to_string(),
            capacity_max: 5,
            available_slots: 3,
            active_records: 2,
        };
        assert!(audit.is_consistent());

        let drifted = ZoneAudit {
            active_records: 1,
            ..audit
        };
        assert!(!drifted.is_consistent());
    }

    #[test]
    fn test_new_zone_starts_empty() {
        let z = Zone::new(
            "site-1",
            " Basement ",
            25,
            [VehicleType::Car].into_iter().collect(),
            [(VehicleType::Car, Money::from_cents(1500))].into_iter().collect(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(z.name, "Basement");
        assert_eq!(z.available_slots, 25);
        assert_eq!(z.state, ZoneState::Active);
        assert_eq!(z.version, 0);
    }

    #[test]
    fn test_new_zone_rejects_unpriced_type() {
        let err = Zone::new(
            "site-1",
            "A",
            10,
            [VehicleType::Car, VehicleType::Bus].into_iter().collect(),
            [(VehicleType::Car, Money::from_cents(1500))].into_iter().collect(),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            crate::CoreError::Validation(ValidationError::MissingTariff { .. })
        ));
    }

    #[test]
    fn test_new_vehicle_checks_plate() {
        let v = Vehicle::new("ABC123", "owner-1", VehicleType::Motorcycle, Utc::now()).unwrap();
        assert!(v.can_enter());
        assert!(Vehicle::new("abc-12", "owner-1", VehicleType::Car, Utc::now()).is_err());
    }

    #[test]
    fn test_payment_method_serializes_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::MobileApp).unwrap();
        assert_eq!(json, "\"mobile_app\"");
    }
}
