//! # parking-core: Pure Business Logic for the Parking Engine
//!
//! Every rule that can be expressed without touching storage lives here:
//! domain types, integer money, billing math and eligibility checks.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Parking Engine Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Kiosks / Operator Terminals (HTTP)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                parking-gateway (retry, HTTP API)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          parking-db (zone store, record store, engine)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ parking-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  billing  │  │ validation│  │   │
//! │  │   │   Zone    │  │   Money   │  │ duration  │  │   plates  │  │   │
//! │  │   │  Vehicle  │  │           │  │   cost    │  │   zones   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Site, Zone, Vehicle, OccupancyRecord)
//! - [`money`] - Money type with integer arithmetic
//! - [`billing`] - Stay duration and cost computation
//! - [`clock`] - Time source abstraction (system clock, fixed clock)
//! - [`error`] - Domain error types
//! - [`validation`] - Structural checks for plates and zone definitions
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use parking_core::billing::compute_charge;
//! use parking_core::money::Money;
//!
//! let entry = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
//! let exit = Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap();
//!
//! let charge = compute_charge(entry, exit, Money::from_major_minor(2000, 0)).unwrap();
//! assert_eq!(charge.duration_minutes, 90);
//! assert_eq!(charge.billed_hours, 2);
//! assert_eq!(charge.total_cost, Money::from_major_minor(4000, 0));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod clock;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use billing::Charge;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest capacity a single zone may be created with.
pub const MAX_ZONE_CAPACITY: i64 = 1000;

/// Remark stored on records opened through the normal entry path.
pub const AUTOMATIC_ENTRY_NOTE: &str = "Entry registered automatically";
