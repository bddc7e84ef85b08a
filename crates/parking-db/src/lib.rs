//! # parking-db: Storage and Transaction Engine
//!
//! SQLite storage for the parking engine and the engine that allocates and
//! releases slots on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Parking Engine Data Flow                         │
//! │                                                                         │
//! │  parking-gateway (POST /api/v1/entries)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   parking-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ ParkingEngine │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (engine.rs)  │───►│  zone         │    │  (embedded)  │  │   │
//! │  │   │               │    │  occupancy    │    │              │  │   │
//! │  │   │ entry / exit  │    │  vehicle      │    │ 001_initial  │  │   │
//! │  │   │ cancellation  │    │  site         │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼───────────────────────────┐                        │   │
//! │  │   │ Database (pool.rs)                │                        │   │
//! │  │   │ SqlitePool + transaction(|tx| ..) │                        │   │
//! │  │   └───────────────────────────────────┘                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, transaction boundary
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` and the engine's `EngineError`
//! - [`repository`] - Per-table SQL
//! - [`engine`] - `ParkingEngine`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parking_db::{Database, DbConfig, ParkingEngine};
//! use parking_core::PaymentMethod;
//!
//! let db = Database::new(DbConfig::new("parking.db")).await?;
//! let engine = ParkingEngine::new(db);
//!
//! let entry = engine.register_entry(&vehicle_id, &site_id, &zone_id, "gate-1").await?;
//! let exit = engine.register_exit(&entry.record_id, "gate-2", PaymentMethod::Card).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::ParkingEngine;
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::occupancy::OccupancyRepository;
pub use repository::site::SiteRepository;
pub use repository::vehicle::VehicleRepository;
pub use repository::zone::ZoneRepository;
