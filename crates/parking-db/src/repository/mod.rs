//! # Repository Module
//!
//! SQL for each table, kept in one place per table.
//!
//! ## Two Entry Points per Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Engine (inside Database::transaction)                                 │
//! │       │                                                                 │
//! │       │  zone::try_reserve(&mut **tx, id, version, now)                │
//! │       │  occupancy::create(&mut **tx, &record)                         │
//! │       ▼                                                                 │
//! │  free functions taking &mut SqliteConnection                           │
//! │       ▲                                                                 │
//! │       │  db.zones().get(id)   (acquires a pooled connection)           │
//! │       │                                                                 │
//! │  Catalog / reads / seed                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SiteRepository`](site::SiteRepository) - Sites
//! - [`ZoneRepository`](zone::ZoneRepository) - Zones and their slot counters
//! - [`VehicleRepository`](vehicle::VehicleRepository) - Registered vehicles
//! - [`OccupancyRepository`](occupancy::OccupancyRepository) - Visits

pub mod occupancy;
pub mod site;
pub mod vehicle;
pub mod zone;
