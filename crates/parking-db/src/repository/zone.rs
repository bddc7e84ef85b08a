//! # Zone Repository
//!
//! The resource pool store: one row per zone holding its slot counter.
//!
//! ## Slot Accounting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Conditional Counter Updates                          │
//! │                                                                         │
//! │  caller reads zone (version = 7, available = 1)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE zones SET available_slots = available_slots - 1,               │
//! │                   version = version + 1, ...                            │
//! │   WHERE id = ? AND version = 7 AND available_slots > 0                 │
//! │       │                                                                 │
//! │       ├── 1 row  → Reserved { available_slots: 0, state: full }        │
//! │       └── 0 rows → re-read: available 0 → Full                         │
//! │                            otherwise  → Conflict (version moved)       │
//! │                                                                         │
//! │  Release: available_slots = MIN(available_slots + 1, capacity_max)     │
//! │           full → active                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The free functions take a `&mut SqliteConnection` so the engine can run
//! them on its open transaction (`&mut **tx`). [`ZoneRepository`] wraps the
//! same queries for pool-level catalog reads and writes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use parking_core::{Money, VehicleType, Zone, ZoneState};

const ZONE_COLUMNS: &str = "id, site_id, name, capacity_max, available_slots, \
     allowed_vehicle_types, tariff_by_type, state, version, created_at, updated_at";

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a conditional slot reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The counter was decremented.
    Reserved {
        available_slots: i64,
        state: ZoneState,
    },
    /// No free slot.
    Full,
    /// The zone changed since the caller read it.
    Conflict,
}

/// Counter state after a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub available_slots: i64,
    pub state: ZoneState,
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `zones` row; the type sets are JSON text columns.
#[derive(Debug, sqlx::FromRow)]
struct ZoneRow {
    id: String,
    site_id: String,
    name: String,
    capacity_max: i64,
    available_slots: i64,
    allowed_vehicle_types: String,
    tariff_by_type: String,
    state: ZoneState,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ZoneRow> for Zone {
    type Error = DbError;

    fn try_from(row: ZoneRow) -> Result<Self, Self::Error> {
        let allowed_vehicle_types: BTreeSet<VehicleType> =
            serde_json::from_str(&row.allowed_vehicle_types)
                .map_err(|e| DbError::corrupt("zones.allowed_vehicle_types", e))?;
        let tariff_by_type: BTreeMap<VehicleType, Money> = serde_json::from_str(&row.tariff_by_type)
            .map_err(|e| DbError::corrupt("zones.tariff_by_type", e))?;

        Ok(Zone {
            id: row.id,
            site_id: row.site_id,
            name: row.name,
            capacity_max: row.capacity_max,
            available_slots: row.available_slots,
            allowed_vehicle_types,
            tariff_by_type,
            state: row.state,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_json<T: serde::Serialize>(field: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::corrupt(field, e))
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Loads a zone.
pub async fn fetch(conn: &mut SqliteConnection, zone_id: &str) -> DbResult<Option<Zone>> {
    let sql = format!("SELECT {ZONE_COLUMNS} FROM zones WHERE id = ?1");

    let row: Option<ZoneRow> = sqlx::query_as(&sql)
        .bind(zone_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Zone::try_from).transpose()
}

/// Lists the zones of a site, by name.
pub async fn list_by_site(conn: &mut SqliteConnection, site_id: &str) -> DbResult<Vec<Zone>> {
    let sql = format!("SELECT {ZONE_COLUMNS} FROM zones WHERE site_id = ?1 ORDER BY name");

    let rows: Vec<ZoneRow> = sqlx::query_as(&sql)
        .bind(site_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(Zone::try_from).collect()
}

/// Inserts a new zone row as given.
pub async fn insert(conn: &mut SqliteConnection, zone: &Zone) -> DbResult<()> {
    debug!(id = %zone.id, site_id = %zone.site_id, capacity = zone.capacity_max, "Inserting zone");

    let allowed = encode_json("zones.allowed_vehicle_types", &zone.allowed_vehicle_types)?;
    let tariffs = encode_json("zones.tariff_by_type", &zone.tariff_by_type)?;

    sqlx::query(
        r#"
        INSERT INTO zones (
            id, site_id, name, capacity_max, available_slots,
            allowed_vehicle_types, tariff_by_type, state, version,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&zone.id)
    .bind(&zone.site_id)
    .bind(&zone.name)
    .bind(zone.capacity_max)
    .bind(zone.available_slots)
    .bind(allowed)
    .bind(tariffs)
    .bind(zone.state)
    .bind(zone.version)
    .bind(zone.created_at)
    .bind(zone.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Takes one slot if the zone still has one and is still at `expected_version`.
///
/// Sets `full` when this takes the last slot; any other state is left as is.
pub async fn try_reserve(
    conn: &mut SqliteConnection,
    zone_id: &str,
    expected_version: i64,
    now: DateTime<Utc>,
) -> DbResult<Reservation> {
    let updated: Option<(i64, ZoneState)> = sqlx::query_as(
        r#"
        UPDATE zones SET
            available_slots = available_slots - 1,
            state = CASE
                WHEN available_slots = 1 AND state = 'active' THEN 'full'
                ELSE state
            END,
            version = version + 1,
            updated_at = ?3
        WHERE id = ?1 AND version = ?2 AND available_slots > 0
        RETURNING available_slots, state
        "#,
    )
    .bind(zone_id)
    .bind(expected_version)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((available_slots, state)) = updated {
        debug!(zone_id, available_slots, %state, "Slot reserved");
        return Ok(Reservation::Reserved {
            available_slots,
            state,
        });
    }

    // Nothing matched: tell "no slot left" apart from "someone else wrote".
    let current: Option<i64> =
        sqlx::query_scalar("SELECT available_slots FROM zones WHERE id = ?1")
            .bind(zone_id)
            .fetch_optional(&mut *conn)
            .await?;

    match current {
        None => Err(DbError::not_found("Zone", zone_id)),
        Some(0) => Ok(Reservation::Full),
        Some(_) => {
            debug!(zone_id, expected_version, "Zone version moved during reservation");
            Ok(Reservation::Conflict)
        }
    }
}

/// Returns one slot to the zone, never exceeding its capacity.
///
/// Clears `full` back to `active`; administrative states are kept.
pub async fn release(
    conn: &mut SqliteConnection,
    zone_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Released> {
    let updated: Option<(i64, ZoneState)> = sqlx::query_as(
        r#"
        UPDATE zones SET
            available_slots = MIN(available_slots + 1, capacity_max),
            state = CASE WHEN state = 'full' THEN 'active' ELSE state END,
            version = version + 1,
            updated_at = ?2
        WHERE id = ?1
        RETURNING available_slots, state
        "#,
    )
    .bind(zone_id)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let (available_slots, state) = updated.ok_or_else(|| DbError::not_found("Zone", zone_id))?;

    debug!(zone_id, available_slots, %state, "Slot released");
    Ok(Released {
        available_slots,
        state,
    })
}

/// Writes a new operational state if the zone is still at `expected_version`.
pub async fn update_state(
    conn: &mut SqliteConnection,
    zone_id: &str,
    expected_version: i64,
    state: ZoneState,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE zones SET state = ?3, version = version + 1, updated_at = ?4
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(zone_id)
    .bind(expected_version)
    .bind(state)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "zone {zone_id} changed since version {expected_version}"
        )));
    }

    Ok(())
}

/// Replaces the tariff table if the zone is still at `expected_version`.
///
/// Open records keep the rate they were admitted with.
pub async fn update_tariffs(
    conn: &mut SqliteConnection,
    zone_id: &str,
    expected_version: i64,
    tariffs: &BTreeMap<VehicleType, Money>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let encoded = encode_json("zones.tariff_by_type", tariffs)?;

    let result = sqlx::query(
        r#"
        UPDATE zones SET tariff_by_type = ?3, version = version + 1, updated_at = ?4
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(zone_id)
    .bind(expected_version)
    .bind(encoded)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "zone {zone_id} changed since version {expected_version}"
        )));
    }

    Ok(())
}

// =============================================================================
// Pool-level Repository
// =============================================================================

/// Repository for zone catalog operations outside an engine transaction.
#[derive(Debug, Clone)]
pub struct ZoneRepository {
    pool: SqlitePool,
}

impl ZoneRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ZoneRepository { pool }
    }

    /// Gets a zone by ID, failing with `NotFound` if absent.
    pub async fn get(&self, zone_id: &str) -> DbResult<Zone> {
        self.find(zone_id)
            .await?
            .ok_or_else(|| DbError::not_found("Zone", zone_id))
    }

    pub async fn find(&self, zone_id: &str) -> DbResult<Option<Zone>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, zone_id).await
    }

    pub async fn list_by_site(&self, site_id: &str) -> DbResult<Vec<Zone>> {
        let mut conn = self.pool.acquire().await?;
        list_by_site(&mut conn, site_id).await
    }

    /// Inserts a zone built with [`Zone::new`].
    pub async fn insert(&self, zone: &Zone) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, zone).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
