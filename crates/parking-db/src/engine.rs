//! # Allocation / Release Engine
//!
//! Moves slots between zones and occupancy records. Every public operation
//! runs as one [`Database::transaction`]: all of its checks and writes commit
//! together or not at all.
//!
//! ## Entry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register_entry(vehicle, site, zone, operator)                          │
//! │                                                                         │
//! │  1. zone exists, on `site`, site open, not inactive/maintenance        │
//! │                                                 else ZoneUnavailable    │
//! │  2. available_slots > 0                         else ZoneFull           │
//! │  3. vehicle exists and is active                else VehicleNotEligible │
//! │  4. vehicle has no active record                else AlreadyParked      │
//! │  5. zone admits the vehicle type                                        │
//! │                                           else VehicleTypeNotAllowed    │
//! │  6. INSERT record (active, tariff frozen)                               │
//! │  7. try_reserve(zone, version read in 1)        Full / Conflict abort   │
//! │  8. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register_exit(record, operator, payment)                               │
//! │                                                                         │
//! │  1. record exists                               else RecordNotFound     │
//! │  2. record active                               else RecordNotActive    │
//! │  3. compute_charge(entry, now, tariff_applied)  else ClockSkew          │
//! │  4. finalize record (guarded by state = active)                         │
//! │  5. release slot                                                        │
//! │  6. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never retries. A [`EngineError::Conflict`] means the attempt
//! rolled back and the caller may run the whole operation again.
//!
//! Transactions open with `BEGIN IMMEDIATE`, so entries on different zones
//! wait briefly for the write lock rather than failing each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::SqliteConnection;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, EngineError, EngineResult};
use crate::pool::Database;
use crate::repository::occupancy::{self, Finalization};
use crate::repository::zone::{self, Reservation};
use crate::repository::{site, vehicle};
use parking_core::billing::compute_charge;
use parking_core::validation::{validate_notes, validate_tariffs};
use parking_core::{
    CancellationReceipt, Clock, EntryReceipt, ExitReceipt, Money, OccupancyRecord,
    OccupancyState, PaymentMethod, SiteState, SystemClock, ValidationError, VehicleType, Zone,
    ZoneAudit, ZoneState, AUTOMATIC_ENTRY_NOTE,
};

/// The allocation/release transaction engine.
///
/// Cheap to clone. Holds no lock of its own; writers queue on SQLite's
/// write lock for the length of one short transaction, and the zone
/// `version` guard rejects any write based on a stale read.
#[derive(Clone)]
pub struct ParkingEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for ParkingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParkingEngine")
            .field("db", &self.db)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ParkingEngine {
    /// Engine on the wall clock.
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        ParkingEngine {
            db,
            clock,
            deadline: None,
        }
    }

    /// A handle whose transactions must reach COMMIT by `deadline`.
    ///
    /// Work still pending at the deadline is rolled back and reported as
    /// [`EngineError::DeadlineExceeded`]. A COMMIT already sent is awaited.
    pub fn until(&self, deadline: Instant) -> ParkingEngine {
        ParkingEngine {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Entry / Exit / Cancellation
    // =========================================================================

    /// Admits a vehicle into a zone and takes one slot.
    pub async fn register_entry(
        &self,
        vehicle_id: &str,
        site_id: &str,
        zone_id: &str,
        operator_id: &str,
    ) -> EngineResult<EntryReceipt> {
        let request = EntryRequest {
            vehicle_id: vehicle_id.to_string(),
            site_id: site_id.to_string(),
            zone_id: zone_id.to_string(),
            operator_id: operator_id.to_string(),
        };
        let clock = Arc::clone(&self.clock);

        let result = self
            .db
            .transaction_until(self.deadline, move |tx| {
                Box::pin(async move { admit(&mut **tx, clock.as_ref(), &request).await })
            })
            .await;

        match &result {
            Ok(receipt) => info!(
                record_id = %receipt.record_id,
                zone_id,
                vehicle_id,
                available_slots = receipt.available_slots,
                "Entry registered"
            ),
            Err(err) => log_rejection("entry", err),
        }

        result
    }

    /// Closes an active stay, bills it and returns its slot.
    pub async fn register_exit(
        &self,
        record_id: &str,
        operator_id: &str,
        payment_method: PaymentMethod,
    ) -> EngineResult<ExitReceipt> {
        let record_id_owned = record_id.to_string();
        let operator_id = operator_id.to_string();
        let clock = Arc::clone(&self.clock);

        let result = self
            .db
            .transaction_until(self.deadline, move |tx| {
                Box::pin(async move {
                    depart(
                        &mut **tx,
                        clock.as_ref(),
                        &record_id_owned,
                        &operator_id,
                        payment_method,
                    )
                    .await
                })
            })
            .await;

        match &result {
            Ok(receipt) => info!(
                record_id,
                duration_minutes = receipt.duration_minutes,
                billed_hours = receipt.billed_hours,
                total_cost = %receipt.total_cost,
                "Exit registered"
            ),
            Err(err) => log_rejection("exit", err),
        }

        result
    }

    /// Voids an active stay without billing it and returns its slot.
    ///
    /// `reason` replaces the record's notes.
    pub async fn register_cancellation(
        &self,
        record_id: &str,
        operator_id: &str,
        reason: &str,
    ) -> EngineResult<CancellationReceipt> {
        validate_notes(reason)?;

        let record_id_owned = record_id.to_string();
        let operator_id = operator_id.to_string();
        let reason = reason.trim().to_string();
        let clock = Arc::clone(&self.clock);

        let result = self
            .db
            .transaction_until::<_, _, EngineError>(self.deadline, move |tx| {
                Box::pin(async move {
                    let conn: &mut SqliteConnection = tx;
                    let record = load_active_record(conn, &record_id_owned).await?;
                    let now = clock.now();

                    occupancy::cancel(conn, &record.id, &operator_id, &reason, now)
                        .await
                        .map_err(closed_record_error)?;
                    let released = zone::release(conn, &record.zone_id, now).await?;

                    Ok(CancellationReceipt {
                        record_id: record.id,
                        available_slots: released.available_slots,
                    })
                })
            })
            .await;

        match &result {
            Ok(receipt) => info!(
                record_id,
                available_slots = receipt.available_slots,
                "Occupancy cancelled"
            ),
            Err(err) => log_rejection("cancellation", err),
        }

        result
    }

    // =========================================================================
    // Zone Administration
    // =========================================================================

    /// Loads a zone.
    pub async fn zone(&self, zone_id: &str) -> EngineResult<Zone> {
        self.db.zones().get(zone_id).await.map_err(|err| match err {
            DbError::NotFound { .. } => EngineError::ZoneNotFound {
                zone_id: zone_id.to_string(),
            },
            other => other.into(),
        })
    }

    /// Loads an occupancy record.
    pub async fn record(&self, record_id: &str) -> EngineResult<OccupancyRecord> {
        self.db
            .occupancy()
            .find_by_id(record_id)
            .await
            .map_err(closed_record_error)
    }

    /// Opens, closes or puts a zone into maintenance.
    ///
    /// `Full` cannot be requested; it follows from the counter. Asking for
    /// `Active` on a zone with no free slot stores `Full`.
    pub async fn set_zone_state(&self, zone_id: &str, requested: ZoneState) -> EngineResult<Zone> {
        if requested == ZoneState::Full {
            return Err(ValidationError::NotAllowed {
                field: "state".to_string(),
                allowed: ["active", "inactive", "maintenance"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }
            .into());
        }

        let zone_id_owned = zone_id.to_string();
        let clock = Arc::clone(&self.clock);

        let zone = self
            .db
            .transaction_until::<_, _, EngineError>(self.deadline, move |tx| {
                Box::pin(async move {
                    let conn: &mut SqliteConnection = tx;
                    let current = load_zone(conn, &zone_id_owned).await?;
                    let state = requested.with_availability(current.available_slots);

                    zone::update_state(conn, &current.id, current.version, state, clock.now())
                        .await?;
                    load_zone(conn, &current.id).await
                })
            })
            .await?;

        info!(zone_id, state = %zone.state, "Zone state changed");
        Ok(zone)
    }

    /// Replaces a zone's tariff table.
    ///
    /// Active records keep the rate they entered with.
    pub async fn update_tariffs(
        &self,
        zone_id: &str,
        tariffs: BTreeMap<VehicleType, Money>,
    ) -> EngineResult<Zone> {
        let zone_id_owned = zone_id.to_string();
        let clock = Arc::clone(&self.clock);

        let zone = self
            .db
            .transaction_until::<_, _, EngineError>(self.deadline, move |tx| {
                Box::pin(async move {
                    let conn: &mut SqliteConnection = tx;
                    let current = load_zone(conn, &zone_id_owned).await?;
                    validate_tariffs(&current.allowed_vehicle_types, &tariffs)?;

                    zone::update_tariffs(conn, &current.id, current.version, &tariffs, clock.now())
                        .await?;
                    load_zone(conn, &current.id).await
                })
            })
            .await?;

        info!(zone_id, version = zone.version, "Zone tariffs updated");
        Ok(zone)
    }

    /// Compares a zone's counter with its active records in one snapshot.
    pub async fn audit_zone(&self, zone_id: &str) -> EngineResult<ZoneAudit> {
        let zone_id_owned = zone_id.to_string();

        let audit = self
            .db
            .transaction_until(self.deadline, move |tx| {
                Box::pin(async move {
                    let conn: &mut SqliteConnection = tx;
                    let zone = load_zone(conn, &zone_id_owned).await?;
                    let active_records = occupancy::count_active_in_zone(conn, &zone.id).await?;

                    Ok::<_, EngineError>(ZoneAudit {
                        zone_id: zone.id,
                        capacity_max: zone.capacity_max,
                        available_slots: zone.available_slots,
                        active_records,
                    })
                })
            })
            .await?;

        if !audit.is_consistent() {
            warn!(
                zone_id,
                capacity_max = audit.capacity_max,
                available_slots = audit.available_slots,
                active_records = audit.active_records,
                "Zone counter out of step with active records"
            );
        }

        Ok(audit)
    }
}

// =============================================================================
// Units of Work
// =============================================================================

#[derive(Debug)]
struct EntryRequest {
    vehicle_id: String,
    site_id: String,
    zone_id: String,
    operator_id: String,
}

async fn admit(
    conn: &mut SqliteConnection,
    clock: &dyn Clock,
    request: &EntryRequest,
) -> EngineResult<EntryReceipt> {
    let unavailable = || EngineError::ZoneUnavailable {
        zone_id: request.zone_id.clone(),
    };

    // 1. Zone open on the requested site
    let zone = zone::fetch(conn, &request.zone_id)
        .await?
        .ok_or_else(unavailable)?;
    let site_open = site::fetch(conn, &request.site_id)
        .await?
        .is_some_and(|s| s.state == SiteState::Active);
    if zone.site_id != request.site_id || !site_open || !zone.state.accepts_entries() {
        return Err(unavailable());
    }

    // 2. Capacity
    if !zone.has_free_slot() {
        return Err(EngineError::ZoneFull {
            zone_id: zone.id.clone(),
        });
    }

    // 3. Vehicle eligibility
    let vehicle = vehicle::fetch(conn, &request.vehicle_id)
        .await?
        .filter(|v| v.can_enter())
        .ok_or_else(|| EngineError::VehicleNotEligible {
            vehicle_id: request.vehicle_id.clone(),
        })?;

    // 4. One active stay per vehicle
    if let Some(open) = occupancy::find_active_by_vehicle(conn, &vehicle.id).await? {
        return Err(EngineError::AlreadyParked {
            vehicle_id: vehicle.id,
            record_id: Some(open.id),
        });
    }

    // 5. Vehicle type admitted and priced
    let tariff = zone
        .tariff_for(vehicle.vehicle_type)
        .filter(|_| zone.allows(vehicle.vehicle_type))
        .ok_or_else(|| EngineError::VehicleTypeNotAllowed {
            zone_id: zone.id.clone(),
            vehicle_type: vehicle.vehicle_type,
        })?;

    let entry_time = clock.now();
    let record = OccupancyRecord {
        id: Uuid::new_v4().to_string(),
        vehicle_id: vehicle.id.clone(),
        site_id: zone.site_id.clone(),
        zone_id: zone.id.clone(),
        entry_operator_id: request.operator_id.clone(),
        exit_operator_id: None,
        entry_time,
        exit_time: None,
        duration_minutes: None,
        tariff_applied_cents: tariff.cents(),
        total_cost_cents: None,
        payment_method: None,
        notes: Some(AUTOMATIC_ENTRY_NOTE.to_string()),
        state: OccupancyState::Active,
    };

    // The partial unique index catches a racing entry for the same vehicle.
    occupancy::create(conn, &record)
        .await
        .map_err(|err| match err {
            DbError::UniqueViolation { .. } => EngineError::AlreadyParked {
                vehicle_id: vehicle.id.clone(),
                record_id: None,
            },
            other => other.into(),
        })?;

    let available_slots = match zone::try_reserve(conn, &zone.id, zone.version, entry_time).await? {
        Reservation::Reserved {
            available_slots, ..
        } => available_slots,
        Reservation::Full => {
            return Err(EngineError::ZoneFull {
                zone_id: zone.id.clone(),
            })
        }
        Reservation::Conflict => {
            return Err(EngineError::Conflict(format!(
                "zone {} changed since version {}",
                zone.id, zone.version
            )))
        }
    };

    Ok(EntryReceipt {
        record_id: record.id,
        plate: vehicle.plate,
        zone_name: zone.name,
        tariff_applied: tariff,
        available_slots,
        entry_time,
    })
}

async fn depart(
    conn: &mut SqliteConnection,
    clock: &dyn Clock,
    record_id: &str,
    operator_id: &str,
    payment_method: PaymentMethod,
) -> EngineResult<ExitReceipt> {
    let record = load_active_record(conn, record_id).await?;

    let exit_time = clock.now();
    let charge = compute_charge(record.entry_time, exit_time, record.tariff_applied())?;

    occupancy::finalize(
        conn,
        &Finalization {
            record_id: &record.id,
            exit_operator_id: operator_id,
            exit_time,
            duration_minutes: charge.duration_minutes,
            total_cost: charge.total_cost,
            payment_method,
        },
    )
    .await
    .map_err(closed_record_error)?;

    zone::release(conn, &record.zone_id, exit_time).await?;

    Ok(ExitReceipt {
        record_id: record.id,
        duration_minutes: charge.duration_minutes,
        duration_hours: charge.duration_hours(),
        billed_hours: charge.billed_hours,
        total_cost: charge.total_cost,
        payment_method,
        exit_time,
    })
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_zone(conn: &mut SqliteConnection, zone_id: &str) -> EngineResult<Zone> {
    zone::fetch(conn, zone_id)
        .await?
        .ok_or_else(|| EngineError::ZoneNotFound {
            zone_id: zone_id.to_string(),
        })
}

async fn load_active_record(
    conn: &mut SqliteConnection,
    record_id: &str,
) -> EngineResult<OccupancyRecord> {
    let record = occupancy::fetch(conn, record_id)
        .await?
        .ok_or_else(|| EngineError::RecordNotFound {
            record_id: record_id.to_string(),
        })?;

    if !record.is_active() {
        return Err(EngineError::RecordNotActive {
            record_id: record.id,
            state: record.state.to_string(),
        });
    }

    Ok(record)
}

fn closed_record_error(err: DbError) -> EngineError {
    match err {
        DbError::NotFound { id, .. } => EngineError::RecordNotFound { record_id: id },
        DbError::NotActive { id, state, .. } => EngineError::RecordNotActive {
            record_id: id,
            state,
        },
        other => other.into(),
    }
}

fn log_rejection(operation: &str, err: &EngineError) {
    match err {
        EngineError::Internal(_) => warn!(operation, error = %err, "Operation failed"),
        _ if err.is_retryable() => debug!(operation, error = %err, "Operation aborted, retryable"),
        _ => info!(operation, error = %err, "Operation rejected"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
