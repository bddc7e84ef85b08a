//! # Occupancy Record Repository
//!
//! One row per vehicle visit.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Record Lifecycle                                  │
//! │                                                                         │
//! │  1. ENTRY                                                              │
//! │     └── create() → state = active, tariff frozen, exit fields NULL     │
//! │                                                                         │
//! │  2a. EXIT                                                              │
//! │     └── finalize() → state = finalized, exit_time, duration, cost,     │
//! │                      payment method, exit operator                     │
//! │                                                                         │
//! │  2b. VOID                                                              │
//! │     └── cancel() → state = cancelled, no cost                          │
//! │                                                                         │
//! │  Both writes match `state = 'active'`, so a record closes once.        │
//! │  The partial index idx_occupancy_one_active_per_vehicle keeps a        │
//! │  vehicle from holding two active rows.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use parking_core::{Money, OccupancyRecord, PaymentMethod};

const RECORD_COLUMNS: &str = "id, vehicle_id, site_id, zone_id, entry_operator_id, \
     exit_operator_id, entry_time, exit_time, duration_minutes, tariff_applied_cents, \
     total_cost_cents, payment_method, notes, state";

/// Billing outcome written when a record is closed by an exit.
#[derive(Debug, Clone)]
pub struct Finalization<'a> {
    pub record_id: &'a str,
    pub exit_operator_id: &'a str,
    pub exit_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub total_cost: Money,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Inserts a new record and returns its id.
pub async fn create(conn: &mut SqliteConnection, record: &OccupancyRecord) -> DbResult<String> {
    debug!(
        id = %record.id,
        vehicle_id = %record.vehicle_id,
        zone_id = %record.zone_id,
        "Creating occupancy record"
    );

    sqlx::query(
        r#"
        INSERT INTO occupancy_records (
            id, vehicle_id, site_id, zone_id,
            entry_operator_id, exit_operator_id,
            entry_time, exit_time, duration_minutes,
            tariff_applied_cents, total_cost_cents, payment_method,
            notes, state
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&record.id)
    .bind(&record.vehicle_id)
    .bind(&record.site_id)
    .bind(&record.zone_id)
    .bind(&record.entry_operator_id)
    .bind(&record.exit_operator_id)
    .bind(record.entry_time)
    .bind(record.exit_time)
    .bind(record.duration_minutes)
    .bind(record.tariff_applied_cents)
    .bind(record.total_cost_cents)
    .bind(record.payment_method)
    .bind(&record.notes)
    .bind(record.state)
    .execute(&mut *conn)
    .await?;

    Ok(record.id.clone())
}

pub async fn fetch(conn: &mut SqliteConnection, record_id: &str) -> DbResult<Option<OccupancyRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM occupancy_records WHERE id = ?1");

    let record: Option<OccupancyRecord> = sqlx::query_as(&sql)
        .bind(record_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(record)
}

/// The vehicle's open stay, if any.
pub async fn find_active_by_vehicle(
    conn: &mut SqliteConnection,
    vehicle_id: &str,
) -> DbResult<Option<OccupancyRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM occupancy_records WHERE vehicle_id = ?1 AND state = 'active'"
    );

    let record: Option<OccupancyRecord> = sqlx::query_as(&sql)
        .bind(vehicle_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(record)
}

/// Closes an active record with its billing outcome.
///
/// ## Errors
/// * `NotFound` - no such record
/// * `NotActive` - already finalized or cancelled; nothing is written
pub async fn finalize(conn: &mut SqliteConnection, exit: &Finalization<'_>) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE occupancy_records SET
            state = 'finalized',
            exit_time = ?2,
            exit_operator_id = ?3,
            duration_minutes = ?4,
            total_cost_cents = ?5,
            payment_method = ?6
        WHERE id = ?1 AND state = 'active'
        "#,
    )
    .bind(exit.record_id)
    .bind(exit.exit_time)
    .bind(exit.exit_operator_id)
    .bind(exit.duration_minutes)
    .bind(exit.total_cost.cents())
    .bind(exit.payment_method)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(closed_or_missing(conn, exit.record_id).await);
    }

    Ok(())
}

/// Voids an active record without billing it.
///
/// `reason` replaces the record's notes.
pub async fn cancel(
    conn: &mut SqliteConnection,
    record_id: &str,
    operator_id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE occupancy_records SET
            state = 'cancelled',
            exit_time = ?2,
            exit_operator_id = ?3,
            notes = ?4
        WHERE id = ?1 AND state = 'active'
        "#,
    )
    .bind(record_id)
    .bind(at)
    .bind(operator_id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(closed_or_missing(conn, record_id).await);
    }

    Ok(())
}

/// Number of active records in a zone.
pub async fn count_active_in_zone(conn: &mut SqliteConnection, zone_id: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM occupancy_records WHERE zone_id = ?1 AND state = 'active'",
    )
    .bind(zone_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Explains why a conditional close matched nothing.
async fn closed_or_missing(conn: &mut SqliteConnection, record_id: &str) -> DbError {
    match fetch(conn, record_id).await {
        Ok(Some(record)) => DbError::NotActive {
            entity: "OccupancyRecord".to_string(),
            id: record_id.to_string(),
            state: record.state.to_string(),
        },
        Ok(None) => DbError::not_found("OccupancyRecord", record_id),
        Err(err) => err,
    }
}

// =============================================================================
// Pool-level Repository
// =============================================================================

/// Repository for occupancy record reads outside an engine transaction.
#[derive(Debug, Clone)]
pub struct OccupancyRepository {
    pool: SqlitePool,
}

impl OccupancyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OccupancyRepository { pool }
    }

    /// Gets a record by ID, failing with `NotFound` if absent.
    pub async fn find_by_id(&self, record_id: &str) -> DbResult<OccupancyRecord> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, record_id)
            .await?
            .ok_or_else(|| DbError::not_found("OccupancyRecord", record_id))
    }

    pub async fn find_active_by_vehicle(&self, vehicle_id: &str) -> DbResult<Option<OccupancyRecord>> {
        let mut conn = self.pool.acquire().await?;
        find_active_by_vehicle(&mut conn, vehicle_id).await
    }

    pub async fn count_active_in_zone(&self, zone_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_active_in_zone(&mut conn, zone_id).await
    }

    /// A vehicle's visits, newest first.
    pub async fn history_for_vehicle(
        &self,
        vehicle_id: &str,
        limit: i64,
    ) -> DbResult<Vec<OccupancyRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM occupancy_records \
             WHERE vehicle_id = ?1 ORDER BY entry_time DESC LIMIT ?2"
        );

        let records: Vec<OccupancyRecord> = sqlx::query_as(&sql)
            .bind(vehicle_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use parking_core::{OccupancyState, Site, Vehicle, VehicleType, Zone};
    use uuid::Uuid;

    struct Fixture {
        db: Database,
        zone: Zone,
        vehicle: Vehicle,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        let site = Site::new("North Campus", "Medellin", now).unwrap();
        db.sites().insert(&site).await.unwrap();
        let zone = Zone::new(
            &site.id,
            "A",
            10,
            [VehicleType::Car].into_iter().collect(),
            [(VehicleType::Car, Money::from_cents(200_000))].into_iter().collect(),
            now,
        )
        .unwrap();
        db.zones().insert(&zone).await.unwrap();
        let vehicle = Vehicle::new("ABC123", "owner-1", VehicleType::Car, now).unwrap();
        db.vehicles().insert(&vehicle).await.unwrap();

        Fixture { db, zone, vehicle }
    }

    fn active_record(f: &Fixture) -> OccupancyRecord {
        OccupancyRecord {
            id: Uuid::new_v4().to_string(),
            vehicle_id: f.vehicle.id.clone(),
            site_id: f.zone.site_id.clone(),
            zone_id: f.zone.id.clone(),
            entry_operator_id: "op-1".to_string(),
            exit_operator_id: None,
            entry_time: Utc::now(),
            exit_time: None,
            duration_minutes: None,
            tariff_applied_cents: 200_000,
            total_cost_cents: None,
            payment_method: None,
            notes: Some("Entry registered automatically".to_string()),
            state: OccupancyState::Active,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_active() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        let record = active_record(&f);
        let id = create(&mut conn, &record).await.unwrap();
        assert_eq!(id, record.id);

        let active = find_active_by_vehicle(&mut conn, &f.vehicle.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, id);
        assert_eq!(active.tariff_applied(), Money::from_cents(200_000));
        assert_eq!(count_active_in_zone(&mut conn, &f.zone.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_active_record_for_vehicle_rejected() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();

        create(&mut conn, &active_record(&f)).await.unwrap();
        let err = create(&mut conn, &active_record(&f)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_finalize_once() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();
        let record = active_record(&f);
        create(&mut conn, &record).await.unwrap();

        let exit = Finalization {
            record_id: &record.id,
            exit_operator_id: "op-2",
            exit_time: Utc::now(),
            duration_minutes: 90,
            total_cost: Money::from_cents(400_000),
            payment_method: PaymentMethod::Card,
        };
        finalize(&mut conn, &exit).await.unwrap();

        let stored = fetch(&mut conn, &record.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OccupancyState::Finalized);
        assert_eq!(stored.duration_minutes, Some(90));
        assert_eq!(stored.total_cost(), Some(Money::from_cents(400_000)));
        assert_eq!(stored.payment_method, Some(PaymentMethod::Card));
        assert_eq!(stored.exit_operator_id.as_deref(), Some("op-2"));

        let again = finalize(&mut conn, &exit).await.unwrap_err();
        assert!(matches!(again, DbError::NotActive { state, .. } if state == "finalized"));

        let missing = Finalization {
            record_id: "missing",
            ..exit
        };
        assert!(matches!(
            finalize(&mut conn, &missing).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_frees_vehicle_for_new_entry() {
        let f = fixture().await;
        let mut conn = f.db.pool().acquire().await.unwrap();
        let record = active_record(&f);
        create(&mut conn, &record).await.unwrap();

        cancel(&mut conn, &record.id, "admin-1", "Duplicate entry", Utc::now())
            .await
            .unwrap();

        let stored = fetch(&mut conn, &record.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OccupancyState::Cancelled);
        assert!(stored.total_cost_cents.is_none());
        assert_eq!(stored.notes.as_deref(), Some("Duplicate entry"));

        assert!(find_active_by_vehicle(&mut conn, &f.vehicle.id)
            .await
            .unwrap()
            .is_none());
        create(&mut conn, &active_record(&f)).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let f = fixture().await;
        {
            let mut conn = f.db.pool().acquire().await.unwrap();
            let mut first = active_record(&f);
            first.entry_time = Utc::now() - chrono::Duration::hours(3);
            create(&mut conn, &first).await.unwrap();
            cancel(&mut conn, &first.id, "admin-1", "Test", Utc::now())
                .await
                .unwrap();
            create(&mut conn, &active_record(&f)).await.unwrap();
        }

        let history = f.db.occupancy().history_for_vehicle(&f.vehicle.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].is_active());
        assert_eq!(history[1].state, OccupancyState::Cancelled);
    }
}
