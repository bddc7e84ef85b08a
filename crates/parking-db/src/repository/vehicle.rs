//! # Vehicle Repository
//!
//! Registered vehicles. Plates are unique across the whole system.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use parking_core::{Vehicle, VehicleState};

const VEHICLE_COLUMNS: &str = "id, plate, owner_id, vehicle_type, state, created_at";

pub async fn fetch(conn: &mut SqliteConnection, vehicle_id: &str) -> DbResult<Option<Vehicle>> {
    let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1");

    let vehicle: Option<Vehicle> = sqlx::query_as(&sql)
        .bind(vehicle_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(vehicle)
}

/// Repository for vehicle database operations.
#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

impl VehicleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VehicleRepository { pool }
    }

    /// Gets a vehicle by ID.
    pub async fn get(&self, vehicle_id: &str) -> DbResult<Vehicle> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, vehicle_id)
            .await?
            .ok_or_else(|| DbError::not_found("Vehicle", vehicle_id))
    }

    /// Looks a vehicle up by plate (exact match, plates are stored uppercase).
    pub async fn find_by_plate(&self, plate: &str) -> DbResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE plate = ?1");

        let vehicle: Option<Vehicle> = sqlx::query_as(&sql)
            .bind(plate)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    /// Inserts a vehicle.
    ///
    /// ## Errors
    /// * `UniqueViolation` - plate already registered
    pub async fn insert(&self, vehicle: &Vehicle) -> DbResult<()> {
        debug!(id = %vehicle.id, plate = %vehicle.plate, "Inserting vehicle");

        sqlx::query(
            r#"
            INSERT INTO vehicles (id, plate, owner_id, vehicle_type, state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&vehicle.id)
        .bind(&vehicle.plate)
        .bind(&vehicle.owner_id)
        .bind(vehicle.vehicle_type)
        .bind(vehicle.state)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &vehicle.plate),
            other => other,
        })?;

        Ok(())
    }

    /// Changes a vehicle's operational state (block, deactivate, reactivate).
    ///
    /// An open stay is not affected; only future entries are.
    pub async fn set_state(&self, vehicle_id: &str, state: VehicleState) -> DbResult<()> {
        let result = sqlx::query("UPDATE vehicles SET state = ?2 WHERE id = ?1")
            .bind(vehicle_id)
            .bind(state)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vehicle", vehicle_id));
        }

        info!(vehicle_id, %state, "Vehicle state changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use parking_core::VehicleType;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vehicle = Vehicle::new("KLM456", "owner-9", VehicleType::Car, Utc::now()).unwrap();
        db.vehicles().insert(&vehicle).await.unwrap();

        let by_plate = db.vehicles().find_by_plate("KLM456").await.unwrap().unwrap();
        assert_eq!(by_plate.id, vehicle.id);
        assert_eq!(by_plate.vehicle_type, VehicleType::Car);

        assert!(db.vehicles().find_by_plate("ZZZ999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_plate_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = Vehicle::new("KLM456", "owner-9", VehicleType::Car, Utc::now()).unwrap();
        let second = Vehicle::new("KLM456", "owner-3", VehicleType::Truck, Utc::now()).unwrap();

        db.vehicles().insert(&first).await.unwrap();
        let err = db.vehicles().insert(&second).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { value, .. } if value == "KLM456"));
    }

    #[tokio::test]
    async fn test_block_vehicle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vehicle = Vehicle::new("KLM456", "owner-9", VehicleType::Car, Utc::now()).unwrap();
        db.vehicles().insert(&vehicle).await.unwrap();

        db.vehicles()
            .set_state(&vehicle.id, VehicleState::Blocked)
            .await
            .unwrap();

        let loaded = db.vehicles().get(&vehicle.id).await.unwrap();
        assert!(!loaded.can_enter());
    }
}
