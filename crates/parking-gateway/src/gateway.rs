//! # Request Gateway
//!
//! The single entry point callers use to drive the engine. Adds two things
//! the engine deliberately does not do:
//!
//! - **Bounded retries** for `Conflict` / `StoreUnavailable`, each attempt a
//!   fresh transaction (see [`crate::retry`])
//! - **A request deadline** shared by every attempt. It bounds the wait for a
//!   connection, the wait for the write lock and the transaction body, but
//!   never the COMMIT: an operation that reached COMMIT is reported with its
//!   real outcome.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  deadline = now + request_timeout                                       │
//! │  retry.run(|| engine.until(deadline).register_entry(..))                │
//! │                                                                         │
//! │  deadline hit before COMMIT ──► rollback ──► DeadlineExceeded           │
//! │  Err(e)                     ──► GatewayError::Engine(e)                 │
//! │  Ok(r)                      ──► r (committed)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use parking_core::{CancellationReceipt, EntryReceipt, ExitReceipt, PaymentMethod, Zone};
use parking_db::{Database, EngineError, EngineResult, ParkingEngine};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::retry::RetryPolicy;

/// Retrying, deadline-bounded front for [`ParkingEngine`].
///
/// Cheap to clone; clones share the engine's pool.
#[derive(Debug, Clone)]
pub struct Gateway {
    engine: ParkingEngine,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl Gateway {
    pub fn new(engine: ParkingEngine, retry: RetryPolicy, request_timeout: Duration) -> Self {
        Gateway {
            engine,
            retry,
            request_timeout,
        }
    }

    /// Opens the database described by `config` and wraps a new engine.
    pub async fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let db = Database::new(config.database.db_config()).await?;

        info!(
            max_attempts = config.retry.max_attempts,
            request_timeout_ms = config.server.request_timeout_ms,
            "Gateway ready"
        );

        Ok(Gateway::new(
            ParkingEngine::new(db),
            RetryPolicy::from_settings(&config.retry),
            config.server.request_timeout(),
        ))
    }

    pub fn engine(&self) -> &ParkingEngine {
        &self.engine
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub async fn register_entry(
        &self,
        vehicle_id: &str,
        site_id: &str,
        zone_id: &str,
        operator_id: &str,
    ) -> GatewayResult<EntryReceipt> {
        let engine = &self.engine.until(self.deadline());
        let result = self
            .retry
            .run("entry", move || {
                engine.register_entry(vehicle_id, site_id, zone_id, operator_id)
            })
            .await;
        self.finish("entry", result)
    }

    pub async fn register_exit(
        &self,
        record_id: &str,
        operator_id: &str,
        payment_method: PaymentMethod,
    ) -> GatewayResult<ExitReceipt> {
        let engine = &self.engine.until(self.deadline());
        let result = self
            .retry
            .run("exit", move || {
                engine.register_exit(record_id, operator_id, payment_method)
            })
            .await;
        self.finish("exit", result)
    }

    pub async fn register_cancellation(
        &self,
        record_id: &str,
        operator_id: &str,
        reason: &str,
    ) -> GatewayResult<CancellationReceipt> {
        let engine = &self.engine.until(self.deadline());
        let result = self
            .retry
            .run("cancellation", move || {
                engine.register_cancellation(record_id, operator_id, reason)
            })
            .await;
        self.finish("cancellation", result)
    }

    /// Reads are not retried; they never conflict and commit nothing.
    pub async fn zone(&self, zone_id: &str) -> GatewayResult<Zone> {
        match tokio::time::timeout(self.request_timeout, self.engine.zone(zone_id)).await {
            Ok(result) => self.finish("zone", result),
            Err(_) => self.finish("zone", Err(EngineError::DeadlineExceeded)),
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.engine.database().health_check().await
    }

    // =========================================================================
    // Deadline
    // =========================================================================

    fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }

    /// Converts an engine outcome, naming the operation when time ran out.
    fn finish<T>(&self, operation: &str, result: EngineResult<T>) -> GatewayResult<T> {
        result.map_err(|err| match err {
            EngineError::DeadlineExceeded => {
                let timeout_ms = self.request_timeout.as_millis() as u64;
                warn!(operation, timeout_ms, "Request deadline exceeded before commit");
                GatewayError::DeadlineExceeded {
                    operation: operation.to_string(),
                    timeout_ms,
                }
            }
            other => GatewayError::Engine(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_core::{Money, Site, Vehicle, VehicleType};
    use parking_db::DbConfig;

    struct Fixture {
        gateway: Gateway,
        site: Site,
        zone: Zone,
    }

    async fn fixture(capacity: i64) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = chrono::Utc::now();

        let site = Site::new("Harbor Mall", "Cartagena", now).unwrap();
        db.sites().insert(&site).await.unwrap();

        let zone = Zone::new(
            &site.id,
            "Level 1",
            capacity,
            [VehicleType::Car].into_iter().collect(),
            [(VehicleType::Car, Money::from_major_minor(2000, 0))]
                .into_iter()
                .collect(),
            now,
        )
        .unwrap();
        db.zones().insert(&zone).await.unwrap();

        let gateway = Gateway::new(
            ParkingEngine::new(db),
            RetryPolicy::default(),
            Duration::from_secs(5),
        );

        Fixture {
            gateway,
            site,
            zone,
        }
    }

    impl Fixture {
        async fn vehicle(&self, plate: &str) -> Vehicle {
            let v = Vehicle::new(plate, "owner-7", VehicleType::Car, chrono::Utc::now()).unwrap();
            self.gateway
                .engine()
                .database()
                .vehicles()
                .insert(&v)
                .await
                .unwrap();
            v
        }
    }

    #[tokio::test]
    async fn test_entry_then_exit_through_gateway() {
        let fx = fixture(2).await;
        let car = fx.vehicle("ABC123").await;

        let entry = fx
            .gateway
            .register_entry(&car.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap();
        assert_eq!(entry.available_slots, 1);

        let exit = fx
            .gateway
            .register_exit(&entry.record_id, "gate-2", PaymentMethod::Cash)
            .await
            .unwrap();
        assert_eq!(exit.billed_hours, 1);

        let zone = fx.gateway.zone(&fx.zone.id).await.unwrap();
        assert_eq!(zone.available_slots, 2);
    }

    #[tokio::test]
    async fn test_business_rejection_passes_through() {
        let fx = fixture(1).await;
        let first = fx.vehicle("ABC123").await;
        let second = fx.vehicle("XYZ789").await;

        fx.gateway
            .register_entry(&first.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap();

        let err = fx
            .gateway
            .register_entry(&second.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Engine(EngineError::ZoneFull { .. })
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancellation_returns_the_slot() {
        let fx = fixture(1).await;
        let car = fx.vehicle("ABC123").await;

        let entry = fx
            .gateway
            .register_entry(&car.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap();

        let receipt = fx
            .gateway
            .register_cancellation(&entry.record_id, "supervisor-1", "Duplicate ticket")
            .await
            .unwrap();
        assert_eq!(receipt.available_slots, 1);
    }

    #[tokio::test]
    async fn test_deadline_before_commit_leaves_lot_untouched() {
        let fx = fixture(1).await;
        let car = fx.vehicle("ABC123").await;
        let gateway = Gateway::new(
            fx.gateway.engine().clone(),
            RetryPolicy::default(),
            Duration::from_millis(100),
        );

        // The only pooled connection is busy in another write transaction.
        let blocker = fx
            .gateway
            .engine()
            .database()
            .pool()
            .begin_with("BEGIN IMMEDIATE")
            .await
            .unwrap();

        let err = gateway
            .register_entry(&car.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::DeadlineExceeded { timeout_ms: 100, .. }
        ));
        assert!(err.is_retryable());

        blocker.rollback().await.unwrap();

        let zone = fx.gateway.zone(&fx.zone.id).await.unwrap();
        assert_eq!(zone.available_slots, 1);
        assert_eq!(zone.version, fx.zone.version);

        // Resubmitting is safe: nothing was committed the first time.
        let entry = gateway
            .register_entry(&car.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap();
        assert_eq!(entry.available_slots, 0);
    }

    #[tokio::test]
    async fn test_committed_exit_is_reported_even_near_deadline() {
        let fx = fixture(1).await;
        let car = fx.vehicle("ABC123").await;
        let entry = fx
            .gateway
            .register_entry(&car.id, &fx.site.id, &fx.zone.id, "gate-1")
            .await
            .unwrap();

        let gateway = Gateway::new(
            fx.gateway.engine().clone(),
            RetryPolicy::no_retry(),
            Duration::from_millis(250),
        );
        let exit = gateway
            .register_exit(&entry.record_id, "gate-2", PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(exit.record_id, entry.record_id);

        let record = gateway.engine().record(&entry.record_id).await.unwrap();
        assert!(!record.is_active());
        assert_eq!(record.total_cost(), Some(exit.total_cost));
    }

    #[tokio::test]
    async fn test_unknown_zone() {
        let fx = fixture(1).await;
        let err = fx.gateway.zone("missing").await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Engine(EngineError::ZoneNotFound { .. })
        ));
    }
}
