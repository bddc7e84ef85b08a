//! # HTTP API
//!
//! JSON endpoints for gate kiosks and operator terminals.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/v1/entries        EntryRequest        → 201 EntryReceipt     │
//! │  POST /api/v1/exits          ExitRequest         → 200 ExitReceipt      │
//! │  POST /api/v1/cancellations  CancellationRequest → 200 Cancellation...  │
//! │  GET  /api/v1/zones/{id}                         → 200 Zone             │
//! │  GET  /health                                    → 200 "OK" / 503       │
//! │                                                                         │
//! │  Any failure → ApiError { code, message } with its mapped status        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_core::{CancellationReceipt, ExitReceipt, PaymentMethod, Zone};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::gateway::Gateway;

// =============================================================================
// Request Bodies
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRequest {
    pub vehicle_id: String,
    pub site_id: String,
    pub zone_id: String,
    pub operator_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRequest {
    pub record_id: String,
    pub operator_id: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub record_id: String,
    pub operator_id: String,
    pub reason: String,
}

// =============================================================================
// Router
// =============================================================================

/// Builds the API router over a shared gateway.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/api/v1/entries", post(create_entry))
        .route("/api/v1/exits", post(create_exit))
        .route("/api/v1/cancellations", post(create_cancellation))
        .route("/api/v1/zones/{id}", get(get_zone))
        .route("/health", get(health_handler))
        .with_state(gateway)
}

// =============================================================================
// Handlers
// =============================================================================

async fn create_entry(
    State(gateway): State<Gateway>,
    payload: Result<Json<EntryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let receipt = gateway
        .register_entry(&req.vehicle_id, &req.site_id, &req.zone_id, &req.operator_id)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn create_exit(
    State(gateway): State<Gateway>,
    payload: Result<Json<ExitRequest>, JsonRejection>,
) -> Result<Json<ExitReceipt>, ApiError> {
    let Json(req) = payload?;

    let receipt = gateway
        .register_exit(&req.record_id, &req.operator_id, req.payment_method)
        .await?;

    Ok(Json(receipt))
}

async fn create_cancellation(
    State(gateway): State<Gateway>,
    payload: Result<Json<CancellationRequest>, JsonRejection>,
) -> Result<Json<CancellationReceipt>, ApiError> {
    let Json(req) = payload?;

    let receipt = gateway
        .register_cancellation(&req.record_id, &req.operator_id, &req.reason)
        .await?;

    Ok(Json(receipt))
}

async fn get_zone(
    State(gateway): State<Gateway>,
    Path(zone_id): Path<String>,
) -> Result<Json<Zone>, ApiError> {
    Ok(Json(gateway.zone(&zone_id).await?))
}

/// Health check endpoint.
async fn health_handler(State(gateway): State<Gateway>) -> impl IntoResponse {
    if gateway.is_healthy().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::retry::RetryPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use parking_core::{EntryReceipt, Money, Site, Vehicle, VehicleType};
    use parking_db::{Database, DbConfig, ParkingEngine};
    use serde::de::DeserializeOwned;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        site: Site,
        zone: Zone,
        car: Vehicle,
        motorcycle: Vehicle,
    }

    async fn test_app() -> TestApp {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = chrono::Utc::now();

        let site = Site::new("Downtown Tower", "Bogota", now).unwrap();
        db.sites().insert(&site).await.unwrap();

        let zone = Zone::new(
            &site.id,
            "Cars only",
            1,
            [VehicleType::Car].into_iter().collect(),
            [(VehicleType::Car, Money::from_major_minor(2000, 0))]
                .into_iter()
                .collect(),
            now,
        )
        .unwrap();
        db.zones().insert(&zone).await.unwrap();

        let car = Vehicle::new("CAR001", "owner-1", VehicleType::Car, now).unwrap();
        let motorcycle = Vehicle::new("MOTO01", "owner-2", VehicleType::Motorcycle, now).unwrap();
        db.vehicles().insert(&car).await.unwrap();
        db.vehicles().insert(&motorcycle).await.unwrap();

        let gateway = Gateway::new(
            ParkingEngine::new(db),
            RetryPolicy::default(),
            Duration::from_secs(5),
        );

        TestApp {
            app: router(gateway),
            site,
            zone,
            car,
            motorcycle,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::body::Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).unwrap()
    }

    impl TestApp {
        fn entry_body(&self, vehicle: &Vehicle) -> serde_json::Value {
            serde_json::json!({
                "vehicle_id": vehicle.id,
                "site_id": self.site.id,
                "zone_id": self.zone.id,
                "operator_id": "gate-1",
            })
        }
    }

    #[tokio::test]
    async fn test_entry_and_exit_round() {
        let t = test_app().await;

        let (status, body) = send(&t.app, post_json("/api/v1/entries", t.entry_body(&t.car))).await;
        assert_eq!(status, StatusCode::CREATED);
        let entry: EntryReceipt = parse(&body);
        assert_eq!(entry.plate, "CAR001");
        assert_eq!(entry.available_slots, 0);

        let exit = serde_json::json!({
            "record_id": entry.record_id,
            "operator_id": "gate-2",
            "payment_method": "card",
        });
        let (status, body) = send(&t.app, post_json("/api/v1/exits", exit.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let receipt: ExitReceipt = parse(&body);
        assert_eq!(receipt.payment_method, PaymentMethod::Card);

        // Second exit for the same record
        let (status, body) = send(&t.app, post_json("/api/v1/exits", exit)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: ApiError = parse(&body);
        assert_eq!(err.code, ErrorCode::RecordNotActive);
    }

    #[tokio::test]
    async fn test_wrong_vehicle_type_is_unprocessable() {
        let t = test_app().await;

        let (status, body) = send(
            &t.app,
            post_json("/api/v1/entries", t.entry_body(&t.motorcycle)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let err: ApiError = parse(&body);
        assert_eq!(err.code, ErrorCode::VehicleTypeNotAllowed);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let t = test_app().await;

        let (status, body) = send(
            &t.app,
            post_json("/api/v1/entries", serde_json::json!({ "vehicle_id": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ApiError = parse(&body);
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_cancellation_endpoint() {
        let t = test_app().await;

        let (_, body) = send(&t.app, post_json("/api/v1/entries", t.entry_body(&t.car))).await;
        let entry: EntryReceipt = parse(&body);

        let (status, body) = send(
            &t.app,
            post_json(
                "/api/v1/cancellations",
                serde_json::json!({
                    "record_id": entry.record_id,
                    "operator_id": "supervisor-1",
                    "reason": "Barrier opened by mistake",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: CancellationReceipt = parse(&body);
        assert_eq!(receipt.available_slots, 1);
    }

    #[tokio::test]
    async fn test_get_zone_and_missing_zone() {
        let t = test_app().await;

        let request = Request::builder()
            .uri(format!("/api/v1/zones/{}", t.zone.id))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::OK);
        let zone: Zone = parse(&body);
        assert_eq!(zone.capacity_max, 1);

        let request = Request::builder()
            .uri("/api/v1/zones/nope")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ApiError = parse(&body);
        assert_eq!(err.code, ErrorCode::ZoneNotFound);
    }

    #[tokio::test]
    async fn test_health() {
        let t = test_app().await;

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }
}
