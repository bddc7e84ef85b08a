//! # Gateway Error Types
//!
//! `GatewayError` is what the gateway itself can fail with; `ApiError` is
//! what leaves the process over HTTP.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow at the Edge                               │
//! │                                                                         │
//! │  EngineError ──► GatewayError::Engine ───┐                              │
//! │                                          │                              │
//! │  deadline hit ──► DeadlineExceeded ──────┼──► ApiError { code, message }│
//! │                                          │        │                     │
//! │  bad JSON body ──────────────────────────┘        ▼                     │
//! │                                           HTTP status + JSON body       │
//! │                                                                         │
//! │  kiosk:                                                                 │
//! │    { "code": "ZONE_FULL", "message": "Zone 9f2c... has no free slot" }  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_db::{DbError, EngineError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Everything the gateway can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The engine refused the operation (after any retries).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The request deadline expired before the operation committed.
    #[error("{operation} did not complete within {timeout_ms} ms")]
    DeadlineExceeded { operation: String, timeout_ms: u64 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Startup Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Listener could not be bound or the server stopped with an error.
    #[error("Server error: {0}")]
    Server(String),
}

impl GatewayError {
    /// Returns true if the caller may resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Engine(err) => err.is_retryable(),
            GatewayError::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidConfig(_) | GatewayError::ConfigLoadFailed(_)
        )
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Error body returned by every HTTP endpoint.
///
/// ```json
/// {
///   "code": "ALREADY_PARKED",
///   "message": "Vehicle 5d1e... already has an active stay"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Machine codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Zone closed, inactive, in maintenance or on another site (409)
    ZoneUnavailable,

    /// No free slot (409)
    ZoneFull,

    /// Vehicle unknown, inactive or blocked (422)
    VehicleNotEligible,

    /// Vehicle already has an active stay (409)
    AlreadyParked,

    /// Zone does not admit or price the vehicle type (422)
    VehicleTypeNotAllowed,

    /// Occupancy record does not exist (404)
    RecordNotFound,

    /// Occupancy record already finalized or cancelled (409)
    RecordNotActive,

    /// Zone does not exist (404)
    ZoneNotFound,

    /// Host clock went backwards between entry and exit (500)
    ClockSkew,

    /// Malformed request or invalid admin input (400)
    ValidationError,

    /// Concurrent writers kept winning; resubmit (409)
    Conflict,

    /// Store unreachable; resubmit later (503)
    StoreUnavailable,

    /// Request deadline expired before commit (504)
    DeadlineExceeded,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status this code is served with.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ZoneUnavailable
            | ErrorCode::ZoneFull
            | ErrorCode::AlreadyParked
            | ErrorCode::RecordNotActive
            | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::VehicleNotEligible | ErrorCode::VehicleTypeNotAllowed => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::RecordNotFound | ErrorCode::ZoneNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::ClockSkew | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Convert engine errors to API errors.
///
/// ## Error Mapping
/// ```text
/// ZoneUnavailable         → ZONE_UNAVAILABLE          409
/// ZoneFull                → ZONE_FULL                 409
/// VehicleNotEligible      → VEHICLE_NOT_ELIGIBLE      422
/// AlreadyParked           → ALREADY_PARKED            409
/// VehicleTypeNotAllowed   → VEHICLE_TYPE_NOT_ALLOWED  422
/// RecordNotFound          → RECORD_NOT_FOUND          404
/// RecordNotActive         → RECORD_NOT_ACTIVE         409
/// ZoneNotFound            → ZONE_NOT_FOUND            404
/// ClockSkew               → CLOCK_SKEW                500
/// Validation              → VALIDATION_ERROR          400
/// Conflict                → CONFLICT                  409
/// StoreUnavailable        → STORE_UNAVAILABLE         503
/// DeadlineExceeded        → DEADLINE_EXCEEDED         504
/// Internal                → INTERNAL                  500
/// ```
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::ZoneUnavailable { .. } => ErrorCode::ZoneUnavailable,
            EngineError::ZoneFull { .. } => ErrorCode::ZoneFull,
            EngineError::VehicleNotEligible { .. } => ErrorCode::VehicleNotEligible,
            EngineError::AlreadyParked { .. } => ErrorCode::AlreadyParked,
            EngineError::VehicleTypeNotAllowed { .. } => ErrorCode::VehicleTypeNotAllowed,
            EngineError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            EngineError::RecordNotActive { .. } => ErrorCode::RecordNotActive,
            EngineError::ZoneNotFound { .. } => ErrorCode::ZoneNotFound,
            EngineError::ClockSkew { .. } => ErrorCode::ClockSkew,
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            EngineError::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            EngineError::Internal(_) => ErrorCode::Internal,
        };

        // Internal details stay in the logs.
        let message = match code {
            ErrorCode::Internal => "Internal error".to_string(),
            _ => err.to_string(),
        };

        ApiError::new(code, message)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Engine(inner) => inner.into(),
            GatewayError::DeadlineExceeded { .. } => {
                ApiError::new(ErrorCode::DeadlineExceeded, err.to_string())
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_core::ValidationError;

    #[test]
    fn test_engine_errors_keep_their_code() {
        let err: ApiError = EngineError::ZoneFull {
            zone_id: "z1".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ZoneFull);
        assert!(err.message.contains("z1"));
        assert_eq!(err.code.status(), StatusCode::CONFLICT);

        let err: ApiError = EngineError::RecordNotFound {
            record_id: "r1".into(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::NOT_FOUND);

        let err: ApiError = EngineError::Validation(ValidationError::Required {
            field: "reason".into(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err: ApiError = EngineError::Internal("corrupt tariff_by_type".into()).into();
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(!err.message.contains("tariff"));
    }

    #[test]
    fn test_code_serializes_screaming_snake_case() {
        let err = ApiError::new(ErrorCode::VehicleTypeNotAllowed, "no trucks");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VEHICLE_TYPE_NOT_ALLOWED");
        assert_eq!(json["message"], "no trucks");
    }

    #[test]
    fn test_deadline_maps_to_gateway_timeout() {
        let err = GatewayError::DeadlineExceeded {
            operation: "entry".into(),
            timeout_ms: 10,
        };
        assert!(err.is_retryable());

        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::DeadlineExceeded);
        assert_eq!(api.code.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_retryable_follows_engine() {
        assert!(GatewayError::from(EngineError::Conflict("stale".into())).is_retryable());
        assert!(!GatewayError::from(EngineError::ZoneFull {
            zone_id: "z".into()
        })
        .is_retryable());
        assert!(GatewayError::InvalidConfig("bad".into()).is_config_error());
    }
}
