//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                    (busy / locked / stale → Conflict)          │
//! │       ▼                                                                 │
//! │  EngineError (below) ← Entry/exit taxonomy                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (gateway) ← Serialized for kiosks                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use parking_core::{CoreError, ValidationError, VehicleType};
use thiserror::Error;

/// SQLite primary result codes we classify by number.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The row exists but is no longer in a state that allows the write.
    ///
    /// ## When This Occurs
    /// - Finalizing or cancelling a record that is already closed
    #[error("{entity} {id} is {state}")]
    NotActive {
        entity: String,
        id: String,
        state: String,
    },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second active record for the same vehicle
    /// - Duplicate plate
    /// - Duplicate zone name within a site
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. a counter leaving its bounds).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// A concurrent writer got there first.
    ///
    /// ## When This Occurs
    /// - Conditional UPDATE matched no row because the version moved
    /// - SQLite reported BUSY / LOCKED / BUSY_SNAPSHOT
    ///
    /// Always safe to retry from a fresh read.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt {field}: {reason}")]
    Corrupt { field: String, reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The transaction's deadline passed before COMMIT; it was rolled back.
    #[error("Transaction deadline exceeded before commit")]
    DeadlineExceeded,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn corrupt(field: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Corrupt {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the operation may succeed when attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Conflict(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → By result code, then by message
///     BUSY / LOCKED (+ext)    → DbError::Conflict
///     UNIQUE                  → DbError::UniqueViolation
///     FOREIGN KEY             → DbError::ForeignKeyViolation
///     CHECK                   → DbError::CheckViolation
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // Extended codes keep the primary code in the low byte
                // (BUSY_SNAPSHOT = 517 = 5 | 2 << 8).
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);

                if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED))
                    || msg.contains("database is locked")
                {
                    DbError::Conflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io_err) => DbError::ConnectionFailed(io_err.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Error
// =============================================================================

/// Why an entry, exit or zone administration request was refused.
///
/// Every variant means the transaction was rolled back and nothing was
/// persisted. Only [`EngineError::Conflict`] and
/// [`EngineError::StoreUnavailable`] are worth retrying within the same
/// deadline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Zone missing, on another site, on a closed site, or inactive/in maintenance.
    #[error("Zone {zone_id} is not accepting entries")]
    ZoneUnavailable { zone_id: String },

    #[error("Zone {zone_id} has no free slot")]
    ZoneFull { zone_id: String },

    /// Vehicle missing, inactive or blocked.
    #[error("Vehicle {vehicle_id} is not allowed to enter")]
    VehicleNotEligible { vehicle_id: String },

    #[error("Vehicle {vehicle_id} already has an active stay")]
    AlreadyParked {
        vehicle_id: String,
        record_id: Option<String>,
    },

    #[error("Zone {zone_id} does not admit vehicle type '{vehicle_type}'")]
    VehicleTypeNotAllowed {
        zone_id: String,
        vehicle_type: VehicleType,
    },

    #[error("Occupancy record not found: {record_id}")]
    RecordNotFound { record_id: String },

    #[error("Occupancy record {record_id} is {state}")]
    RecordNotActive { record_id: String, state: String },

    /// Exit would precede entry; the host clock moved backwards.
    #[error("Exit time {exit} precedes entry time {entry}")]
    ClockSkew {
        entry: DateTime<Utc>,
        exit: DateTime<Utc>,
    },

    /// Zone lookups outside the entry path.
    #[error("Zone not found: {zone_id}")]
    ZoneNotFound { zone_id: String },

    /// Administrative input rejected.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// A concurrent writer won; retry from a fresh read.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// The store could not be reached; retry later.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller's deadline passed before commit; nothing was persisted.
    #[error("Deadline exceeded before commit")]
    DeadlineExceeded,

    /// Anything else (corrupt row, unexpected constraint failure).
    #[error("Internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns true if the whole operation may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_) | EngineError::StoreUnavailable(_))
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => EngineError::Conflict(msg),
            DbError::DeadlineExceeded => EngineError::DeadlineExceeded,
            DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
                EngineError::StoreUnavailable(err.to_string())
            }
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ClockSkew { entry, exit } => EngineError::ClockSkew { entry, exit },
            CoreError::Validation(inner) => EngineError::Validation(inner),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
