//! # parking-gateway: Request Gateway for the Parking Engine
//!
//! Everything between a gate kiosk and [`parking_db::ParkingEngine`]:
//! retries, deadlines, configuration and the HTTP surface.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Kiosk / Operator terminal                                              │
//! │       │  HTTP JSON                                                      │
//! │       ▼                                                                 │
//! │  ┌──────────────┐    ┌──────────────────────────────┐                   │
//! │  │  api.rs      │───►│  Gateway (gateway.rs)        │                   │
//! │  │  axum Router │    │  deadline ⟶ RetryPolicy      │                   │
//! │  └──────────────┘    └──────────────┬───────────────┘                   │
//! │                                     │ one transaction per attempt       │
//! │                                     ▼                                   │
//! │                          ParkingEngine (parking-db)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - axum routes and request bodies
//! - [`config`] - Gateway configuration (database, retry, server)
//! - [`error`] - `GatewayError` and the serialized `ApiError`
//! - [`gateway`] - Retrying, deadline-bounded front for the engine
//! - [`retry`] - Backoff policy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parking_gateway::{api, Gateway, GatewayConfig};
//!
//! let config = GatewayConfig::load(None)?;
//! let gateway = Gateway::from_config(&config).await?;
//!
//! let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
//! axum::serve(listener, api::router(gateway)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, GatewayConfig, RetrySettings, ServerSettings};
pub use error::{ApiError, ErrorCode, GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use retry::RetryPolicy;
