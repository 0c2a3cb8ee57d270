//! Status, health and activity log handlers.
//!
//! - `/` - Service description and endpoint listing
//! - `/health` - Liveness plus per-integration configuration flags
//! - `/logs` - Most recent activity log entries
//!
//! # Example Response
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "uptime_seconds": 3600,
//!   "timestamp": "2026-01-01T12:00:00Z",
//!   "services": {
//!     "stripe": "configured",
//!     "webhook": "configured",
//!     "airtable": "missing",
//!     "email": "configured"
//!   }
//! }
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::activity::{LogEntry, DEFAULT_PAGE_SIZE};
use crate::config::Capabilities;
use crate::server::AppState;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

const DESCRIPTION: &str =
    "Relays Stripe payment failures to an Airtable ledger and an email alert";

/// Routes served by the relay, as listed on `/`
pub const ENDPOINTS: [(&str, &str); 7] = [
    ("GET /", "Service description"),
    ("GET /health", "Health check and integration status"),
    ("GET /logs", "Recent activity log entries"),
    ("POST /test", "Send a synthetic payment failure through both deliveries"),
    ("POST /webhook/stripe", "Stripe webhook intake"),
    ("GET /webhook/setup", "Stripe webhook setup instructions"),
    ("GET /airtable/setup", "Airtable table setup instructions"),
];

// ============================================================================
// Response Types
// ============================================================================

/// Service description for `/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Crate name
    pub name: String,
    /// Crate version
    pub version: String,
    /// One-line description
    pub description: String,
    /// Always "running" if responding
    pub status: String,
    /// Route to purpose
    pub endpoints: serde_json::Map<String, serde_json::Value>,
}

/// Health check response.
///
/// The relay reports healthy whenever it responds; missing credentials only
/// disable the dependent integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" if responding
    pub status: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// RFC 3339 timestamp of the check
    pub timestamp: String,
    /// Per-integration configuration status
    pub services: ServiceStatus,
}

/// Per-integration status: `"configured"` or `"missing"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Stripe API key
    pub stripe: String,
    /// Webhook signing secret
    pub webhook: String,
    /// Airtable key
    pub airtable: String,
    /// Email sender credentials
    pub email: String,
}

impl From<Capabilities> for ServiceStatus {
    fn from(caps: Capabilities) -> Self {
        let label = |enabled: bool| if enabled { "configured" } else { "missing" }.to_string();
        Self {
            stripe: label(caps.stripe),
            webhook: label(caps.webhook),
            airtable: label(caps.airtable),
            email: label(caps.email),
        }
    }
}

/// Activity log page for `/logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Newest entries first
    pub logs: Vec<LogEntry>,
    /// Entries currently retained
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Service description.
///
/// # Route
/// `GET /`
#[instrument(skip_all)]
pub async fn index_handler() -> impl IntoResponse {
    let endpoints = ENDPOINTS
        .iter()
        .map(|(route, purpose)| (route.to_string(), serde_json::Value::from(*purpose)))
        .collect();

    Json(IndexResponse {
        name: SERVER_NAME.to_string(),
        version: SERVER_VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        status: "running".to_string(),
        endpoints,
    })
}

/// Health check endpoint handler.
///
/// # Route
/// `GET /health`
///
/// # Response
/// - `200 OK` with JSON HealthResponse
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/health
/// ```
#[instrument(skip_all)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    let response = HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        services: state.config.capabilities().into(),
    };

    (StatusCode::OK, Json(response))
}

/// Recent activity.
///
/// # Route
/// `GET /logs`
#[instrument(skip_all)]
pub async fn logs_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LogsResponse {
        logs: state.activity.recent(DEFAULT_PAGE_SIZE),
        total: state.activity.len(),
    })
}

// ============================================================================
// Router Setup
// ============================================================================

/// Routes for `/`, `/health` and `/logs`.
pub fn status_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;

    axum::Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/logs", get(logs_handler))
}

// ============================================================================
// Tests
// ============================================================================
