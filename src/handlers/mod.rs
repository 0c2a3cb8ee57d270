//! HTTP handlers
//!
//! Each submodule exposes its handlers plus a router fragment over the shared
//! [`AppState`](crate::server::AppState); [`crate::server::build_router`]
//! merges them.

pub mod diagnostics;
pub mod setup;
pub mod status;
pub mod webhook;

pub use diagnostics::{diagnostics_router, TestResponse, TestResults};
pub use setup::{setup_router, AirtableSetupResponse, WebhookSetupResponse};
pub use status::{status_router, HealthResponse, LogsResponse, ServiceStatus};
pub use webhook::webhook_router;
