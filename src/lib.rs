//! Payment Alerts - Stripe Payment Failure Relay
//!
//! This crate receives Stripe payment-failure webhooks, enriches them with
//! customer data, records each failure to an Airtable table and emails an
//! alert. Every significant step lands in a bounded in-memory activity log.
//!
//! # Features
//!
//! - **Webhook Intake**: HMAC-SHA256 signature verification on the raw body
//! - **Enrichment**: best-effort customer lookup through the Stripe API
//! - **Ledger**: one Airtable row per failure
//! - **Alerts**: plain text + HTML email over SMTP
//! - **Activity Log**: newest-first ring buffer exposed on `/logs`
//!
//! # Architecture
//!
//! ```text
//! Stripe ──▶ POST /webhook/stripe ──▶ IntakeDispatcher
//!                                          │
//!                                          ▼
//!                                  CustomerResolver (Stripe API)
//!                                          │
//!                             ┌────────────┴────────────┐
//!                             ▼                         ▼
//!                      LedgerRecorder            AlertNotifier
//!                        (Airtable)                 (SMTP)
//!                             │                         │
//!                             └────────────┬────────────┘
//!                                          ▼
//!                                     ActivityLog
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use payment_alerts::{server, AppConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let state = Arc::new(server::AppState::from_config(config)?);
//!     server::serve(state).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod activity;
pub mod alert;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod failure;
pub mod handlers;
pub mod ledger;
pub mod server;
pub mod stripe;

// Re-exports for convenience
pub use activity::{ActivityLog, LogEntry, LogLevel};
pub use alert::{AlertMessage, AlertNotifier, MailTransport};
pub use config::AppConfig;
pub use dispatch::{DeliveryReport, DispatchOutcome, IntakeDispatcher};
pub use error::{Error, Result};
pub use failure::FailureEvent;
pub use ledger::LedgerRecorder;
pub use server::{build_router, AppState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
