//! HTTP server assembly
//!
//! Builds the shared [`AppState`] from configuration, wires the routers from
//! [`crate::handlers`] together and runs them under axum with graceful
//! shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::activity::ActivityLog;
use crate::alert::{AlertNotifier, MailTransport};
use crate::config::AppConfig;
use crate::dispatch::IntakeDispatcher;
use crate::error::Result;
use crate::handlers;
use crate::ledger::LedgerRecorder;
use crate::stripe::{CustomerResolver, SignatureVerifier, StripeClient};

// ============================================================================
// Application State
// ============================================================================

/// Shared state handed to every handler.
///
/// Built once at startup. Configuration is never re-read afterwards; the
/// activity log is the only mutable part.
#[derive(Debug)]
pub struct AppState {
    /// Loaded configuration
    pub config: AppConfig,
    /// In-memory activity log
    pub activity: Arc<ActivityLog>,
    /// Webhook intake and fan-out
    pub dispatcher: IntakeDispatcher,
    start_time: Instant,
}

impl AppState {
    /// Build state with the SMTP mailer for alerts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or SMTP transport cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let activity = Arc::new(ActivityLog::new());
        let notifier = AlertNotifier::from_config(config.email.clone(), activity.clone())?;
        Self::assemble(config, notifier, activity)
    }

    /// Build state with an explicit mail transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_mail_transport(
        config: AppConfig,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        let activity = Arc::new(ActivityLog::new());
        let notifier =
            AlertNotifier::with_transport(config.email.clone(), transport, activity.clone());
        Self::assemble(config, notifier, activity)
    }

    fn assemble(
        config: AppConfig,
        notifier: AlertNotifier,
        activity: Arc<ActivityLog>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let verifier = config.webhook.as_ref().map(|webhook| {
            SignatureVerifier::new(webhook.signing_secret.clone(), webhook.tolerance)
        });
        let client = config
            .stripe
            .as_ref()
            .map(|stripe| StripeClient::new(stripe, http.clone()));

        let dispatcher = IntakeDispatcher::new(
            verifier,
            CustomerResolver::new(client, activity.clone()),
            LedgerRecorder::new(config.airtable.clone(), http, activity.clone()),
            notifier,
            activity.clone(),
        );

        Ok(Self {
            config,
            activity,
            dispatcher,
            start_time: Instant::now(),
        })
    }

    /// Seconds since the state was built
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Build the complete application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handlers::status::status_router())
        .merge(handlers::webhook::webhook_router())
        .merge(handlers::setup::setup_router())
        .merge(handlers::diagnostics::diagnostics_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns `Error::Io` if the listener cannot be bound or the server fails.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = SocketAddr::new(state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Payment alert relay listening");

    state.activity.info(
        "Server started",
        Some(serde_json::json!({ "address": addr.to_string() })),
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
