//! Setup instructions for the Stripe webhook and the Airtable table.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

use crate::config::{DEFAULT_AIRTABLE_BASE_ID, DEFAULT_AIRTABLE_TABLE};
use crate::ledger::{Column, COLUMNS};
use crate::server::AppState;
use crate::stripe::StripeEventType;

/// Path Stripe should deliver webhooks to
pub const WEBHOOK_PATH: &str = "/webhook/stripe";

/// Response for `/webhook/setup`
#[derive(Debug, Clone, Serialize)]
pub struct WebhookSetupResponse {
    /// Callback URL to register in the Stripe dashboard
    pub webhook_url: String,
    /// Event types to subscribe to
    pub events: Vec<&'static str>,
    /// Whether a signing secret is configured
    pub configured: bool,
    /// Step-by-step instructions
    pub instructions: Vec<String>,
}

/// Response for `/airtable/setup`
#[derive(Debug, Clone, Serialize)]
pub struct AirtableSetupResponse {
    /// Base the relay writes to
    pub base_id: String,
    /// Table the relay writes to
    pub table_name: String,
    /// Whether an API key is configured
    pub configured: bool,
    /// Columns the table needs
    pub fields: Vec<Column>,
    /// Step-by-step instructions
    pub instructions: Vec<String>,
}

/// Compute the public webhook URL.
///
/// `PUBLIC_URL` wins. Otherwise the URL is rebuilt from the request's
/// `X-Forwarded-Proto` (default `http`) and `Host` headers.
pub fn webhook_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = public_url {
        return format!("{}{}", base.trim_end_matches('/'), WEBHOOK_PATH);
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{proto}://{host}{WEBHOOK_PATH}")
}

/// # Route
/// `GET /webhook/setup`
#[instrument(skip_all)]
pub async fn webhook_setup_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let url = webhook_url(state.config.server.public_url.as_deref(), &headers);
    let events: Vec<_> = StripeEventType::subscribed()
        .iter()
        .map(StripeEventType::as_str)
        .collect();

    let instructions = vec![
        "Open the Stripe Dashboard and go to Developers > Webhooks".to_string(),
        "Click \"Add endpoint\"".to_string(),
        format!("Set the endpoint URL to {url}"),
        format!("Select the events: {}", events.join(", ")),
        "Copy the endpoint signing secret (whsec_...) into STRIPE_WEBHOOK_SECRET".to_string(),
        "Restart the relay and check /health reports webhook as configured".to_string(),
    ];

    Json(WebhookSetupResponse {
        webhook_url: url,
        events,
        configured: state.dispatcher.accepts_webhooks(),
        instructions,
    })
}

/// # Route
/// `GET /airtable/setup`
#[instrument(skip_all)]
pub async fn airtable_setup_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (base_id, table_name) = match &state.config.airtable {
        Some(airtable) => (airtable.base_id.clone(), airtable.table_name.clone()),
        None => (
            DEFAULT_AIRTABLE_BASE_ID.to_string(),
            DEFAULT_AIRTABLE_TABLE.to_string(),
        ),
    };

    let instructions = vec![
        format!("Create (or open) the Airtable base {base_id}"),
        format!("Add a table named \"{table_name}\" with the listed fields"),
        "Use \"Payment ID\" as the primary field".to_string(),
        "Give the \"Status\" field a \"Failed\" option".to_string(),
        "Create a personal access token with data.records:write on the base".to_string(),
        "Set AIRTABLE_API_KEY (and AIRTABLE_BASE_ID / AIRTABLE_TABLE_NAME if different)"
            .to_string(),
    ];

    Json(AirtableSetupResponse {
        base_id,
        table_name,
        configured: state.dispatcher.ledger().is_configured(),
        fields: COLUMNS.to_vec(),
        instructions,
    })
}

/// Routes for `/webhook/setup` and `/airtable/setup`.
pub fn setup_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::get;

    axum::Router::new()
        .route("/webhook/setup", get(webhook_setup_handler))
        .route("/airtable/setup", get(airtable_setup_handler))
}
