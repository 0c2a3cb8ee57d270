//! Synthetic end-to-end exercise.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::dispatch::DeliveryReport;
use crate::failure::FailureEvent;
use crate::server::AppState;

/// Payment id prefix for synthetic failures
pub const TEST_PAYMENT_PREFIX: &str = "test_payment_intent_";

/// Fallback email when no alert recipient is configured
pub const TEST_CUSTOMER_EMAIL: &str = "test@example.com";

/// Response for `POST /test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    /// The exercise ran; delivery outcomes are in `results`
    pub success: bool,
    /// Per-destination outcome
    pub results: TestResults,
    /// RFC 3339 timestamp of the run
    pub timestamp: String,
}

/// `"success"` or `"failed"` per destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    /// Airtable outcome
    pub airtable: String,
    /// Email outcome
    pub email: String,
}

impl From<DeliveryReport> for TestResults {
    fn from(report: DeliveryReport) -> Self {
        let label = |ok: bool| if ok { "success" } else { "failed" }.to_string();
        Self {
            airtable: label(report.ledger),
            email: label(report.alert),
        }
    }
}

/// Build the synthetic failure sent by `POST /test`.
pub fn test_failure(recipient: Option<&str>) -> FailureEvent {
    FailureEvent {
        payment_id: format!("{TEST_PAYMENT_PREFIX}{}", Utc::now().timestamp_millis()),
        customer_email: recipient.unwrap_or(TEST_CUSTOMER_EMAIL).to_string(),
        customer_id: "cus_test".to_string(),
        amount_minor_units: 2000,
        currency: "usd".to_string(),
        failure_code: Some("card_declined".to_string()),
        failure_message: Some("Your card was declined.".to_string()),
    }
}

/// # Route
/// `POST /test`
#[instrument(skip_all)]
pub async fn test_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dispatcher = &state.dispatcher;
    let failure = test_failure(dispatcher.notifier().recipient());

    state.activity.info(
        "Test payment failure triggered",
        Some(json!({ "paymentId": failure.payment_id })),
    );

    let report = dispatcher.deliver(&failure).await;
    dispatcher.log_report(&failure, report);

    Json(TestResponse {
        success: true,
        results: report.into(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Route for `/test`.
pub fn diagnostics_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::post;

    axum::Router::new().route("/test", post(test_handler))
}
