//! Stripe webhook intake.
//!
//! The body is taken as raw bytes: the signature covers the exact payload
//! Stripe sent, so it must be verified before any JSON parsing.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::instrument;

use crate::error::Error;
use crate::server::AppState;
use crate::stripe::SIGNATURE_HEADER;

/// Webhook intake endpoint handler.
///
/// # Route
/// `POST /webhook/stripe`
///
/// # Response
/// - `200 OK` `{"received": true}` once the event is verified and handled,
///   whatever the delivery outcomes
/// - `400 Bad Request` `{"error": "Webhook Error: ..."}` on verification failure
/// - `503 Service Unavailable` when no signing secret is configured
/// - `500 Internal Server Error` `{"error": "Webhook handler failed"}`
#[instrument(skip_all)]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.dispatcher.dispatch(&body, signature).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(e) => error_response(&state, e),
    }
}

fn error_response(state: &AppState, err: Error) -> Response {
    let status = err.status_code();
    let message = match &err {
        Error::Verification(reason) => {
            state.activity.error(
                "Webhook verification failed",
                Some(json!({ "error": reason.to_string() })),
            );
            format!("Webhook Error: {reason}")
        }
        _ if status == StatusCode::SERVICE_UNAVAILABLE => {
            state.activity.error(
                "Webhook rejected: endpoint not configured",
                Some(json!({ "error": err.to_string() })),
            );
            "Webhook endpoint is not configured".to_string()
        }
        _ => {
            state.activity.error(
                "Webhook handler failed",
                Some(json!({ "error": err.to_string() })),
            );
            "Webhook handler failed".to_string()
        }
    };

    (status, Json(json!({ "error": message }))).into_response()
}

/// Route for `/webhook/stripe`.
pub fn webhook_router() -> axum::Router<Arc<AppState>> {
    use axum::routing::post;

    axum::Router::new().route("/webhook/stripe", post(stripe_webhook_handler))
}
