//! Integration tests for the payment alert relay
//!
//! Drives the full axum router with `tower::ServiceExt::oneshot`. A single
//! wiremock server stands in for both the Stripe and Airtable APIs; alert
//! emails go to an in-memory transport.
//!
//! # Test Categories
//!
//! 1. **Webhook Intake**: signature checks, event routing, fan-out
//! 2. **Diagnostics**: `POST /test`
//! 3. **Status**: `/`, `/health`, `/logs`
//! 4. **Setup**: `/webhook/setup`, `/airtable/setup`
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --package payment-alerts --test relay_integration_tests
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use payment_alerts::alert::{AlertMessage, MailTransport};
use payment_alerts::config::{
    AirtableConfig, AppConfig, EmailConfig, StripeConfig, WebhookConfig,
    DEFAULT_SIGNATURE_TOLERANCE,
};
use payment_alerts::error::UpstreamError;
use payment_alerts::stripe::SignatureVerifier;
use payment_alerts::{build_router, ActivityLog, AppState, LogLevel};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_SECRET: &str = "whsec_integration";
const LEDGER_PATH: &str = "/v0/appTest/Failed%20Payments";

// ============================================================================
// Harness
// ============================================================================

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<AlertMessage>>,
    fail: bool,
}

#[async_trait::async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &AlertMessage) -> payment_alerts::Result<()> {
        if self.fail {
            return Err(UpstreamError::transport("smtp", "connection refused").into());
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

fn full_config(upstream: &MockServer) -> AppConfig {
    AppConfig {
        stripe: Some(StripeConfig {
            secret_key: "sk_test_integration".to_string(),
            api_base: upstream.uri(),
        }),
        webhook: Some(WebhookConfig {
            signing_secret: SIGNING_SECRET.to_string(),
            tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        }),
        airtable: Some(AirtableConfig {
            api_key: "pat_integration".to_string(),
            base_id: "appTest".to_string(),
            table_name: "Failed Payments".to_string(),
            api_base: upstream.uri(),
        }),
        email: Some(EmailConfig {
            sender: "alerts@example.com".to_string(),
            app_password: "app-password".to_string(),
            recipient: "ops@example.com".to_string(),
            smtp_host: "smtp.example.com".to_string(),
        }),
        ..AppConfig::default()
    }
}

fn state_with(config: AppConfig, transport: Arc<RecordingTransport>) -> Arc<AppState> {
    Arc::new(AppState::with_mail_transport(config, transport).unwrap())
}

fn app(state: &Arc<AppState>) -> Router {
    build_router(state.clone())
}

fn signed_request(payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let header = SignatureVerifier::new(SIGNING_SECRET, DEFAULT_SIGNATURE_TOLERANCE)
        .header_for(&body, chrono::Utc::now().timestamp())
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("content-type", "application/json")
        .header("stripe-signature", header)
        .body(Body::from(body))
        .unwrap()
}

fn count_level(activity: &ActivityLog, level: LogLevel) -> usize {
    activity
        .recent(usize::MAX)
        .iter()
        .filter(|entry| entry.level == level)
        .count()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn payment_failed_event(customer: Option<&str>) -> Value {
    json!({
        "id": "evt_pi_failed",
        "object": "event",
        "type": "payment_intent.payment_failed",
        "created": 1_767_225_600,
        "livemode": false,
        "data": { "object": {
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 2000,
            "currency": "usd",
            "customer": customer,
            "last_payment_error": {
                "code": "card_declined",
                "decline_code": "generic_decline",
                "message": "Your card was declined.",
                "type": "card_error"
            }
        } }
    })
}

async fn mount_customer(upstream: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/customers/cus_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_123",
            "object": "customer",
            "email": "jane@example.com"
        })))
        .mount(upstream)
        .await;
}

async fn mount_ledger(upstream: &MockServer, status: u16, expected: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({
            "records": [{ "id": "recIntegration", "fields": {} }]
        }))
    } else {
        ResponseTemplate::new(status).set_body_json(json!({
            "error": { "type": "INVALID_PERMISSIONS", "message": "Not allowed" }
        }))
    };

    Mock::given(method("POST"))
        .and(path(LEDGER_PATH))
        .respond_with(response)
        .expect(expected)
        .mount(upstream)
        .await;
}

// ============================================================================
// MODULE: Webhook Intake
// ============================================================================

#[tokio::test]
async fn test_payment_intent_failure_fans_out() {
    let upstream = MockServer::start().await;
    mount_customer(&upstream).await;
    mount_ledger(&upstream, 200, 1).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let request = signed_request(&payment_failed_event(Some("cus_123")));
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    pretty_assertions::assert_eq!(body, json!({ "received": true }));

    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ops@example.com");
    assert_eq!(sent[0].subject, "Payment failed: jane@example.com");
    assert!(sent[0].text.contains("20.00 USD"));

    let latest = &state.activity.recent(1)[0];
    assert_eq!(latest.level, LogLevel::Info);
    assert_eq!(latest.message, "Payment failure processed successfully");
}

#[tokio::test]
async fn test_ledger_failure_does_not_block_alert() {
    let upstream = MockServer::start().await;
    mount_customer(&upstream).await;
    mount_ledger(&upstream, 403, 1).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let request = signed_request(&payment_failed_event(Some("cus_123")));
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(transport.sent.lock().len(), 1);

    let latest = &state.activity.recent(1)[0];
    assert_eq!(latest.level, LogLevel::Warn);
    let data = latest.data.as_ref().unwrap();
    assert_eq!(data["airtable"], false);
    assert_eq!(data["email"], true);
}

#[tokio::test]
async fn test_customer_lookup_failure_uses_unknown() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cus_123"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "type": "invalid_request_error", "message": "No such customer: 'cus_123'" }
        })))
        .mount(&upstream)
        .await;
    mount_ledger(&upstream, 200, 1).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let request = signed_request(&payment_failed_event(Some("cus_123")));
    let (status, _) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        transport.sent.lock()[0].subject,
        "Payment failed: unknown"
    );
    assert_eq!(count_level(&state.activity, LogLevel::Warn), 1);
}

#[tokio::test]
async fn test_invoice_failure_fetches_payment_intent() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_from_invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_from_invoice",
            "object": "payment_intent",
            "amount": 4999,
            "currency": "eur",
            "customer": "cus_123",
            "last_payment_error": { "code": "insufficient_funds", "message": "Insufficient funds." }
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    mount_customer(&upstream).await;
    mount_ledger(&upstream, 200, 1).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let event = json!({
        "id": "evt_invoice",
        "type": "invoice.payment_failed",
        "data": { "object": {
            "id": "in_123",
            "object": "invoice",
            "customer": "cus_123",
            "payment_intent": "pi_from_invoice"
        } }
    });
    let (status, _) = send(app(&state), signed_request(&event)).await;

    assert_eq!(status, StatusCode::OK);
    let sent = transport.sent.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("49.99 EUR"));
    assert!(sent[0].text.contains("insufficient_funds"));
}

#[tokio::test]
async fn test_invoice_without_payment_intent_is_acknowledged() {
    let upstream = MockServer::start().await;
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let event = json!({
        "id": "evt_invoice_no_pi",
        "type": "invoice.payment_failed",
        "data": { "object": { "id": "in_456", "payment_intent": null } }
    });
    let (status, body) = send(app(&state), signed_request(&event)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(transport.sent.lock().is_empty());
    assert!(upstream.received_requests().await.unwrap().is_empty());
    assert_eq!(count_level(&state.activity, LogLevel::Error), 0);
}

#[tokio::test]
async fn test_unknown_event_type_has_no_side_effects() {
    let upstream = MockServer::start().await;
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let event = json!({
        "id": "evt_other",
        "type": "customer.subscription.updated",
        "data": { "object": { "id": "sub_1" } }
    });
    let (status, body) = send(app(&state), signed_request(&event)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    assert!(transport.sent.lock().is_empty());
    assert!(upstream.received_requests().await.unwrap().is_empty());

    let latest = &state.activity.recent(1)[0];
    assert_eq!(latest.level, LogLevel::Info);
    assert_eq!(latest.message, "Unhandled event type");
}

#[tokio::test]
async fn test_invalid_signature_is_rejected() {
    let upstream = MockServer::start().await;
    mount_ledger(&upstream, 200, 0).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let body = serde_json::to_vec(&payment_failed_event(None)).unwrap();
    let forged = SignatureVerifier::new("whsec_wrong", DEFAULT_SIGNATURE_TOLERANCE)
        .header_for(&body, chrono::Utc::now().timestamp())
        .unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("stripe-signature", forged)
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    assert!(transport.sent.lock().is_empty());
    assert_eq!(count_level(&state.activity, LogLevel::Error), 1);
}

#[tokio::test]
async fn test_extreme_signature_timestamp_is_rejected() {
    let upstream = MockServer::start().await;
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let header = format!("t={},v1={}", i64::MIN, "0".repeat(64));
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("stripe-signature", header)
        .body(Body::from(serde_json::to_vec(&payment_failed_event(None)).unwrap()))
        .unwrap();

    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook Error:"));
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let upstream = MockServer::start().await;
    let state = state_with(full_config(&upstream), Arc::new(RecordingTransport::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .body(Body::from(serde_json::to_vec(&payment_failed_event(None)).unwrap()))
        .unwrap();

    let (status, _) = send(app(&state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_disabled_without_secret() {
    let upstream = MockServer::start().await;
    let config = AppConfig {
        webhook: None,
        ..full_config(&upstream)
    };
    let state = state_with(config, Arc::new(RecordingTransport::default()));

    let (status, body) = send(app(&state), signed_request(&payment_failed_event(None))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Webhook endpoint is not configured");
}

#[tokio::test]
async fn test_unexpected_object_shape_is_server_error() {
    let upstream = MockServer::start().await;
    let state = state_with(full_config(&upstream), Arc::new(RecordingTransport::default()));

    let event = json!({
        "id": "evt_bad",
        "type": "payment_intent.payment_failed",
        "data": { "object": { "id": "pi_no_amount" } }
    });
    let (status, body) = send(app(&state), signed_request(&event)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Webhook handler failed" }));
}

// ============================================================================
// MODULE: Diagnostics
// ============================================================================

#[tokio::test]
async fn test_synthetic_failure_reports_each_delivery() {
    let upstream = MockServer::start().await;
    mount_ledger(&upstream, 200, 1).await;

    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(full_config(&upstream), transport.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    pretty_assertions::assert_eq!(
        body["results"],
        json!({ "airtable": "success", "email": "success" })
    );

    let sent = transport.sent.lock();
    assert_eq!(sent[0].subject, "Payment failed: ops@example.com");
    assert!(sent[0].text.contains("test_payment_intent_"));
    assert!(sent[0].text.contains("card_declined"));
}

#[tokio::test]
async fn test_synthetic_failure_without_integrations() {
    let transport = Arc::new(RecordingTransport::default());
    let state = state_with(AppConfig::default(), transport.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["results"]["airtable"], "failed");
    assert_eq!(body["results"]["email"], "failed");
    assert!(transport.sent.lock().is_empty());
}

#[tokio::test]
async fn test_synthetic_failure_with_failing_mailer() {
    let upstream = MockServer::start().await;
    mount_ledger(&upstream, 200, 1).await;

    let transport = Arc::new(RecordingTransport {
        fail: true,
        ..Default::default()
    });
    let state = state_with(full_config(&upstream), transport);

    let request = Request::builder()
        .method("POST")
        .uri("/test")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(app(&state), request).await;

    assert_eq!(body["results"]["airtable"], "success");
    assert_eq!(body["results"]["email"], "failed");
}

// ============================================================================
// MODULE: Status
// ============================================================================

#[tokio::test]
async fn test_health_reports_missing_services() {
    let state = state_with(AppConfig::default(), Arc::new(RecordingTransport::default()));

    let (status, body) = send(app(&state), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    pretty_assertions::assert_eq!(
        body["services"],
        json!({
            "stripe": "missing",
            "webhook": "missing",
            "airtable": "missing",
            "email": "missing"
        })
    );
}

#[tokio::test]
async fn test_health_reports_configured_services() {
    let upstream = MockServer::start().await;
    let state = state_with(full_config(&upstream), Arc::new(RecordingTransport::default()));

    let (_, body) = send(app(&state), get("/health")).await;

    for service in ["stripe", "webhook", "airtable", "email"] {
        assert_eq!(body["services"][service], "configured", "{service}");
    }
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_logs_are_capped_and_newest_first() {
    let state = state_with(AppConfig::default(), Arc::new(RecordingTransport::default()));
    for i in 0..120 {
        state.activity.info(format!("entry {i}"), None);
    }

    let (status, body) = send(app(&state), get("/logs")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 100);
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 50);
    assert_eq!(logs[0]["message"], "entry 119");
    assert_eq!(logs[0]["level"], "info");
}

#[tokio::test]
async fn test_index_lists_endpoints() {
    let state = state_with(AppConfig::default(), Arc::new(RecordingTransport::default()));

    let (status, body) = send(app(&state), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], payment_alerts::NAME);
    assert_eq!(body["version"], payment_alerts::VERSION);
    assert!(body["endpoints"]["POST /webhook/stripe"].is_string());
}

// ============================================================================
// MODULE: Setup
// ============================================================================

#[tokio::test]
async fn test_webhook_setup_uses_request_host() {
    let state = state_with(AppConfig::default(), Arc::new(RecordingTransport::default()));

    let request = Request::builder()
        .uri("/webhook/setup")
        .header("host", "alerts.example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["webhook_url"], "https://alerts.example.com/webhook/stripe");
    assert_eq!(
        body["events"],
        json!(["payment_intent.payment_failed", "invoice.payment_failed"])
    );
    assert_eq!(body["configured"], false);
    assert!(!body["instructions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_setup_prefers_public_url() {
    let mut config = AppConfig::default();
    config.server.public_url = Some("https://relay.example.com".to_string());
    let state = state_with(config, Arc::new(RecordingTransport::default()));

    let (_, body) = send(app(&state), get("/webhook/setup")).await;

    assert_eq!(body["webhook_url"], "https://relay.example.com/webhook/stripe");
}

#[tokio::test]
async fn test_airtable_setup_lists_columns() {
    let upstream = MockServer::start().await;
    let state = state_with(full_config(&upstream), Arc::new(RecordingTransport::default()));

    let (status, body) = send(app(&state), get("/airtable/setup")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["base_id"], "appTest");
    assert_eq!(body["table_name"], "Failed Payments");
    assert_eq!(body["configured"], true);

    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[0]["name"], "Payment ID");
    assert_eq!(fields[8]["type"], "dateTime");
}
