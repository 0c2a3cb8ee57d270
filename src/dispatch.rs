//! Webhook intake and fan-out
//!
//! One run per inbound webhook:
//!
//! ```text
//! Webhook Received
//!       |
//!       v
//! [Verify Signature] --> invalid --> 400
//!       |
//!       v
//! [Classify Event] --> other type --> Ignored (200)
//!       |
//!       v
//! [Payment Intent] <-- invoice.payment_failed fetches it by reference
//!       |
//!       v
//! [Enrich Customer]
//!       |
//!       +------------------+
//!       v                  v
//! [Airtable Ledger]  [Email Alert]     (both always attempted)
//!       |                  |
//!       +--------+---------+
//!                v
//!        [Log Outcome] --> 200 {"received": true}
//! ```
//!
//! Nothing here retries. Enrichment, ledger and alert failures are logged
//! and never stop the sibling step or the acknowledgment.

use std::sync::Arc;

use serde_json::json;

use crate::activity::ActivityLog;
use crate::alert::AlertNotifier;
use crate::error::{ConfigError, Result};
use crate::failure::FailureEvent;
use crate::ledger::LedgerRecorder;
use crate::stripe::{CustomerResolver, PaymentIntent, SignatureVerifier, StripeEvent, WebhookEvent};

/// Outcome of the two deliveries for one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Airtable row created
    pub ledger: bool,
    /// Alert email accepted by the relay
    pub alert: bool,
}

impl DeliveryReport {
    /// Both deliveries succeeded
    pub fn all_succeeded(&self) -> bool {
        self.ledger && self.alert
    }
}

/// How a verified webhook was handled
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A failure was built and fanned out
    Delivered {
        /// The failure that was delivered
        event: FailureEvent,
        /// Per-destination outcome
        report: DeliveryReport,
    },
    /// Event type the relay does not act on
    Ignored {
        /// The type string Stripe sent
        event_type: String,
    },
    /// Handled type without enough data to act on
    Unhandled,
    /// The referenced payment intent could not be fetched
    LookupFailed,
}

/// Verifies, classifies and fans out Stripe webhooks
#[derive(Debug, Clone)]
pub struct IntakeDispatcher {
    verifier: Option<SignatureVerifier>,
    resolver: CustomerResolver,
    ledger: LedgerRecorder,
    notifier: AlertNotifier,
    activity: Arc<ActivityLog>,
}

impl IntakeDispatcher {
    /// Create a dispatcher. `verifier` is `None` when no signing secret is
    /// configured, which disables webhook intake.
    pub fn new(
        verifier: Option<SignatureVerifier>,
        resolver: CustomerResolver,
        ledger: LedgerRecorder,
        notifier: AlertNotifier,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            verifier,
            resolver,
            ledger,
            notifier,
            activity,
        }
    }

    /// Whether webhook intake is enabled
    pub fn accepts_webhooks(&self) -> bool {
        self.verifier.is_some()
    }

    /// The alert notifier
    pub fn notifier(&self) -> &AlertNotifier {
        &self.notifier
    }

    /// The ledger recorder
    pub fn ledger(&self) -> &LedgerRecorder {
        &self.ledger
    }

    /// Verify the raw body against its signature header.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when no signing secret is configured,
    /// `VerificationError` when the header or body is not authentic.
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<StripeEvent> {
        let verifier = self.verifier.as_ref().ok_or(ConfigError::Missing {
            capability: "webhook",
            variable: "STRIPE_WEBHOOK_SECRET",
        })?;
        verifier.verify(payload, signature)?;
        StripeEvent::from_bytes(payload)
    }

    /// Run one webhook end to end.
    ///
    /// # Errors
    ///
    /// Verification and configuration errors from [`verify`](Self::verify),
    /// or an unexpected error while decoding the event object. Delivery
    /// failures are not errors; they are reported in the outcome.
    pub async fn dispatch(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let event = self.verify(payload, signature)?;

        self.activity.info(
            "Webhook received",
            Some(json!({ "eventId": event.id, "type": event.event_type })),
        );

        self.handle(&event).await
    }

    /// Handle an already-verified event.
    pub async fn handle(&self, event: &StripeEvent) -> Result<DispatchOutcome> {
        let intent = match event.classify()? {
            WebhookEvent::PaymentIntentFailed(intent) => intent,
            WebhookEvent::InvoicePaymentFailed(invoice) => {
                let Some(payment_intent_id) = invoice.payment_intent_id() else {
                    self.activity.info(
                        "Unhandled invoice failure: no payment intent",
                        Some(json!({ "eventId": event.id, "invoiceId": invoice.id })),
                    );
                    return Ok(DispatchOutcome::Unhandled);
                };

                match self.fetch_payment_intent(payment_intent_id).await {
                    Some(intent) => intent,
                    None => return Ok(DispatchOutcome::LookupFailed),
                }
            }
            WebhookEvent::Ignored { event_type } => {
                self.activity.info(
                    "Unhandled event type",
                    Some(json!({ "eventId": event.id, "type": event_type })),
                );
                return Ok(DispatchOutcome::Ignored { event_type });
            }
        };

        let failure = self.build_failure(&intent).await;
        let report = self.deliver(&failure).await;
        self.log_report(&failure, report);

        Ok(DispatchOutcome::Delivered {
            event: failure,
            report,
        })
    }

    /// Assemble a failure from a payment intent, resolving its customer.
    pub async fn build_failure(&self, intent: &PaymentIntent) -> FailureEvent {
        let customer = self.resolver.resolve(intent.customer_id()).await;

        FailureEvent {
            payment_id: intent.id.clone(),
            customer_email: customer.email,
            customer_id: customer.id,
            amount_minor_units: intent.amount,
            currency: intent.currency.clone(),
            failure_code: intent.failure_code().map(str::to_string),
            failure_message: intent.failure_message().map(str::to_string),
        }
    }

    /// Attempt both deliveries concurrently. Neither outcome affects the
    /// other attempt.
    pub async fn deliver(&self, failure: &FailureEvent) -> DeliveryReport {
        let (ledger, alert) = tokio::join!(
            self.ledger.record(failure),
            self.notifier.notify(failure)
        );
        DeliveryReport { ledger, alert }
    }

    /// Record the combined outcome of a fan-out.
    pub fn log_report(&self, failure: &FailureEvent, report: DeliveryReport) {
        let mut data = failure.summary();
        data["airtable"] = json!(report.ledger);
        data["email"] = json!(report.alert);

        if report.all_succeeded() {
            self.activity
                .info("Payment failure processed successfully", Some(data));
        } else {
            self.activity
                .warn("Payment failure processed with errors", Some(data));
        }
    }

    async fn fetch_payment_intent(&self, payment_intent_id: &str) -> Option<PaymentIntent> {
        let Some(client) = self.resolver.client() else {
            let err = ConfigError::Missing {
                capability: "stripe",
                variable: "STRIPE_SECRET_KEY",
            };
            self.activity.error(
                "Payment intent lookup failed",
                Some(json!({ "paymentIntentId": payment_intent_id, "error": err.to_string() })),
            );
            return None;
        };

        match client.retrieve_payment_intent(payment_intent_id).await {
            Ok(intent) => Some(intent),
            Err(e) => {
                self.activity.error(
                    "Payment intent lookup failed",
                    Some(json!({ "paymentIntentId": payment_intent_id, "error": e.to_string() })),
                );
                None
            }
        }
    }
}
