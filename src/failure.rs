//! Payment failure record
//!
//! [`FailureEvent`] is assembled once per inbound failure, handed to the
//! ledger and the alert notifier, then dropped. Optional provider fields keep
//! their `Option` until output, where the named fallbacks apply.

/// Sentinel for an email or customer id that could not be resolved
pub const UNKNOWN: &str = "unknown";

/// Shown when Stripe gives no failure message
pub const NO_FAILURE_MESSAGE: &str = "No failure message provided";

/// A payment failure ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvent {
    /// Stripe payment intent id (`pi_...`)
    pub payment_id: String,
    /// Resolved customer email or [`UNKNOWN`]
    pub customer_email: String,
    /// Resolved customer id or [`UNKNOWN`]
    pub customer_id: String,
    /// Amount in the smallest currency unit
    pub amount_minor_units: i64,
    /// ISO currency code as received
    pub currency: String,
    /// Stripe failure code (`card_declined`, ...)
    pub failure_code: Option<String>,
    /// Human-readable failure reason
    pub failure_message: Option<String>,
}

impl FailureEvent {
    /// Amount in major units (`2000` cents -> `20.0`).
    pub fn amount_major(&self) -> f64 {
        self.amount_minor_units as f64 / 100.0
    }

    /// Amount formatted with two decimals (`"20.00"`).
    pub fn amount_display(&self) -> String {
        format!("{:.2}", self.amount_major())
    }

    /// Uppercased currency code.
    pub fn currency_display(&self) -> String {
        self.currency.to_uppercase()
    }

    /// Failure code or [`UNKNOWN`].
    pub fn failure_code_display(&self) -> &str {
        self.failure_code.as_deref().unwrap_or(UNKNOWN)
    }

    /// Failure message or [`NO_FAILURE_MESSAGE`].
    pub fn failure_message_display(&self) -> &str {
        self.failure_message.as_deref().unwrap_or(NO_FAILURE_MESSAGE)
    }

    /// Compact summary for log entries.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "paymentId": self.payment_id,
            "customerEmail": self.customer_email,
            "amount": self.amount_display(),
            "currency": self.currency_display(),
            "failureCode": self.failure_code_display(),
        })
    }
}
