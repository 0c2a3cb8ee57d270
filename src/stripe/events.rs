//! Stripe Event Types
//!
//! Strongly-typed representations of the Stripe webhook events the relay
//! acts on. Only fields the relay reads are modelled; everything Stripe may
//! omit is an `Option`.

use serde::Deserialize;

use crate::error::{Result, VerificationError};

/// Stripe event types we handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripeEventType {
    /// A payment intent failed to confirm or capture
    PaymentIntentPaymentFailed,

    /// An invoice payment attempt failed
    InvoicePaymentFailed,

    /// Catch-all for events we don't explicitly handle
    Unknown,
}

impl StripeEventType {
    /// Map a Stripe `type` string onto a known variant.
    pub fn parse(s: &str) -> Self {
        match s {
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Unknown,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown => "unknown",
        }
    }

    /// Event types the webhook endpoint should subscribe to
    pub fn subscribed() -> [Self; 2] {
        [Self::PaymentIntentPaymentFailed, Self::InvoicePaymentFailed]
    }
}

/// Stripe event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    /// Unique identifier for the event
    pub id: String,

    /// Type of event
    #[serde(rename = "type")]
    pub event_type: String,

    /// Object containing event data
    pub data: EventData,
}

/// Event data container
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The event object (payment intent, invoice, ...)
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| VerificationError::InvalidPayload(e.to_string()).into())
    }

    /// Get the typed event type
    pub fn typed_event_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }

    /// Decode the event object according to the event type.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` when a handled event carries an object that
    /// does not match its type.
    pub fn classify(&self) -> Result<WebhookEvent> {
        match self.typed_event_type() {
            StripeEventType::PaymentIntentPaymentFailed => {
                let intent: PaymentIntent = serde_json::from_value(self.data.object.clone())?;
                Ok(WebhookEvent::PaymentIntentFailed(intent))
            }
            StripeEventType::InvoicePaymentFailed => {
                let invoice: Invoice = serde_json::from_value(self.data.object.clone())?;
                Ok(WebhookEvent::InvoicePaymentFailed(invoice))
            }
            StripeEventType::Unknown => Ok(WebhookEvent::Ignored {
                event_type: self.event_type.clone(),
            }),
        }
    }
}

/// The handled event kinds with their decoded objects
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// `payment_intent.payment_failed`: the object is the intent
    PaymentIntentFailed(PaymentIntent),
    /// `invoice.payment_failed`: the intent must be fetched by reference
    InvoicePaymentFailed(Invoice),
    /// Any other event type
    Ignored {
        /// The type string Stripe sent
        event_type: String,
    },
}

/// A reference that Stripe may send as an id or as an expanded object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    /// Bare id (`cus_...`, `pi_...`)
    Id(String),
    /// Expanded object; only its id is kept
    Object {
        /// Object id
        id: String,
    },
}

impl Expandable {
    /// The referenced object id
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object { id } => id,
        }
    }
}

// =============================================================================
// Payment Intent Types
// =============================================================================

/// Stripe payment intent object
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID (pi_...)
    pub id: String,
    /// Amount in the smallest currency unit
    pub amount: i64,
    /// Three-letter ISO currency code, lowercase
    pub currency: String,
    /// Customer reference, if the intent has one
    #[serde(default)]
    pub customer: Option<Expandable>,
    /// Details of the most recent failed attempt
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntent {
    /// Customer id, if referenced
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }

    /// Failure code from the last payment error
    pub fn failure_code(&self) -> Option<&str> {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.code.as_deref())
    }

    /// Failure message from the last payment error
    pub fn failure_message(&self) -> Option<&str> {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.message.as_deref())
    }
}

/// Failure details attached to a payment intent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentError {
    /// Error code (`card_declined`, `expired_card`, ...)
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Invoice Types
// =============================================================================

/// Stripe invoice object
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Invoice {
    /// Invoice ID (in_...)
    pub id: String,
    /// Payment intent reference (if payment attempted)
    #[serde(default)]
    pub payment_intent: Option<Expandable>,
}

impl Invoice {
    /// Payment intent id, if referenced
    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent.as_ref().map(Expandable::id)
    }
}

// =============================================================================
// Customer Types
// =============================================================================

/// Stripe customer object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Customer {
    /// Customer ID (cus_...)
    pub id: String,
    /// Customer email
    #[serde(default)]
    pub email: Option<String>,
}
