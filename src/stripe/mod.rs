//! Stripe Integration Module
//!
//! This module covers everything the relay needs from Stripe:
//!
//! - **Signature Verification**: HMAC-SHA256 validation of the `stripe-signature` header
//! - **Event Types**: typed decoding of the handled failure events
//! - **REST Client**: customer and payment intent lookups for enrichment
//!
//! # Architecture
//!
//! ```text
//! Request -> Signature Verify -> Classify -> Enrich (customer lookup)
//!                   |               |
//!                   v               v
//!                  400        Ignored / Unhandled
//! ```
//!
//! # Security
//!
//! - Webhook signing secret loaded from environment
//! - Constant-time signature comparison
//! - Raw body verification, before any JSON parsing

pub mod client;
pub mod events;
pub mod signature;

// Re-export commonly used items
pub use client::{CustomerResolver, ResolvedCustomer, StripeClient};
pub use events::{
    Customer, Expandable, Invoice, PaymentError, PaymentIntent, StripeEvent, StripeEventType,
    WebhookEvent,
};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
