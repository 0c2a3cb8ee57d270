//! Error types for the payment alert relay
//!
//! This module provides the error hierarchy using `thiserror`. Each
//! sub-enum maps to one failure class of the relay:
//!
//! - [`ConfigError`]: a capability is used without its credentials
//! - [`VerificationError`]: a webhook failed Stripe signature checks
//! - [`UpstreamError`]: Stripe, Airtable or the SMTP relay rejected a call
//!
//! Only verification failures and unexpected errors ever reach an HTTP
//! response; the other classes are logged and degrade a single capability.

use axum::http::StatusCode;
use thiserror::Error;

/// The main error type for relay operations
#[derive(Error, Debug)]
pub enum Error {
    /// A capability was invoked without its configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Webhook authenticity could not be established
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    /// A third-party service failed or rejected the request
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors not attributed to a specific service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing or malformed configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable for a capability is unset or empty
    #[error("{capability} is not configured ({variable} is not set)")]
    Missing {
        /// Capability that is disabled
        capability: &'static str,
        /// Environment variable that would enable it
        variable: &'static str,
    },

    /// A variable is set but cannot be parsed
    #[error("Invalid value for {variable}: {reason}")]
    Invalid {
        /// Offending environment variable
        variable: &'static str,
        /// Parse failure detail
        reason: String,
    },
}

/// Stripe webhook signature verification failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// No `Stripe-Signature` header on the request
    #[error("No stripe-signature header value was provided")]
    MissingSignature,

    /// Header present but not in `t=...,v1=...` form
    #[error("Unable to extract timestamp and signatures from header: {0}")]
    MalformedHeader(String),

    /// Signed timestamp is too far from the current time
    #[error("Timestamp outside the tolerance zone ({age_secs}s > {tolerance_secs}s)")]
    TimestampOutsideTolerance {
        /// Absolute distance between now and the signed timestamp
        age_secs: u64,
        /// Allowed distance
        tolerance_secs: u64,
    },

    /// None of the `v1` signatures match the expected HMAC
    #[error("No signatures found matching the expected signature for payload")]
    SignatureMismatch,

    /// Signature verified but the body is not a Stripe event
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The signing secret cannot key an HMAC
    #[error("Invalid webhook signing secret")]
    InvalidSecret,
}

/// A failed call to Stripe, Airtable or the SMTP relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    /// Service name (`stripe`, `airtable`, `smtp`)
    pub service: &'static str,
    /// HTTP status when the service answered
    pub status: Option<u16>,
    /// Provider error body or transport error text
    pub message: String,
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} request failed ({}): {}",
                self.service, status, self.message
            ),
            None => write!(f, "{} request failed: {}", self.service, self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl UpstreamError {
    /// Create an upstream error without an HTTP status
    pub fn transport<S: Into<String>>(service: &'static str, message: S) -> Self {
        Self {
            service,
            status: None,
            message: message.into(),
        }
    }

    /// Create an upstream error from a non-success HTTP answer
    pub fn status<S: Into<String>>(service: &'static str, status: u16, message: S) -> Self {
        Self {
            service,
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status a webhook caller sees for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Verification(_) => StatusCode::BAD_REQUEST,
            Error::Config(ConfigError::Missing { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
