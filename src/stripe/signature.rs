//! Stripe webhook signature verification
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{body}"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1492774577,v1=5257a869e7ec...
//! ```
//!
//! A delivery is authentic when any `v1` entry matches and the timestamp is
//! within the tolerance window. Comparison goes through `Mac::verify_slice`,
//! which is constant-time.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::VerificationError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies `Stripe-Signature` headers against one signing secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[redacted]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, VerificationError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        VerificationError::MalformedHeader(format!("invalid timestamp {value:?}"))
                    })?);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| VerificationError::MalformedHeader("missing timestamp".to_string()))?;

        if signatures.is_empty() {
            return Err(VerificationError::MalformedHeader(
                "no v1 signatures".to_string(),
            ));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

impl SignatureVerifier {
    /// Create a verifier for a signing secret.
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify a header against the raw request body at the current time.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), VerificationError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify a header against the raw request body at a given Unix time.
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), VerificationError> {
        let header = header
            .filter(|h| !h.trim().is_empty())
            .ok_or(VerificationError::MissingSignature)?;
        let parsed = SignatureHeader::parse(header)?;

        let tolerance_secs = self.tolerance.as_secs();
        let age_secs = now.abs_diff(parsed.timestamp);
        if age_secs > tolerance_secs {
            return Err(VerificationError::TimestampOutsideTolerance {
                age_secs,
                tolerance_secs,
            });
        }

        let mac = self.mac(parsed.timestamp, payload)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }

    /// Compute the hex `v1` signature for a payload at a timestamp.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, VerificationError> {
        let mac = self.mac(timestamp, payload)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a complete `Stripe-Signature` header value.
    pub fn header_for(&self, payload: &[u8], timestamp: i64) -> Result<String, VerificationError> {
        Ok(format!("t={},v1={}", timestamp, self.sign(payload, timestamp)?))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, VerificationError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| VerificationError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}
