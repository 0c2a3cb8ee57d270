//! Stripe REST client and customer enrichment
//!
//! [`StripeClient`] performs the two lookups the relay needs: customers (to
//! resolve an email address) and payment intents (for invoice failures).
//! [`CustomerResolver`] wraps the customer lookup with the best-effort policy:
//! it never fails, it falls back to the `"unknown"` sentinel pair instead.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::activity::ActivityLog;
use crate::config::StripeConfig;
use crate::error::{ConfigError, Result, UpstreamError};
use crate::failure::UNKNOWN;
use crate::stripe::events::{Customer, PaymentIntent};

const SERVICE: &str = "stripe";

/// Minimal Stripe API client
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// Error body returned by the Stripe API
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

impl StripeClient {
    /// Create a client from configuration and a shared HTTP client.
    pub fn new(config: &StripeConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Retrieve a customer by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` on transport failure or any non-2xx answer
    /// (including `resource_missing` for unknown ids).
    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer> {
        self.get(&format!("/v1/customers/{customer_id}")).await
    }

    /// Retrieve a payment intent by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` on transport failure or any non-2xx answer.
    pub async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent> {
        self.get(&format!("/v1/payment_intents/{payment_intent_id}"))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body);
            return Err(UpstreamError::status(SERVICE, status.as_u16(), message).into());
        }

        serde_json::from_str(&body).map_err(|e| {
            UpstreamError::status(SERVICE, status.as_u16(), format!("unexpected body: {e}")).into()
        })
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => match (parsed.error.error_type, parsed.error.message) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

/// A resolved customer, or the sentinel pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCustomer {
    /// Customer email or `"unknown"`
    pub email: String,
    /// Customer id or `"unknown"`
    pub id: String,
}

impl ResolvedCustomer {
    /// The `"unknown"` / `"unknown"` pair
    pub fn unknown() -> Self {
        Self {
            email: UNKNOWN.to_string(),
            id: UNKNOWN.to_string(),
        }
    }
}

/// Best-effort customer enrichment
#[derive(Debug, Clone)]
pub struct CustomerResolver {
    client: Option<StripeClient>,
    activity: Arc<ActivityLog>,
}

impl CustomerResolver {
    /// Create a resolver. `client` is `None` when Stripe is not configured.
    pub fn new(client: Option<StripeClient>, activity: Arc<ActivityLog>) -> Self {
        Self { client, activity }
    }

    /// The underlying client, if configured
    pub fn client(&self) -> Option<&StripeClient> {
        self.client.as_ref()
    }

    /// Resolve a customer's email and id.
    ///
    /// Never fails. `None` short-circuits to the sentinel pair without any
    /// request. A missing client or a failed lookup records one warning and
    /// also returns the sentinel pair.
    pub async fn resolve(&self, customer_id: Option<&str>) -> ResolvedCustomer {
        let Some(customer_id) = customer_id else {
            return ResolvedCustomer::unknown();
        };

        let Some(client) = &self.client else {
            let err = ConfigError::Missing {
                capability: "stripe",
                variable: "STRIPE_SECRET_KEY",
            };
            self.activity.warn(
                "Customer lookup skipped",
                Some(json!({ "customerId": customer_id, "error": err.to_string() })),
            );
            return ResolvedCustomer::unknown();
        };

        match client.retrieve_customer(customer_id).await {
            Ok(customer) => ResolvedCustomer {
                email: customer.email.unwrap_or_else(|| UNKNOWN.to_string()),
                id: customer.id,
            },
            Err(e) => {
                self.activity.warn(
                    "Customer lookup failed",
                    Some(json!({ "customerId": customer_id, "error": e.to_string() })),
                );
                ResolvedCustomer::unknown()
            }
        }
    }
}
