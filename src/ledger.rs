//! Airtable ledger
//!
//! Writes one row per payment failure to an Airtable table through the REST
//! API (`POST /v0/{base}/{table}`). Recording is best-effort: every failure
//! is logged and reported as `false`, never raised.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::activity::ActivityLog;
use crate::config::AirtableConfig;
use crate::error::{ConfigError, Error, Result, UpstreamError};
use crate::failure::FailureEvent;

const SERVICE: &str = "airtable";

/// Status written for every recorded failure
pub const STATUS_FAILED: &str = "Failed";

/// Column definition for the ledger table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name, as written to Airtable
    pub name: &'static str,
    /// Airtable field type to create
    #[serde(rename = "type")]
    pub field_type: &'static str,
    /// What the column holds
    pub description: &'static str,
}

/// Columns the ledger table must have
pub const COLUMNS: [Column; 9] = [
    Column {
        name: "Payment ID",
        field_type: "singleLineText",
        description: "Stripe payment intent id (primary field)",
    },
    Column {
        name: "Customer Email",
        field_type: "email",
        description: "Customer email, or \"unknown\"",
    },
    Column {
        name: "Customer ID",
        field_type: "singleLineText",
        description: "Stripe customer id, or \"unknown\"",
    },
    Column {
        name: "Amount",
        field_type: "currency",
        description: "Amount in major units (cents / 100)",
    },
    Column {
        name: "Currency",
        field_type: "singleLineText",
        description: "ISO currency code, uppercase",
    },
    Column {
        name: "Failure Code",
        field_type: "singleLineText",
        description: "Stripe failure code",
    },
    Column {
        name: "Failure Message",
        field_type: "multilineText",
        description: "Stripe failure message",
    },
    Column {
        name: "Status",
        field_type: "singleSelect",
        description: "Always \"Failed\" when written by the relay",
    },
    Column {
        name: "Failed At",
        field_type: "dateTime",
        description: "When the relay recorded the failure",
    },
];

/// Create-records response body
#[derive(Debug, Deserialize)]
struct CreateRecordsResponse {
    records: Vec<CreatedRecord>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

/// Build the Airtable `fields` object for a failure.
pub fn record_fields(event: &FailureEvent, failed_at: DateTime<Utc>) -> Value {
    json!({
        "Payment ID": event.payment_id,
        "Customer Email": event.customer_email,
        "Customer ID": event.customer_id,
        "Amount": event.amount_major(),
        "Currency": event.currency_display(),
        "Failure Code": event.failure_code_display(),
        "Failure Message": event.failure_message_display(),
        "Status": STATUS_FAILED,
        "Failed At": failed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Records payment failures to Airtable
#[derive(Debug, Clone)]
pub struct LedgerRecorder {
    config: Option<AirtableConfig>,
    http: reqwest::Client,
    activity: Arc<ActivityLog>,
}

impl LedgerRecorder {
    /// Create a recorder. `config` is `None` when Airtable is not configured.
    pub fn new(
        config: Option<AirtableConfig>,
        http: reqwest::Client,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            config,
            http,
            activity,
        }
    }

    /// Whether Airtable credentials are present
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Record a failure. Returns `true` when Airtable created the row.
    pub async fn record(&self, event: &FailureEvent) -> bool {
        match self.try_record(event).await {
            Ok(record_id) => {
                self.activity.info(
                    "Airtable record created",
                    Some(json!({ "paymentId": event.payment_id, "recordId": record_id })),
                );
                true
            }
            Err(e) => {
                self.activity.error(
                    "Airtable record failed",
                    Some(json!({ "paymentId": event.payment_id, "error": e.to_string() })),
                );
                false
            }
        }
    }

    async fn try_record(&self, event: &FailureEvent) -> Result<String> {
        let config = self.config.as_ref().ok_or(ConfigError::Missing {
            capability: SERVICE,
            variable: "AIRTABLE_API_KEY",
        })?;

        let url = table_url(config)?;
        let body = json!({
            "records": [{ "fields": record_fields(event, Utc::now()) }],
            "typecast": true,
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&text);
            return Err(UpstreamError::status(SERVICE, status.as_u16(), message).into());
        }

        let created: CreateRecordsResponse = serde_json::from_str(&text).map_err(|e| {
            UpstreamError::status(SERVICE, status.as_u16(), format!("unexpected body: {e}"))
        })?;

        created
            .records
            .into_iter()
            .next()
            .map(|record| record.id)
            .ok_or_else(|| {
                UpstreamError::status(SERVICE, status.as_u16(), "no record returned").into()
            })
    }
}

/// Endpoint for creating records in the configured table.
pub fn table_url(config: &AirtableConfig) -> Result<Url> {
    let invalid = |reason: String| {
        Error::from(ConfigError::Invalid {
            variable: "AIRTABLE_BASE_ID",
            reason,
        })
    };

    let mut url = Url::parse(&config.api_base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid(format!("{} cannot be a base URL", config.api_base)))?
        .pop_if_empty()
        .push("v0")
        .push(&config.base_id)
        .push(&config.table_name);
    Ok(url)
}

/// Pull a readable message out of an Airtable error body.
///
/// Airtable answers either `{"error":{"type":..,"message":..}}` or
/// `{"error":"NOT_FOUND"}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    match &value["error"] {
        Value::String(kind) => kind.clone(),
        Value::Object(detail) => {
            let kind = detail.get("type").and_then(Value::as_str);
            let message = detail.get("message").and_then(Value::as_str);
            match (kind, message) {
                (Some(kind), Some(message)) => format!("{kind}: {message}"),
                (Some(kind), None) => kind.to_string(),
                (None, Some(message)) => message.to_string(),
                (None, None) => body.to_string(),
            }
        }
        _ => body.to_string(),
    }
}
