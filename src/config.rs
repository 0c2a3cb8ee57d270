//! Relay configuration
//!
//! All settings come from environment variables and are validated once at
//! startup. Each integration is an `Option`: a missing credential disables
//! that capability (reported by `/health`) instead of stopping the process.
//!
//! # Environment Variables
//!
//! - `STRIPE_SECRET_KEY`: customer and payment intent lookups
//! - `STRIPE_WEBHOOK_SECRET`: webhook signature verification
//! - `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID`, `AIRTABLE_TABLE_NAME`: ledger
//! - `GMAIL_USER`, `GMAIL_APP_PASSWORD`, `ALERT_EMAIL`, `SMTP_HOST`: alerts
//! - `PUBLIC_URL`: externally visible base URL for `/webhook/setup`
//! - `HOST`, `PORT`: listen address (default `0.0.0.0:3000`)

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConfigError;

/// Default Stripe API base URL
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Default Airtable API base URL
pub const AIRTABLE_API_BASE: &str = "https://api.airtable.com";

/// Base that holds the failed payments table
pub const DEFAULT_AIRTABLE_BASE_ID: &str = "appPaymentFailures";

/// Table that receives one row per failure
pub const DEFAULT_AIRTABLE_TABLE: &str = "Failed Payments";

/// SMTP relay used for alert delivery
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Maximum age of a signed webhook timestamp
pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Stripe API access used for enrichment
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: String,
    /// API base URL
    pub api_base: String,
}

/// Webhook signing settings
#[derive(Clone)]
pub struct WebhookConfig {
    /// Endpoint signing secret (`whsec_...`)
    pub signing_secret: String,
    /// Allowed clock distance for signed timestamps
    pub tolerance: Duration,
}

/// Airtable ledger settings
#[derive(Clone)]
pub struct AirtableConfig {
    /// Personal access token
    pub api_key: String,
    /// Base identifier (`app...`)
    pub base_id: String,
    /// Table name or identifier
    pub table_name: String,
    /// API base URL
    pub api_base: String,
}

/// Email alert settings
#[derive(Clone)]
pub struct EmailConfig {
    /// Sender address and SMTP username
    pub sender: String,
    /// App password for the sender account
    pub app_password: String,
    /// Alert recipient (falls back to the sender)
    pub recipient: String,
    /// SMTP relay host
    pub smtp_host: String,
}

const REDACTED: &str = "[redacted]";

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &REDACTED)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("signing_secret", &REDACTED)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl fmt::Debug for AirtableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirtableConfig")
            .field("api_key", &REDACTED)
            .field("base_id", &self.base_id)
            .field("table_name", &self.table_name)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("sender", &self.sender)
            .field("app_password", &REDACTED)
            .field("recipient", &self.recipient)
            .field("smtp_host", &self.smtp_host)
            .finish()
    }
}

/// Listen address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Bind port
    pub port: u16,
    /// Externally visible base URL, if known
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            public_url: None,
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Listen address
    pub server: ServerConfig,
    /// Stripe API access, if configured
    pub stripe: Option<StripeConfig>,
    /// Webhook verification, if configured
    pub webhook: Option<WebhookConfig>,
    /// Airtable ledger, if configured
    pub airtable: Option<AirtableConfig>,
    /// Email alerts, if configured
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `HOST` or `PORT` cannot be parsed.
    /// Missing credentials are not errors; they leave the capability unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty and whitespace-only values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut server = ServerConfig::default();
        if let Some(host) = var("HOST") {
            server.host = host.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    variable: "HOST",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(port) = var("PORT") {
            server.port = port.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    variable: "PORT",
                    reason: e.to_string(),
                }
            })?;
        }
        server.public_url = var("PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string());

        let stripe = var("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        });

        let webhook = var("STRIPE_WEBHOOK_SECRET").map(|signing_secret| WebhookConfig {
            signing_secret,
            tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        });

        let airtable = var("AIRTABLE_API_KEY").map(|api_key| AirtableConfig {
            api_key,
            base_id: var("AIRTABLE_BASE_ID")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_BASE_ID.to_string()),
            table_name: var("AIRTABLE_TABLE_NAME")
                .unwrap_or_else(|| DEFAULT_AIRTABLE_TABLE.to_string()),
            api_base: AIRTABLE_API_BASE.to_string(),
        });

        let email = match (var("GMAIL_USER"), var("GMAIL_APP_PASSWORD")) {
            (Some(sender), Some(app_password)) => Some(EmailConfig {
                recipient: var("ALERT_EMAIL").unwrap_or_else(|| sender.clone()),
                sender,
                app_password,
                smtp_host: var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            server,
            stripe,
            webhook,
            airtable,
            email,
        })
    }

    /// Per-capability status as reported by `/health`.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            stripe: self.stripe.is_some(),
            webhook: self.webhook.is_some(),
            airtable: self.airtable.is_some(),
            email: self.email.is_some(),
        }
    }

    /// Log which capabilities are enabled. Called once at startup.
    pub fn log_summary(&self) {
        info!(
            host = %self.server.host,
            port = self.server.port,
            "Listen address configured"
        );

        for (name, enabled, variable) in [
            ("stripe", self.stripe.is_some(), "STRIPE_SECRET_KEY"),
            ("webhook", self.webhook.is_some(), "STRIPE_WEBHOOK_SECRET"),
            ("airtable", self.airtable.is_some(), "AIRTABLE_API_KEY"),
            ("email", self.email.is_some(), "GMAIL_USER/GMAIL_APP_PASSWORD"),
        ] {
            if enabled {
                info!(capability = name, "Capability enabled");
            } else {
                warn!(
                    capability = name,
                    variable, "Capability disabled: credentials not set"
                );
            }
        }
    }
}

/// Which integrations have credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Stripe API key present
    pub stripe: bool,
    /// Webhook signing secret present
    pub webhook: bool,
    /// Airtable key present
    pub airtable: bool,
    /// Email sender credentials present
    pub email: bool,
}
