//! Email alerts
//!
//! Renders a fixed-layout alert for each payment failure and hands it to a
//! [`MailTransport`]. The production transport is [`SmtpMailer`] (an
//! authenticated SMTP relay, Gmail by default); tests plug in their own.
//!
//! Like the ledger, sending is best-effort: failures are logged and reported
//! as `false`.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use crate::activity::ActivityLog;
use crate::config::EmailConfig;
use crate::error::{ConfigError, Result, UpstreamError};
use crate::failure::FailureEvent;

const SERVICE: &str = "smtp";

/// Checklist appended to every alert
pub const NEXT_STEPS: [&str; 4] = [
    "Review the payment in the Stripe dashboard",
    "Contact the customer about updating their payment method",
    "Check the Airtable ledger for earlier failures from this customer",
    "Retry the charge once the payment method is fixed",
];

/// A rendered alert ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML body
    pub html: String,
}

/// Something that can deliver an [`AlertMessage`]
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync + 'static {
    /// Deliver one message
    async fn send(&self, message: &AlertMessage) -> Result<()>;
}

/// SMTP delivery through an authenticated relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a STARTTLS relay transport (port 587) for the configured host.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if TLS parameters cannot be built for
    /// the host name.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let credentials = Credentials::new(config.sender.clone(), config.app_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ConfigError::Invalid {
                variable: "SMTP_HOST",
                reason: e.to_string(),
            })?
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &AlertMessage) -> Result<()> {
        let from: Mailbox = message.from.parse().map_err(|e| {
            UpstreamError::transport(SERVICE, format!("invalid sender address: {e}"))
        })?;
        let to: Mailbox = message.to.parse().map_err(|e| {
            UpstreamError::transport(SERVICE, format!("invalid recipient address: {e}"))
        })?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e.to_string()))?;

        Ok(())
    }
}

/// Render the alert for a failure.
pub fn render(
    event: &FailureEvent,
    from: &str,
    to: &str,
    failed_at: DateTime<Utc>,
) -> AlertMessage {
    let amount = format!("{} {}", event.amount_display(), event.currency_display());
    let failed_at = failed_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let dashboard = format!("https://dashboard.stripe.com/payments/{}", event.payment_id);

    let rows = [
        ("Payment ID", event.payment_id.as_str()),
        ("Customer Email", event.customer_email.as_str()),
        ("Customer ID", event.customer_id.as_str()),
        ("Amount", amount.as_str()),
        ("Failure Code", event.failure_code_display()),
        ("Failure Message", event.failure_message_display()),
        ("Failed At", failed_at.as_str()),
    ];

    let mut text = String::from("A customer payment has failed.\n\n");
    for (label, value) in rows {
        text.push_str(&format!("{:<16} {}\n", format!("{label}:"), value));
    }
    text.push_str("\nNext steps:\n");
    for (i, step) in NEXT_STEPS.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, step));
    }
    text.push_str(&format!("\nStripe dashboard: {dashboard}\n"));

    let mut html = String::from(
        "<h2 style=\"color:#c0392b\">Payment Failed</h2>\n\
         <p>A customer payment has failed.</p>\n\
         <table cellpadding=\"6\" style=\"border-collapse:collapse\">\n",
    );
    for (label, value) in rows {
        html.push_str(&format!(
            "<tr><td><strong>{}</strong></td><td>{}</td></tr>\n",
            label,
            htmlescape::encode_minimal(value)
        ));
    }
    html.push_str("</table>\n<h3>Next steps</h3>\n<ol>\n");
    for step in NEXT_STEPS {
        html.push_str(&format!("<li>{step}</li>\n"));
    }
    html.push_str(&format!(
        "</ol>\n<p><a href=\"{}\">Open in Stripe dashboard</a></p>\n",
        htmlescape::encode_attribute(&dashboard)
    ));

    AlertMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Payment failed: {}", event.customer_email),
        text,
        html,
    }
}

/// Sends failure alerts by email
#[derive(Clone)]
pub struct AlertNotifier {
    config: Option<EmailConfig>,
    transport: Option<Arc<dyn MailTransport>>,
    activity: Arc<ActivityLog>,
}

impl std::fmt::Debug for AlertNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertNotifier")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl AlertNotifier {
    /// Create a notifier backed by SMTP. `config` is `None` when email is
    /// not configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn from_config(config: Option<EmailConfig>, activity: Arc<ActivityLog>) -> Result<Self> {
        let transport = match &config {
            Some(config) => Some(Arc::new(SmtpMailer::new(config)?) as Arc<dyn MailTransport>),
            None => None,
        };
        Ok(Self {
            config,
            transport,
            activity,
        })
    }

    /// Create a notifier with an explicit transport.
    pub fn with_transport(
        config: Option<EmailConfig>,
        transport: Arc<dyn MailTransport>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            transport: config.as_ref().map(|_| transport),
            config,
            activity,
        }
    }

    /// Whether sender credentials are present
    pub fn is_configured(&self) -> bool {
        self.config.is_some() && self.transport.is_some()
    }

    /// Configured alert recipient, if any
    pub fn recipient(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.recipient.as_str())
    }

    /// Send an alert. Returns `true` when the relay accepted the message.
    pub async fn notify(&self, event: &FailureEvent) -> bool {
        match self.try_notify(event).await {
            Ok(recipient) => {
                self.activity.info(
                    "Alert email sent",
                    Some(json!({ "paymentId": event.payment_id, "to": recipient })),
                );
                true
            }
            Err(e) => {
                self.activity.error(
                    "Alert email failed",
                    Some(json!({ "paymentId": event.payment_id, "error": e.to_string() })),
                );
                false
            }
        }
    }

    async fn try_notify(&self, event: &FailureEvent) -> Result<String> {
        let missing = ConfigError::Missing {
            capability: "email",
            variable: "GMAIL_USER/GMAIL_APP_PASSWORD",
        };
        let (Some(config), Some(transport)) = (&self.config, &self.transport) else {
            return Err(missing.into());
        };

        let message = render(event, &config.sender, &config.recipient, Utc::now());
        transport.send(&message).await?;
        Ok(message.to)
    }
}
