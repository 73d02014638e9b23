//! SMTP delivery over implicit TLS.

use anyhow::{anyhow, Context, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use std::time::Duration;

use super::message::{html_body, plain_body, subject, AlertContext};
use super::notifier::{Notifier, Recipient};

/// SMTP endpoint and pre-shared credentials.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// From address. Defaults to `username`.
    pub sender: Option<String>,
    /// Socket timeout for one delivery.
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sender", &self.sender)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SmtpSettings {
    /// Username and password, with blank values treated as unset.
    fn credentials(&self) -> (Option<&String>, Option<&String>) {
        fn present(v: &Option<String>) -> Option<&String> {
            v.as_ref().filter(|s| !s.trim().is_empty())
        }
        (present(&self.username), present(&self.password))
    }
}

/// Sends alert mail through one SMTP relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let (Some(username), Some(password)) = settings.credentials() else {
            return Err(anyhow!(
                "SMTP credentials missing: set STAMPEDE_SMTP_USERNAME and STAMPEDE_SMTP_PASSWORD (or use --dry-run)"
            ));
        };
        let sender_address = settings.sender.as_deref().unwrap_or(username);
        let sender = Mailbox::new(
            Some("Stampede Detection System".to_string()),
            parse_address(sender_address)?,
        );

        let transport = SmtpTransport::relay(&settings.host)
            .with_context(|| format!("invalid SMTP relay {}", settings.host))?
            .port(settings.port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .timeout(Some(settings.timeout))
            .build();

        log::info!(
            "SmtpNotifier: relay {}:{} as {}",
            settings.host,
            settings.port,
            sender_address
        );
        Ok(Self { transport, sender })
    }

    fn build_message(&self, recipient: &Recipient, alert: &AlertContext) -> Result<Message> {
        let to = Mailbox::new(
            Some(recipient.label.clone()),
            parse_address(&recipient.address)?,
        );
        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject(alert))
            .multipart(MultiPart::alternative_plain_html(
                plain_body(alert),
                html_body(&recipient.label, alert),
            ))
            .context("failed to build alert message")
    }
}

impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn notify(&self, recipient: &Recipient, alert: &AlertContext) -> Result<()> {
        let message = self.build_message(recipient, alert)?;
        self.transport
            .send(&message)
            .with_context(|| format!("SMTP delivery to {} failed", recipient.address))?;
        Ok(())
    }
}

/// Check that `value` is a bare mail address such as `ops@example.org`.
pub fn validate_address(value: &str) -> Result<()> {
    parse_address(value).map(|_| ())
}

fn parse_address(value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| anyhow!("invalid email address '{}': {}", value, e))
}
