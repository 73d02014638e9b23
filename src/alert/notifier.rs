use anyhow::Result;

use super::message::{plain_body, subject, AlertContext};

/// One alert recipient: a mail address and the team name used in the greeting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub label: String,
}

impl Recipient {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }
}

/// Delivers one alert message to one recipient.
///
/// Implementations are shared across notification threads and must not
/// retry; the caller decides what a failure means.
pub trait Notifier: Send + Sync {
    /// Notifier identifier.
    fn name(&self) -> &'static str;

    /// Format and send a single message. `Ok` means the message was accepted.
    fn notify(&self, recipient: &Recipient, alert: &AlertContext) -> Result<()>;
}

/// Dry-run notifier: logs the message it would send and reports success.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, recipient: &Recipient, alert: &AlertContext) -> Result<()> {
        log::warn!(
            "dry run: would email {} <{}>: {} / {}",
            recipient.label,
            recipient.address,
            subject(alert),
            plain_body(alert)
        );
        Ok(())
    }
}
