use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::message::AlertContext;
use super::notifier::{Notifier, Recipient};

/// Result of one notification task.
#[derive(Clone, Debug)]
pub struct NotifyOutcome {
    pub recipient: Recipient,
    /// `Err` carries the failure reason for logging.
    pub result: Result<(), String>,
}

impl NotifyOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Launches one notification thread per recipient and collects outcomes.
///
/// Threads are not joined. A hung transport stalls only its own thread; the
/// loop keeps polling and simply sees no outcome for it.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    recipients: Vec<Recipient>,
    tx: Sender<NotifyOutcome>,
    rx: Receiver<NotifyOutcome>,
    in_flight: usize,
    launched: usize,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<Recipient>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            notifier,
            recipients,
            tx,
            rx,
            in_flight: 0,
            launched: 0,
        }
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Tasks launched but not yet reported.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Total tasks launched over the dispatcher's life.
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Start one independent notification task per recipient.
    ///
    /// Returns the number of tasks started. A task that cannot be spawned is
    /// reported as a failed outcome so every launch yields exactly one outcome.
    pub fn dispatch(&mut self, alert: &AlertContext) -> usize {
        for (idx, recipient) in self.recipients.iter().enumerate() {
            let notifier = Arc::clone(&self.notifier);
            let recipient = recipient.clone();
            let alert = alert.clone();
            let tx = self.tx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("notify-{}", idx))
                .spawn({
                    let recipient = recipient.clone();
                    move || {
                        let result = notifier
                            .notify(&recipient, &alert)
                            .map_err(|e| format!("{:#}", e));
                        let _ = tx.send(NotifyOutcome { recipient, result });
                    }
                });
            if let Err(e) = spawned {
                let _ = self.tx.send(NotifyOutcome {
                    recipient,
                    result: Err(format!("failed to spawn notification thread: {}", e)),
                });
            }
        }
        let started = self.recipients.len();
        self.in_flight += started;
        self.launched += started;
        started
    }

    /// Outcomes that have arrived since the last poll. Never blocks.
    pub fn poll(&mut self) -> Vec<NotifyOutcome> {
        let outcomes: Vec<NotifyOutcome> = self.rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }

    /// Wait up to `grace` for every in-flight task to report.
    pub fn drain(&mut self, grace: Duration) -> Vec<NotifyOutcome> {
        let deadline = Instant::now() + grace;
        let mut outcomes = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.in_flight -= 1;
                    outcomes.push(outcome);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        outcomes
    }
}
