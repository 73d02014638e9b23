//! Single-shot crowd alert.
//!
//! - `AlertLatch`: loop-owned state deciding whether a trigger may fire.
//! - `Notifier`: delivers one formatted message to one recipient.
//! - `Dispatcher`: runs one notification task per recipient and hands the
//!   outcomes back to the loop over a channel.
//!
//! Notification tasks never touch the latch. The loop applies their outcomes,
//! so every latch transition happens on a single thread.

mod dispatch;
mod latch;
mod message;
mod notifier;
mod smtp;

pub use dispatch::{Dispatcher, NotifyOutcome};
pub use latch::{AlertLatch, LatchState};
pub use message::{html_body, plain_body, subject, AlertContext};
pub use notifier::{LogNotifier, Notifier, Recipient};
pub use smtp::{validate_address, SmtpNotifier, SmtpSettings};
