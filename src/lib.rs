//! Stampede Watch
//!
//! A webcam crowd-density monitor. Every frame is run through an object
//! detector, people are counted, and the first time the count exceeds the
//! configured threshold a single alert email goes out to two recipients.
//!
//! # Module Structure
//!
//! - `ingest`: camera sources (V4L2 devices, synthetic `stub://`)
//! - `detect`: detector backend trait, YOLOv8 decoding, stub and tract backends
//! - `alert`: single-shot latch, message formatting, notifiers, dispatcher
//! - `display`: overlay planning and display sinks
//! - `monitor`: the detection loop
//! - `config`: file + environment configuration

pub mod alert;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod monitor;

pub use alert::{
    AlertContext, AlertLatch, Dispatcher, LatchState, LogNotifier, Notifier, NotifyOutcome,
    Recipient, SmtpNotifier, SmtpSettings,
};
pub use detect::{BoundingBox, Detection, DetectorBackend, StubBackend, PERSON_CLASS_ID};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
#[cfg(feature = "display-highgui")]
pub use display::HighGuiDisplay;
pub use display::{DisplaySink, HeadlessDisplay, Overlay};
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use monitor::{FrameStatus, Monitor, MonitorSettings, RunSummary, StopReason};
