//! Detection loop.
//!
//! `Idle -> Running -> Terminated`. Each running cycle:
//! 1. acquire a frame (failure is fatal)
//! 2. detect, then count detections of the target class
//! 3. apply notification outcomes that arrived since the last frame
//! 4. fire the alert if the latch allows it
//! 5. render the overlay, colored by the alerting status
//! 6. stop on operator request, signal, or frame limit
//!
//! The loop takes the camera and display by value so both are released on
//! every exit path, including a failed frame grab.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::alert::{AlertContext, AlertLatch, Dispatcher, NotifyOutcome};
use crate::detect::{count_class, Detection, DetectorBackend};
use crate::display::{DisplaySink, Overlay};
use crate::ingest::FrameSource;

/// Per-frame status, recomputed every cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStatus {
    pub person_count: usize,
    /// `person_count > threshold` and an alert has been delivered.
    pub is_alerting: bool,
}

/// Loop parameters.
#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub region: String,
    pub threshold: usize,
    pub target_class_id: u32,
    /// Stop after this many frames. `None` runs until stopped.
    pub max_frames: Option<u64>,
    /// How long termination waits for in-flight notifications.
    pub shutdown_grace: Duration,
    pub rearm_on_failure: bool,
}

/// Why the loop stopped without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Quit key in the display window.
    Operator,
    /// Ctrl-C or another external stop signal.
    Signal,
    FrameLimit,
}

/// What a finished run did.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub frames: u64,
    pub triggers: usize,
    pub notifications_launched: usize,
    pub notifications_delivered: usize,
    pub notifications_failed: usize,
    pub alert_sent: bool,
    pub peak_count: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Default)]
struct Counters {
    frames: u64,
    triggers: usize,
    delivered: usize,
    failed: usize,
    peak_count: usize,
}

/// Owns the alert latch and dispatcher for one process run.
pub struct Monitor {
    settings: MonitorSettings,
    latch: AlertLatch,
    dispatcher: Dispatcher,
    stop: Arc<AtomicBool>,
    counters: Counters,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, dispatcher: Dispatcher, stop: Arc<AtomicBool>) -> Self {
        Self {
            latch: AlertLatch::new(settings.rearm_on_failure),
            settings,
            dispatcher,
            stop,
            counters: Counters::default(),
        }
    }

    pub fn latch(&self) -> &AlertLatch {
        &self.latch
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run until stopped or until the camera or detector fails.
    ///
    /// Camera and display are dropped before this returns, whatever the outcome.
    pub fn run<S, D, V>(mut self, source: S, detector: &mut D, display: V) -> Result<RunSummary>
    where
        S: FrameSource,
        D: DetectorBackend + ?Sized,
        V: DisplaySink,
    {
        log::info!(
            "monitor running: region={} threshold={} class={} detector={}",
            self.settings.region,
            self.settings.threshold,
            self.settings.target_class_id,
            detector.name()
        );

        let outcome = self.cycle(source, detector, display);

        let late = self.dispatcher.drain(self.settings.shutdown_grace);
        self.apply_outcomes(late);
        if self.dispatcher.in_flight() > 0 {
            log::warn!(
                "abandoning {} notification task(s) still in flight",
                self.dispatcher.in_flight()
            );
        }

        let stop_reason = outcome.map_err(|e| {
            log::error!(
                "monitor terminated after {} frames: {:#}",
                self.counters.frames,
                e
            );
            e
        })?;

        let summary = self.summary(stop_reason);
        log::info!(
            "monitor stopped ({:?}): frames={} peak={} triggers={} delivered={} failed={} alert_sent={}",
            summary.stop_reason,
            summary.frames,
            summary.peak_count,
            summary.triggers,
            summary.notifications_delivered,
            summary.notifications_failed,
            summary.alert_sent
        );
        Ok(summary)
    }

    /// The running state. Owns camera and display so both drop on return.
    fn cycle<S, D, V>(
        &mut self,
        mut source: S,
        detector: &mut D,
        mut display: V,
    ) -> Result<StopReason>
    where
        S: FrameSource,
        D: DetectorBackend + ?Sized,
        V: DisplaySink,
    {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(StopReason::Signal);
            }
            if self
                .settings
                .max_frames
                .is_some_and(|limit| self.counters.frames >= limit)
            {
                return Ok(StopReason::FrameLimit);
            }

            let frame = source
                .next_frame()
                .context("failed to grab frame from camera")?;
            let detections = detector
                .detect(&frame)
                .with_context(|| format!("detection failed on frame #{}", frame.index))?;

            let status = self.evaluate(&detections);

            let overlay = Overlay::plan(&self.settings.region, &status, &detections, |id| {
                detector.class_label(id)
            });
            display.show(&frame, &overlay)?;

            if display.stop_requested()? {
                return Ok(StopReason::Operator);
            }
        }
    }

    /// Process one frame's detections: count, apply outcomes, maybe trigger.
    pub fn evaluate(&mut self, detections: &[Detection]) -> FrameStatus {
        self.counters.frames += 1;
        let person_count = count_class(detections, self.settings.target_class_id);
        self.counters.peak_count = self.counters.peak_count.max(person_count);

        let outcomes = self.dispatcher.poll();
        self.apply_outcomes(outcomes);

        if self.latch.should_trigger(person_count, self.settings.threshold) {
            self.trigger(person_count);
        }

        FrameStatus {
            person_count,
            is_alerting: person_count > self.settings.threshold && self.latch.is_sent(),
        }
    }

    /// Wait up to `grace` for in-flight notifications and apply their outcomes.
    pub fn settle(&mut self, grace: Duration) {
        let outcomes = self.dispatcher.drain(grace);
        self.apply_outcomes(outcomes);
    }

    fn trigger(&mut self, person_count: usize) {
        let alert = AlertContext {
            region: self.settings.region.clone(),
            count: person_count,
            threshold: self.settings.threshold,
        };
        log::warn!(
            "crowd threshold exceeded in {}: {} people (threshold {}), alerting {} recipient(s)",
            alert.region,
            alert.count,
            alert.threshold,
            self.dispatcher.recipients().len()
        );
        let launched = self.dispatcher.dispatch(&alert);
        self.latch.begin_dispatch(launched);
        self.counters.triggers += 1;
    }

    fn apply_outcomes(&mut self, outcomes: Vec<NotifyOutcome>) {
        for outcome in outcomes {
            match &outcome.result {
                Ok(()) => {
                    self.counters.delivered += 1;
                    self.latch.mark_sent();
                    log::info!(
                        "alert email sent to {} ({}) for {}",
                        outcome.recipient.label,
                        outcome.recipient.address,
                        self.settings.region
                    );
                }
                Err(reason) => {
                    self.counters.failed += 1;
                    self.latch.record_failure();
                    log::error!(
                        "failed to send alert email to {}: {}",
                        outcome.recipient.label,
                        reason
                    );
                }
            }
        }
    }

    fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            frames: self.counters.frames,
            triggers: self.counters.triggers,
            notifications_launched: self.dispatcher.launched(),
            notifications_delivered: self.counters.delivered,
            notifications_failed: self.counters.failed,
            alert_sent: self.latch.is_sent(),
            peak_count: self.counters.peak_count,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{LatchState, LogNotifier, Recipient};
    use crate::detect::{BoundingBox, PERSON_CLASS_ID};

    fn settings() -> MonitorSettings {
        MonitorSettings {
            region: "Region 234".to_string(),
            threshold: 8,
            target_class_id: PERSON_CLASS_ID,
            max_frames: None,
            shutdown_grace: Duration::from_secs(5),
            rearm_on_failure: true,
        }
    }

    fn monitor() -> Monitor {
        let dispatcher = Dispatcher::new(
            Arc::new(LogNotifier),
            vec![
                Recipient::new("Police Station E2", "police@example.org"),
                Recipient::new("Central Control Room", "control@example.org"),
            ],
        );
        Monitor::new(settings(), dispatcher, Arc::new(AtomicBool::new(false)))
    }

    fn crowd(people: usize, others: usize) -> Vec<Detection> {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let mut detections = vec![Detection::new(PERSON_CLASS_ID, bbox, 0.9); people];
        detections.extend(vec![Detection::new(2, bbox, 0.9); others]);
        detections
    }

    #[test]
    fn counts_only_target_class() {
        let mut monitor = monitor();
        let status = monitor.evaluate(&crowd(3, 20));
        assert_eq!(status.person_count, 3);
        assert_eq!(monitor.dispatcher().launched(), 0);
    }

    #[test]
    fn below_threshold_never_alerts() {
        let mut monitor = monitor();
        let status = monitor.evaluate(&crowd(5, 0));
        assert_eq!(
            status,
            FrameStatus {
                person_count: 5,
                is_alerting: false
            }
        );
        assert_eq!(monitor.latch().state(), LatchState::Armed);
    }

    #[test]
    fn exceeding_threshold_launches_two_notifications() {
        let mut monitor = monitor();
        let status = monitor.evaluate(&crowd(10, 0));

        assert_eq!(monitor.dispatcher().launched(), 2);
        assert!(!status.is_alerting);
        assert!(matches!(
            monitor.latch().state(),
            LatchState::Dispatching { pending: 2, .. }
        ));
    }

    #[test]
    fn frames_during_dispatch_do_not_retrigger() {
        let mut monitor = monitor();
        monitor.evaluate(&crowd(10, 0));
        // Outcomes may or may not have arrived; either way no second sequence.
        monitor.evaluate(&crowd(12, 0));
        monitor.evaluate(&crowd(15, 0));
        assert_eq!(monitor.dispatcher().launched(), 2);
    }

    #[test]
    fn alerting_after_delivery_tracks_count() {
        let mut monitor = monitor();
        monitor.evaluate(&crowd(10, 0));
        monitor.settle(Duration::from_secs(5));
        assert!(monitor.latch().is_sent());

        assert!(monitor.evaluate(&crowd(9, 0)).is_alerting);
        assert!(!monitor.evaluate(&crowd(8, 0)).is_alerting);
        assert!(monitor.evaluate(&crowd(20, 0)).is_alerting);
        assert_eq!(monitor.dispatcher().launched(), 2);
    }
}
