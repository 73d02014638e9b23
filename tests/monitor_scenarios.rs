use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use stampede_watch::display::Color;
use stampede_watch::{
    AlertContext, BoundingBox, Detection, DetectorBackend, Dispatcher, DisplaySink, Frame,
    FrameSource, LatchState, Monitor, MonitorSettings, Notifier, Overlay, Recipient, StopReason,
    StubBackend, PERSON_CLASS_ID,
};

const POLICE: &str = "police@example.org";
const CONTROL: &str = "control@example.org";

/// Yields `frames` frames, then fails like an unplugged camera.
struct TestCamera {
    frames: u64,
    served: u64,
    released: Arc<AtomicBool>,
}

impl TestCamera {
    fn new(frames: u64) -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                frames,
                served: 0,
                released: released.clone(),
            },
            released,
        )
    }
}

impl FrameSource for TestCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.served >= self.frames {
            return Err(anyhow!("camera unplugged"));
        }
        self.served += 1;
        Frame::filled(64, 48, self.served, [0, 0, 0])
    }
}

impl Drop for TestCamera {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Records every overlay; optionally asks to stop after `quit_after` frames.
struct TestDisplay {
    overlays: Arc<Mutex<Vec<Overlay>>>,
    quit_after: Option<usize>,
    released: Arc<AtomicBool>,
}

impl TestDisplay {
    fn new(quit_after: Option<usize>) -> (Self, Arc<Mutex<Vec<Overlay>>>, Arc<AtomicBool>) {
        let overlays = Arc::new(Mutex::new(Vec::new()));
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                overlays: overlays.clone(),
                quit_after,
                released: released.clone(),
            },
            overlays,
            released,
        )
    }
}

impl DisplaySink for TestDisplay {
    fn show(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.overlays.lock().unwrap().push(overlay.clone());
        Ok(())
    }

    fn stop_requested(&mut self) -> Result<bool> {
        let shown = self.overlays.lock().unwrap().len();
        Ok(self.quit_after.is_some_and(|n| shown >= n))
    }
}

impl Drop for TestDisplay {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Fails for listed addresses and counts every attempt.
struct ScriptedNotifier {
    failing: Vec<&'static str>,
    attempts: AtomicUsize,
}

impl ScriptedNotifier {
    fn new(failing: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            failing,
            attempts: AtomicUsize::new(0),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for ScriptedNotifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn notify(&self, recipient: &Recipient, _alert: &AlertContext) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&recipient.address.as_str()) {
            Err(anyhow!("535 authentication failed"))
        } else {
            Ok(())
        }
    }
}

struct FailingDetector {
    calls: usize,
}

impl DetectorBackend for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        Err(anyhow!("model crashed"))
    }
}

fn settings(max_frames: Option<u64>, rearm_on_failure: bool) -> MonitorSettings {
    MonitorSettings {
        region: "Region 234".to_string(),
        threshold: 8,
        target_class_id: PERSON_CLASS_ID,
        max_frames,
        shutdown_grace: Duration::from_secs(5),
        rearm_on_failure,
    }
}

fn monitor_with(notifier: Arc<ScriptedNotifier>, settings: MonitorSettings) -> Monitor {
    let dispatcher = Dispatcher::new(
        notifier,
        vec![
            Recipient::new("Police Station E2", POLICE),
            Recipient::new("Central Control Room", CONTROL),
        ],
    );
    Monitor::new(settings, dispatcher, Arc::new(AtomicBool::new(false)))
}

fn people(count: usize) -> Vec<Detection> {
    let bbox = BoundingBox::new(1.0, 1.0, 10.0, 20.0);
    vec![Detection::new(PERSON_CLASS_ID, bbox, 0.9); count]
}

#[test]
fn camera_failure_on_first_frame_releases_everything() {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier.clone(), settings(None, true));
    let (camera, camera_released) = TestCamera::new(0);
    let (display, overlays, display_released) = TestDisplay::new(None);
    let mut detector = FailingDetector { calls: 0 };

    let err = monitor.run(camera, &mut detector, display).unwrap_err();

    assert!(format!("{:#}", err).contains("camera unplugged"));
    assert!(camera_released.load(Ordering::SeqCst));
    assert!(display_released.load(Ordering::SeqCst));
    assert_eq!(detector.calls, 0);
    assert!(overlays.lock().unwrap().is_empty());
    assert_eq!(notifier.attempts(), 0);
}

#[test]
fn camera_failure_mid_run_is_fatal() {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier, settings(None, true));
    let (camera, camera_released) = TestCamera::new(3);
    let (display, overlays, display_released) = TestDisplay::new(None);
    let mut detector = StubBackend::with_person_counts(&[1]);

    assert!(monitor.run(camera, &mut detector, display).is_err());
    assert_eq!(overlays.lock().unwrap().len(), 3);
    assert!(camera_released.load(Ordering::SeqCst));
    assert!(display_released.load(Ordering::SeqCst));
}

#[test]
fn detector_failure_is_fatal() {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier, settings(None, true));
    let (camera, camera_released) = TestCamera::new(10);
    let (display, _overlays, _released) = TestDisplay::new(None);
    let mut detector = FailingDetector { calls: 0 };

    let err = monitor.run(camera, &mut detector, display).unwrap_err();
    assert!(format!("{:#}", err).contains("model crashed"));
    assert_eq!(detector.calls, 1);
    assert!(camera_released.load(Ordering::SeqCst));
}

#[test]
fn crowd_over_threshold_sends_both_alerts_once() -> Result<()> {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier.clone(), settings(Some(6), true));
    let (camera, _released) = TestCamera::new(100);
    let (display, _overlays, _released) = TestDisplay::new(None);
    let mut detector = StubBackend::with_person_counts(&[10]);

    let summary = monitor.run(camera, &mut detector, display)?;

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(summary.frames, 6);
    assert_eq!(summary.triggers, 1);
    assert_eq!(summary.notifications_launched, 2);
    assert_eq!(summary.notifications_delivered, 2);
    assert!(summary.alert_sent);
    assert_eq!(notifier.attempts(), 2);
    Ok(())
}

#[test]
fn quiet_crowd_never_alerts() -> Result<()> {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier.clone(), settings(Some(5), true));
    let (camera, _released) = TestCamera::new(100);
    let (display, overlays, _released) = TestDisplay::new(None);
    let mut detector = StubBackend::with_person_counts(&[5, 8, 0]);

    let summary = monitor.run(camera, &mut detector, display)?;

    assert_eq!(summary.triggers, 0);
    assert_eq!(summary.peak_count, 8);
    assert!(!summary.alert_sent);
    assert_eq!(notifier.attempts(), 0);
    for overlay in overlays.lock().unwrap().iter() {
        assert_eq!(overlay.lines[1].text, "Status: Normal Density");
    }
    Ok(())
}

#[test]
fn one_failed_recipient_still_sets_latch() {
    let notifier = ScriptedNotifier::new(vec![POLICE]);
    let mut monitor = monitor_with(notifier.clone(), settings(None, true));

    let first = monitor.evaluate(&people(10));
    assert!(!first.is_alerting);

    monitor.settle(Duration::from_secs(5));
    assert!(monitor.latch().is_sent());

    let next = monitor.evaluate(&people(10));
    assert!(next.is_alerting);
    assert_eq!(notifier.attempts(), 2);
}

#[test]
fn total_failure_rearms_and_retriggers() {
    let notifier = ScriptedNotifier::new(vec![POLICE, CONTROL]);
    let mut monitor = monitor_with(notifier.clone(), settings(None, true));

    monitor.evaluate(&people(10));
    monitor.settle(Duration::from_secs(5));
    assert_eq!(monitor.latch().state(), LatchState::Armed);

    // Next frame over the threshold starts a fresh sequence.
    let status = monitor.evaluate(&people(11));
    assert!(!status.is_alerting);
    monitor.settle(Duration::from_secs(5));
    assert_eq!(notifier.attempts(), 4);
}

#[test]
fn total_failure_without_rearm_stays_silent() {
    let notifier = ScriptedNotifier::new(vec![POLICE, CONTROL]);
    let mut monitor = monitor_with(notifier.clone(), settings(None, false));

    monitor.evaluate(&people(10));
    monitor.settle(Duration::from_secs(5));
    assert_eq!(monitor.latch().state(), LatchState::Exhausted);

    monitor.evaluate(&people(30));
    monitor.settle(Duration::from_secs(5));
    assert_eq!(notifier.attempts(), 2);
    assert!(!monitor.latch().is_sent());
}

#[test]
fn operator_quit_stops_loop() -> Result<()> {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier, settings(None, true));
    let (camera, camera_released) = TestCamera::new(100);
    let (display, _overlays, display_released) = TestDisplay::new(Some(4));
    let mut detector = StubBackend::new();

    let summary = monitor.run(camera, &mut detector, display)?;

    assert_eq!(summary.stop_reason, StopReason::Operator);
    assert_eq!(summary.frames, 4);
    assert!(camera_released.load(Ordering::SeqCst));
    assert!(display_released.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn stop_signal_is_checked_before_grabbing() -> Result<()> {
    let notifier = ScriptedNotifier::new(vec![]);
    let dispatcher = Dispatcher::new(notifier, vec![Recipient::new("Ops", CONTROL)]);
    let stop = Arc::new(AtomicBool::new(true));
    let monitor = Monitor::new(settings(None, true), dispatcher, stop);
    let (camera, _released) = TestCamera::new(0);
    let (display, _overlays, _released) = TestDisplay::new(None);
    let mut detector = StubBackend::new();

    let summary = monitor.run(camera, &mut detector, display)?;

    assert_eq!(summary.stop_reason, StopReason::Signal);
    assert_eq!(summary.frames, 0);
    Ok(())
}

/// Plays back person counts. On the second frame it waits until the
/// notifier has seen `wait_for` attempts, so outcomes are queued before the
/// loop polls for them.
struct PacedCrowd {
    counts: Vec<usize>,
    calls: usize,
    notifier: Arc<ScriptedNotifier>,
    wait_for: usize,
}

impl DetectorBackend for PacedCrowd {
    fn name(&self) -> &'static str {
        "paced"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        let count = self.counts[self.calls % self.counts.len()];
        self.calls += 1;
        if self.calls == 2 {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.notifier.attempts() < self.wait_for && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            // Outcome is sent right after `notify` returns.
            thread::sleep(Duration::from_millis(100));
        }
        Ok(people(count))
    }
}

#[test]
fn overlay_turns_red_once_alert_is_delivered() -> Result<()> {
    let notifier = ScriptedNotifier::new(vec![]);
    let monitor = monitor_with(notifier.clone(), settings(Some(4), true));
    let (camera, _released) = TestCamera::new(10);
    let (display, overlays, _released) = TestDisplay::new(None);
    let mut detector = PacedCrowd {
        counts: vec![10, 10, 9, 5],
        calls: 0,
        notifier: notifier.clone(),
        wait_for: 2,
    };

    let summary = monitor.run(camera, &mut detector, display)?;
    assert!(summary.alert_sent);
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.triggers, 1);

    let overlays = overlays.lock().unwrap();
    assert_eq!(overlays.len(), 4);
    assert_eq!(overlays[0].lines[1].text, "Status: Normal Density");

    let first = overlays
        .iter()
        .position(|o| o.lines[1].text == "Status: !! STAMPEDE RISK !!")
        .expect("overlay never turned red");
    assert_eq!(first, 1);
    assert!(!overlays[first].boxes.is_empty());
    assert!(overlays[first].boxes.iter().all(|b| b.color == Color::ALERT));
    assert_eq!(overlays[2].lines[1].text, "Status: !! STAMPEDE RISK !!");

    // Delivered, but the crowd has thinned out again.
    assert_eq!(overlays[3].lines[1].text, "Status: Normal Density");
    assert!(overlays[3].boxes.iter().all(|b| b.color == Color::NORMAL_BOX));
    Ok(())
}
