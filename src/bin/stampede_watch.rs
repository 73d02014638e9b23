//! stampede_watch - webcam crowd-density monitor
//!
//! This daemon:
//! 1. Opens the configured camera (index, device path, or stub://)
//! 2. Runs the person detector on every frame
//! 3. Sends one alert email per run to both recipients when the crowd
//!    exceeds the threshold
//! 4. Shows the annotated stream until `q` or Ctrl-C

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stampede_watch::{
    config::StampedeConfig, CameraSource, DetectorBackend, Dispatcher, LogNotifier, Monitor,
    MonitorSettings, Notifier, SmtpNotifier, StubBackend,
};

const WINDOW_TITLE: &str = "Stampede Detection System";

#[derive(Parser, Debug)]
#[command(author, version, about = "Webcam crowd-density monitor with a single-shot email alert")]
struct Args {
    /// JSON config file.
    #[arg(long, env = "STAMPEDE_CONFIG")]
    config: Option<PathBuf>,

    /// Run without a display window (status goes to the log).
    #[arg(long)]
    headless: bool,

    /// Log alert emails instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = StampedeConfig::load(args.config.as_deref())?;

    let notifier: Arc<dyn Notifier> = if args.dry_run {
        log::warn!("dry run: alert emails will be logged, not sent");
        Arc::new(LogNotifier)
    } else {
        Arc::new(SmtpNotifier::new(&cfg.smtp)?)
    };
    let dispatcher = Dispatcher::new(notifier, cfg.recipients.clone());

    let mut detector = open_detector(&cfg)?;
    detector.warm_up().context("detector warm-up failed")?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let settings = MonitorSettings {
        region: cfg.region.clone(),
        threshold: cfg.threshold,
        target_class_id: cfg.person_class_id,
        max_frames: args.max_frames,
        shutdown_grace: cfg.alert.shutdown_grace,
        rearm_on_failure: cfg.alert.rearm_on_failure,
    };
    let monitor = Monitor::new(settings, dispatcher, stop);

    let camera = CameraSource::open(cfg.camera.clone())
        .with_context(|| format!("could not open camera {}", cfg.camera.device))?;

    log::info!("stampede detector running for {}. press 'q' (or Ctrl-C) to exit", cfg.region);

    let summary = if args.headless {
        monitor.run(camera, detector.as_mut(), stampede_watch::HeadlessDisplay::new())?
    } else {
        run_windowed(monitor, camera, detector.as_mut())?
    };

    if summary.alert_sent {
        log::info!("alert delivered during this run");
    }
    Ok(())
}

#[cfg(feature = "display-highgui")]
fn run_windowed(
    monitor: Monitor,
    camera: CameraSource,
    detector: &mut dyn DetectorBackend,
) -> Result<stampede_watch::RunSummary> {
    let display = stampede_watch::HighGuiDisplay::open(WINDOW_TITLE)?;
    monitor.run(camera, detector, display)
}

#[cfg(not(feature = "display-highgui"))]
fn run_windowed(
    _monitor: Monitor,
    _camera: CameraSource,
    _detector: &mut dyn DetectorBackend,
) -> Result<stampede_watch::RunSummary> {
    Err(anyhow!(
        "'{}' window requires the display-highgui feature; rerun with --headless",
        WINDOW_TITLE
    ))
}

fn open_detector(cfg: &StampedeConfig) -> Result<Box<dyn DetectorBackend>> {
    if cfg.detector.is_stub() {
        // Rises past the threshold and back so stub runs exercise the alert.
        return Ok(Box::new(StubBackend::crowd_wave(cfg.threshold.saturating_add(4))));
    }

    #[cfg(feature = "backend-tract")]
    {
        let backend = stampede_watch::TractBackend::new(
            &cfg.detector.model_path,
            cfg.detector.input_size,
            cfg.detector.input_size,
        )?
        .with_thresholds(cfg.detector.confidence, cfg.detector.iou);
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "model {} requires the backend-tract feature (or set STAMPEDE_MODEL=stub://)",
            cfg.detector.model_path
        ))
    }
}
