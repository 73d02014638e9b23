//! Status display.
//!
//! - `Overlay`: what to draw on a frame, computed without touching pixels.
//! - `HeadlessDisplay`: logs the status lines; stop comes from the signal flag.
//! - `HighGuiDisplay`: OpenCV window with `q` to quit (feature: display-highgui).
//!
//! The display is owned by the detection loop and released when dropped.

#[cfg(feature = "display-highgui")]
mod highgui;
mod overlay;

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "display-highgui")]
pub use highgui::HighGuiDisplay;
pub use overlay::{BoxMark, Color, Overlay, TextLine};

/// Where annotated frames go.
pub trait DisplaySink {
    /// Present a frame with its overlay.
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;

    /// True once the operator asked to stop.
    fn stop_requested(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Display for runs without a window.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames_shown: u64,
    last_status: Option<String>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.frames_shown += 1;
        let status = overlay.lines.get(1).map(|line| line.text.as_str());
        let count = overlay.lines.get(2).map(|line| line.text.as_str());
        log::debug!(
            "frame #{} {} | {} ({} boxes)",
            frame.index,
            status.unwrap_or("-"),
            count.unwrap_or("-"),
            overlay.boxes.len()
        );

        // Status changes are worth seeing without debug logging.
        if status != self.last_status.as_deref() {
            if let Some(status) = status {
                log::info!("{}", status);
            }
            self.last_status = status.map(str::to_string);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::FrameStatus;

    #[test]
    fn headless_display_tracks_status_changes() -> Result<()> {
        let frame = Frame::filled(8, 8, 1, [0, 0, 0])?;
        let mut display = HeadlessDisplay::new();
        let label = |_| String::new();

        let calm = FrameStatus {
            person_count: 2,
            is_alerting: false,
        };
        let alarm = FrameStatus {
            person_count: 12,
            is_alerting: true,
        };
        display.show(&frame, &Overlay::plan("R", &calm, &[], label))?;
        display.show(&frame, &Overlay::plan("R", &alarm, &[], label))?;

        assert_eq!(display.frames_shown(), 2);
        assert_eq!(
            display.last_status.as_deref(),
            Some("Status: !! STAMPEDE RISK !!")
        );
        assert!(!display.stop_requested()?);
        Ok(())
    }
}
