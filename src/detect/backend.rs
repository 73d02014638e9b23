use anyhow::Result;

use crate::detect::labels::coco_label;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend is an opaque model: a frame goes in, class-labelled boxes in
/// frame pixel coordinates come out. The detection loop never looks past this
/// trait, so tests substitute scripted backends for a real model.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Boxes must be expressed in the coordinate space of `frame`.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Human-readable label for a class id. Defaults to the COCO names.
    fn class_label(&self, class_id: u32) -> String {
        coco_label(class_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class {}", class_id))
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
