//! YOLOv8 output decoding.
//!
//! A YOLOv8 detection head emits one `[4 + num_classes, anchors]` matrix per
//! image: rows 0..4 hold `cx, cy, w, h` in model input pixels, the remaining
//! rows hold per-class scores. Decoding keeps the best class per anchor,
//! drops anchors below the confidence threshold, maps boxes back to frame
//! pixels, and suppresses overlapping boxes.
//!
//! This module works on plain slices so it can be tested without a model.

use anyhow::{anyhow, Result};

use crate::detect::result::{BoundingBox, Detection};

const CXYWH_OFFSET: usize = 4;

/// Geometry needed to map model-space boxes back to frame pixels.
#[derive(Clone, Copy, Debug)]
pub struct InputScale {
    /// Frame width divided by model input width.
    pub scale_x: f32,
    /// Frame height divided by model input height.
    pub scale_y: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl InputScale {
    /// Plain per-axis stretch between a frame and the model input, no padding.
    pub fn stretch(
        frame_width: u32,
        frame_height: u32,
        input_width: u32,
        input_height: u32,
    ) -> Self {
        Self {
            scale_x: frame_width as f32 / input_width as f32,
            scale_y: frame_height as f32 / input_height as f32,
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        }
    }
}

/// Thresholds applied while decoding.
#[derive(Clone, Copy, Debug)]
pub struct DecodeParams {
    pub confidence: f32,
    pub iou: f32,
}

/// Decode a row-major `[channels, anchors]` output into frame-space detections.
pub fn decode(
    output: &[f32],
    channels: usize,
    anchors: usize,
    params: DecodeParams,
    geometry: InputScale,
) -> Result<Vec<Detection>> {
    if channels <= CXYWH_OFFSET {
        return Err(anyhow!(
            "model output has {} channels, expected more than {}",
            channels,
            CXYWH_OFFSET
        ));
    }
    let expected = channels
        .checked_mul(anchors)
        .ok_or_else(|| anyhow!("model output dimensions overflow"))?;
    if output.len() != expected {
        return Err(anyhow!(
            "model output length mismatch: expected {} ({}x{}), got {}",
            expected,
            channels,
            anchors,
            output.len()
        ));
    }

    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..channels - CXYWH_OFFSET {
            let score = at(CXYWH_OFFSET + class, anchor);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score.is_nan() || best_score < params.confidence {
            continue;
        }

        let cx = at(0, anchor) * geometry.scale_x;
        let cy = at(1, anchor) * geometry.scale_y;
        let w = at(2, anchor) * geometry.scale_x;
        let h = at(3, anchor) * geometry.scale_y;
        let bbox = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
            .clamped(geometry.frame_width, geometry.frame_height);

        detections.push(Detection::new(best_class as u32, bbox, best_score));
    }

    non_max_suppression(&mut detections, params.iou);
    Ok(detections)
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| {
            detections[prev].class_id == detections[index].class_id
                && detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold
        });
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
