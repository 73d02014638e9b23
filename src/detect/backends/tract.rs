#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::detect::yolo::{self, DecodeParams, InputScale};
use crate::frame::Frame;

/// Tract-based backend for YOLOv8 ONNX detection models.
///
/// Frames are stretched to the model input size, normalized to `0..1` RGB,
/// and the single detection head is decoded back into frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
    params: DecodeParams,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            input_width,
            input_height
        );

        Ok(Self {
            model,
            input_width,
            input_height,
            params: DecodeParams {
                confidence: 0.25,
                iou: 0.45,
            },
        })
    }

    /// Override the default confidence and IoU thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.params = DecodeParams { confidence, iou };
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| {
                anyhow!("frame buffer does not match {}x{}", frame.width, frame.height)
            })?;
        let resized = image::imageops::resize(
            &image,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;

        let (channels, anchors) = match output.shape() {
            [1, channels, anchors] => (*channels, *anchors),
            other => return Err(anyhow!("unexpected YOLO output shape {:?}", other)),
        };
        let data = output
            .as_slice::<f32>()
            .context("model output tensor was not f32")?;

        let geometry = InputScale::stretch(
            frame.width,
            frame.height,
            self.input_width,
            self.input_height,
        );
        yolo::decode(data, channels, anchors, self.params, geometry)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(self.input_width, self.input_height, 0, [0, 0, 0])?;
        self.detect(&blank).map(|_| ())
    }
}
