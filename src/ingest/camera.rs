//! Camera frame source.
//!
//! `CameraSource` is the loop's only view of the camera. It is opened once,
//! read frame by frame, and released when dropped.

use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[cfg(feature = "camera-v4l2")]
use super::v4l2::DeviceCamera;

/// Anything that can hand the detection loop its next frame.
pub trait FrameSource {
    /// Capture the next frame. An error is fatal to the loop.
    fn next_frame(&mut self) -> Result<Frame>;
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera index ("0"), device path ("/dev/video0"), or "stub://<name>".
    pub device: String,
    /// Target frame rate. Zero leaves the device default.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            target_fps: 0,
            width: 640,
            height: 480,
        }
    }
}

impl CameraConfig {
    pub fn is_synthetic(&self) -> bool {
        self.device.starts_with("stub://")
    }

    /// Device node for a camera index or path.
    pub fn device_path(&self) -> String {
        if self.device.chars().all(|c| c.is_ascii_digit()) && !self.device.is_empty() {
            format!("/dev/video{}", self.device)
        } else {
            self.device.clone()
        }
    }
}

/// Local camera source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    /// Open the configured camera. Failure here means the camera is unavailable.
    pub fn open(config: CameraConfig) -> Result<Self> {
        if config.is_synthetic() {
            let camera = SyntheticCamera::new(config);
            log::info!("CameraSource: opened {} (synthetic)", camera.config.device);
            return Ok(Self {
                backend: CameraBackend::Synthetic(camera),
            });
        }

        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::open(config)?),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow!(
                "could not open camera {}: device capture requires the camera-v4l2 feature",
                config.device
            ))
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let stats = self.stats();
        log::info!(
            "CameraSource: released {} after {} frames",
            stats.device,
            stats.frames_captured
        );
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!("synthetic camera has zero-sized frames"));
        }

        // Slow gray drift so consecutive frames differ.
        let shade = (self.frame_count % 64) as u8 + 64;
        Frame::filled(
            self.config.width,
            self.config.height,
            self.frame_count,
            [shade, shade, shade],
        )
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
