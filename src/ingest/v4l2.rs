//! V4L2 camera capture.
//!
//! Opens a local device node, negotiates a capture format, and converts each
//! buffer to packed RGB8. The mmap stream borrows the device, so both live in
//! one self-referencing struct and are released together on drop.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::camera::{CameraConfig, CameraStats};
use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::frame::Frame;

pub(crate) struct DeviceCamera {
    config: CameraConfig,
    path: String,
    state: DeviceState,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCamera {
    pub(crate) fn open(config: CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = config.device_path();
        let mut device = v4l::Device::with_path(&path)
            .with_context(|| format!("could not open camera {} ({})", config.device, path))?;
        let mut requested = device.format().context("read v4l2 format")?;
        requested.width = config.width;
        requested.height = config.height;
        requested.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&requested) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("CameraSource: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "camera {} negotiated unsupported pixel format {}",
                path,
                format.fourcc
            )
        })?;

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("CameraSource: failed to set fps on {}: {}", path, err);
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "CameraSource: opened {} ({}x{} {:?})",
            path,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            config,
            path,
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let path = &self.path;
        let rgb = self.state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, meta) = stream
                .next()
                .with_context(|| format!("failed to grab frame from {}", path))?;
            let used = match meta.bytesused as usize {
                0 => buf.len(),
                n => n.min(buf.len()),
            };
            normalize_to_rgb(&buf[..used], width, height, format)
        })?;

        self.frame_count += 1;
        Frame::new(rgb, self.width, self.height, self.frame_count)
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
