//! Frame sources.
//!
//! - Local V4L2 cameras by index or device path (feature: camera-v4l2)
//! - Synthetic `stub://` source (testing, dry runs)
//!
//! Every source yields packed RGB8 `Frame`s. A failed open or read is fatal to
//! the detection loop; sources do not retry.

mod camera;
#[cfg(feature = "camera-v4l2")]
mod normalize;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats, FrameSource};
