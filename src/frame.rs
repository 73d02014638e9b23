//! Captured frames.
//!
//! - `Frame`: packed RGB8 pixels plus dimensions and a capture index.
//!
//! Frames are owned by the detection loop. They are handed to the detector and
//! the display by reference and are never shared with notification tasks.

use anyhow::{anyhow, Result};

/// Bytes per pixel for packed RGB8.
pub const RGB_CHANNELS: usize = 3;

/// One captured camera frame.
pub struct Frame {
    pixels: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Monotonic capture counter assigned by the source, starting at 1.
    pub index: u64,
}

impl Frame {
    /// Build a frame, checking the buffer length against the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} RGB bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
        })
    }

    /// A uniformly filled frame. Useful for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, index: u64, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..len / RGB_CHANNELS {
            pixels.extend_from_slice(&rgb);
        }
        Self::new(pixels, width, height, index)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let err = Frame::new(vec![0u8; 10], 2, 2, 1).err().unwrap();
        assert!(err.to_string().contains("expected 12"));
    }

    #[test]
    fn filled_frame_repeats_color() -> Result<()> {
        let frame = Frame::filled(2, 1, 7, [1, 2, 3])?;
        assert_eq!(frame.pixels(), &[1, 2, 3, 1, 2, 3]);
        assert_eq!(frame.index, 7);
        Ok(())
    }
}
