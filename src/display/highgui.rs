use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::prelude::*;
use opencv::{highgui, imgproc};

use super::overlay::{Color, Overlay};
use super::DisplaySink;
use crate::frame::Frame;

const FONT_SCALE: f64 = 0.8;
const THICKNESS: i32 = 2;
const QUIT_KEY: i32 = 'q' as i32;

/// Live OpenCV window. `q` requests a stop; the window closes on drop.
pub struct HighGuiDisplay {
    window: String,
    quit: bool,
}

impl HighGuiDisplay {
    pub fn open(window: &str) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to open display window '{}'", window))?;
        Ok(Self {
            window: window.to_string(),
            quit: false,
        })
    }
}

impl DisplaySink for HighGuiDisplay {
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        let mut mat = to_bgr_mat(frame)?;

        for line in &overlay.lines {
            imgproc::put_text(
                &mut mat,
                &line.text,
                Point::new(line.x, line.y),
                imgproc::FONT_HERSHEY_SIMPLEX,
                FONT_SCALE,
                scalar(line.color),
                THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
        }
        for mark in &overlay.boxes {
            imgproc::rectangle(
                &mut mat,
                Rect::new(mark.x1, mark.y1, mark.x2 - mark.x1, mark.y2 - mark.y1),
                scalar(mark.color),
                THICKNESS,
                imgproc::LINE_8,
                0,
            )?;
            let (x, y) = mark.label_origin();
            imgproc::put_text(
                &mut mat,
                &mark.label,
                Point::new(x, y),
                imgproc::FONT_HERSHEY_SIMPLEX,
                FONT_SCALE,
                scalar(mark.color),
                THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
        }

        highgui::imshow(&self.window, &mat)?;
        let key = highgui::wait_key(1)?;
        if key >= 0 && (key & 0xFF) == QUIT_KEY {
            self.quit = true;
        }
        Ok(())
    }

    fn stop_requested(&mut self) -> Result<bool> {
        Ok(self.quit)
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.window) {
            log::warn!("failed to close display window '{}': {}", self.window, e);
        }
    }
}

fn to_bgr_mat(frame: &Frame) -> Result<Mat> {
    let rows = i32::try_from(frame.height).map_err(|_| anyhow!("frame too tall"))?;
    let cols = i32::try_from(frame.width).map_err(|_| anyhow!("frame too wide"))?;
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))?;
    let bytes = mat.data_bytes_mut()?;
    for (dst, src) in bytes.chunks_exact_mut(3).zip(frame.pixels().chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(mat)
}

fn scalar(color: Color) -> Scalar {
    Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
}
