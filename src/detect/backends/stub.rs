use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::PERSON_CLASS_ID;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Scripted backend for tests and `stub://` runs.
///
/// Each call to `detect` returns the next entry of the script, cycling when
/// the script is exhausted. An empty script never detects anything.
pub struct StubBackend {
    script: Script,
    cursor: usize,
}

enum Script {
    Frames(Vec<Vec<Detection>>),
    Counts(Vec<usize>),
    /// Walks one person per frame between zero and `peak`.
    Wave {
        peak: usize,
        level: usize,
        rising: bool,
    },
}

impl StubBackend {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Replay explicit per-frame detections.
    pub fn scripted(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: Script::Frames(script),
            cursor: 0,
        }
    }

    /// Replay per-frame person counts, laying the boxes out on a grid.
    pub fn with_person_counts(counts: &[usize]) -> Self {
        Self {
            script: Script::Counts(counts.to_vec()),
            cursor: 0,
        }
    }

    /// Counts rising from zero to `peak` and back, one step per frame.
    ///
    /// Boxes are generated per frame, so a large peak costs nothing up front.
    pub fn crowd_wave(peak: usize) -> Self {
        Self {
            script: Script::Wave {
                peak,
                level: 0,
                rising: true,
            },
            cursor: 0,
        }
    }

    fn next_entry(&mut self) -> Vec<Detection> {
        let cursor = self.cursor;
        self.cursor = self.cursor.wrapping_add(1);
        match &mut self.script {
            Script::Frames(frames) if frames.is_empty() => Vec::new(),
            Script::Frames(frames) => frames[cursor % frames.len()].clone(),
            Script::Counts(counts) if counts.is_empty() => Vec::new(),
            Script::Counts(counts) => people(counts[cursor % counts.len()]),
            Script::Wave {
                peak,
                level,
                rising,
            } => {
                let count = *level;
                if *rising && *level < *peak {
                    *level += 1;
                } else if *rising {
                    *rising = false;
                    *level = level.saturating_sub(1);
                } else if *level > 0 {
                    *level -= 1;
                } else {
                    *rising = true;
                }
                people(count)
            }
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let (w, h) = (frame.width as f32, frame.height as f32);
        Ok(self
            .next_entry()
            .into_iter()
            .map(|d| Detection {
                bbox: d.bbox.clamped(w, h),
                ..d
            })
            .collect())
    }
}

fn people(count: usize) -> Vec<Detection> {
    (0..count).map(grid_person).collect()
}

fn grid_person(slot: usize) -> Detection {
    let col = (slot % 6) as f32;
    let row = (slot / 6) as f32;
    let x1 = 20.0 + col * 100.0;
    let y1 = 120.0 + row * 170.0;
    Detection::new(
        PERSON_CLASS_ID,
        BoundingBox::new(x1, y1, x1 + 80.0, y1 + 160.0),
        0.9,
    )
}
