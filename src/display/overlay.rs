use crate::detect::Detection;
use crate::monitor::FrameStatus;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const ALERT: Color = Color::rgb(255, 0, 0);
    pub const NORMAL_COUNT: Color = Color::rgb(0, 255, 0);
    pub const NORMAL_BOX: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A line of status text anchored at its baseline origin.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

/// A detection box with its class label.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxMark {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub label: String,
    pub color: Color,
}

/// Everything drawn on one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    pub lines: Vec<TextLine>,
    pub boxes: Vec<BoxMark>,
}

const LINE_X: i32 = 10;
const LINE_SPACING: i32 = 30;
const LABEL_OFFSET: i32 = 10;

impl Overlay {
    /// Plan the overlay for a frame.
    ///
    /// Status and count turn red while alerting. Every detection gets a box,
    /// whatever its class; boxes are blue normally and red while alerting.
    pub fn plan<F>(
        region: &str,
        status: &FrameStatus,
        detections: &[Detection],
        label_for: F,
    ) -> Self
    where
        F: Fn(u32) -> String,
    {
        let (state, count_color, box_color) = if status.is_alerting {
            ("!! STAMPEDE RISK !!", Color::ALERT, Color::ALERT)
        } else {
            ("Normal Density", Color::NORMAL_COUNT, Color::NORMAL_BOX)
        };

        let lines = vec![
            TextLine {
                text: format!("STAMPEDE DETECTOR - {}", region),
                x: LINE_X,
                y: LINE_SPACING,
                color: Color::WHITE,
            },
            TextLine {
                text: format!("Status: {}", state),
                x: LINE_X,
                y: LINE_SPACING * 2,
                color: count_color,
            },
            TextLine {
                text: format!("People Count: {}", status.person_count),
                x: LINE_X,
                y: LINE_SPACING * 3,
                color: count_color,
            },
        ];

        let boxes = detections
            .iter()
            .map(|d| BoxMark {
                x1: d.bbox.x1 as i32,
                y1: d.bbox.y1 as i32,
                x2: d.bbox.x2 as i32,
                y2: d.bbox.y2 as i32,
                label: label_for(d.class_id),
                color: box_color,
            })
            .collect();

        Self { lines, boxes }
    }
}

impl BoxMark {
    /// Baseline origin for the label, just above the box.
    pub fn label_origin(&self) -> (i32, i32) {
        (self.x1, self.y1 - LABEL_OFFSET)
    }
}
