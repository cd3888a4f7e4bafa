//! Detector-space to display-space geometry.
//!
//! Detectors report boxes in a fixed model resolution (e.g. 416x416 for
//! Tiny YOLOv2). Zones are declared in display space, so every box is
//! clamped and rescaled before classification.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle. The coordinate space is implied by context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    #[serde(alias = "w")]
    pub width: f32,
    #[serde(alias = "h")]
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive containment: points on any edge are inside.
    pub fn contains(&self, point: Point) -> bool {
        self.x <= point.x
            && point.x <= self.x + self.width
            && self.y <= point.y
            && point.y <= self.y + self.height
    }

    /// Representative point of a detected object: horizontal center, bottom
    /// edge (where the feet touch the floor). Both coordinates are truncated
    /// toward zero.
    pub fn anchor(&self) -> Point {
        Point {
            x: (self.x + self.width / 2.0).trunc(),
            y: (self.y + self.height).trunc(),
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rescales boxes from model resolution to display resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    model_width: f32,
    model_height: f32,
}

impl CoordinateMapper {
    /// Fails on a zero, negative or non-finite model resolution.
    pub fn new(model_width: f32, model_height: f32) -> Result<Self> {
        for (name, value) in [("width", model_width), ("height", model_height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!(
                    "model {} must be a positive finite number, got {}",
                    name,
                    value
                ));
            }
        }
        Ok(Self {
            model_width,
            model_height,
        })
    }

    /// Map a model-space box onto a `display_width` x `display_height` canvas.
    ///
    /// Clamping happens in model space before scaling, so boxes hanging off
    /// the frame never produce negative or oversized display rectangles.
    /// A zero-sized display yields a zero-area rectangle.
    pub fn to_display(&self, bbox: &Rect, display_width: f32, display_height: f32) -> Rect {
        let display_width = sanitize_extent(display_width);
        let display_height = sanitize_extent(display_height);

        let x = clamp_or_zero(bbox.x, display_width);
        let y = clamp_or_zero(bbox.y, display_height);
        let width = clamp_or_zero(bbox.width, display_width - x);
        let height = clamp_or_zero(bbox.height, display_height - y);

        let sx = display_width / self.model_width;
        let sy = display_height / self.model_height;

        Rect {
            x: x * sx,
            y: y * sy,
            width: width * sx,
            height: height * sy,
        }
    }
}

fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// NaN coordinates collapse to the origin rather than poisoning the zone test.
fn clamp_or_zero(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max.max(0.0))
    }
}
