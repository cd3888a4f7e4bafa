use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// One detected object, as handed over by the external detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label (person, car, dog, ...).
    pub label: String,
    /// Bounding box in model-space pixels.
    #[serde(alias = "box")]
    pub bbox: Rect,
}

impl Detection {
    pub fn new(label: impl Into<String>, bbox: Rect) -> Self {
        Self {
            label: label.into(),
            bbox,
        }
    }
}

/// All detections for a single frame plus the canvas they are shown on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub detections: Vec<Detection>,
    pub display_width: f32,
    pub display_height: f32,
}

impl DetectionFrame {
    pub fn new(detections: Vec<Detection>, display_width: f32, display_height: f32) -> Self {
        Self {
            detections,
            display_width,
            display_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
