use anyhow::Result;

use crate::detect::result::DetectionFrame;

/// Source of per-frame detections.
///
/// This is where camera capture, decoding and inference plug in. None of
/// that lives in this crate; implementations hand over finished detections
/// in model space together with the current display size.
pub trait DetectionSource: Send {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Next frame of detections, or `None` once the source is exhausted.
    ///
    /// A frame without detections is a valid result and must still be
    /// returned so the caller keeps its cadence.
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>>;
}
