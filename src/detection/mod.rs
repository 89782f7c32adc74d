//! Object detection and spoken announcement
//!
//! Frames flow from a [`FrameSource`] into the [`FrameAnalyzer`], which keeps
//! one frame in flight and one pending, runs the [`Detector`] on the blocking
//! pool and forwards each [`DetectionSet`]. The [`DetectionAnnouncer`] turns
//! changed sets into spoken utterances.

mod analyzer;
mod announcer;
pub mod capture;
mod frames;
mod pipeline;
pub mod scaling;
mod vision;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use analyzer::{DetectionSet, FrameAnalyzer, FrameSubmitter};
pub use announcer::DetectionAnnouncer;
pub use frames::{DirectoryFrameSource, FrameSource, load_frame};
pub use pipeline::{DetectionPipeline, DetectionSnapshot};
pub use vision::VisionDetector;

use crate::Result;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            f32::midpoint(self.left, self.right),
            f32::midpoint(self.top, self.bottom),
        )
    }

    /// Scale both axes independently
    #[must_use]
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self::new(
            self.left * sx,
            self.top * sy,
            self.right * sx,
            self.bottom * sy,
        )
    }
}

/// One recognized object in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// In `[0, 1]`
    pub confidence: f32,
    /// Image pixel coordinates
    pub bounding_box: BoundingBox,
}

/// One camera frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded image bytes
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation needed to display the frame upright
    pub rotation_degrees: u16,
    pub timestamp: DateTime<Utc>,
}

/// Inference adapter
///
/// Called from the blocking pool; implementations may block.
pub trait Detector: Send + Sync {
    /// Detect objects in `frame`, keeping only those with confidence at or
    /// above `threshold`. Order is the model's output order.
    ///
    /// # Errors
    ///
    /// Returns error if inference fails for this frame
    fn detect(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>>;
}

impl<T: Detector + ?Sized> Detector for std::sync::Arc<T> {
    fn detect(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(frame, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_geometry() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert!((b.width() - 20.0).abs() < f32::EPSILON);
        assert!((b.height() - 40.0).abs() < f32::EPSILON);
        assert_eq!(b.center(), (20.0, 40.0));
        assert_eq!(b.scale(2.0, 0.5), BoundingBox::new(20.0, 10.0, 60.0, 30.0));
    }
}
