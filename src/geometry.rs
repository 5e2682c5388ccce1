//! Corner geometry for document pose stability.
//!
//! All coordinates are normalized to [0,1] relative to the frame extent, so
//! thresholds are resolution-independent.

use serde::{Deserialize, Serialize};

/// A 2-D point in normalized [0,1] image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &NormalizedPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Four detected document corners in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentCorners {
    pub top_left: NormalizedPoint,
    pub top_right: NormalizedPoint,
    pub bottom_left: NormalizedPoint,
    pub bottom_right: NormalizedPoint,
}

impl DocumentCorners {
    pub fn new(
        top_left: NormalizedPoint,
        top_right: NormalizedPoint,
        bottom_left: NormalizedPoint,
        bottom_right: NormalizedPoint,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Largest per-corner displacement between this set and `other`.
    pub fn max_drift(&self, other: &DocumentCorners) -> f32 {
        self.top_left
            .distance_to(&other.top_left)
            .max(self.top_right.distance_to(&other.top_right))
            .max(self.bottom_left.distance_to(&other.bottom_left))
            .max(self.bottom_right.distance_to(&other.bottom_right))
    }

    /// True when every corner moved strictly less than `threshold` against
    /// `other`. Symmetric: drift is a distance, so the argument order does
    /// not matter.
    pub fn is_stable_against(&self, other: &DocumentCorners, threshold: f32) -> bool {
        self.max_drift(other) < threshold
    }
}
