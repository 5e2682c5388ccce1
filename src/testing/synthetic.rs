//! Synthetic frames, corner geometry and scripted detectors
//!
//! Deterministic inputs for driving the scan pipeline offline: frames with
//! recognizable content, corner quadrilaterals at known positions, and
//! detectors that replay a prepared outcome sequence.

use crate::geometry::{DocumentCorners, NormalizedPoint};
use crate::scan::detector::{DetectionError, DocumentDetector};
use crate::types::{CapturedImage, VideoFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Create a synthetic RGB frame with a gradient pattern.
///
/// The gradient varies with `frame_number` so consecutive frames are
/// distinguishable by content, not just by id.
pub fn synthetic_frame(frame_number: u64, width: u32, height: u32) -> VideoFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    VideoFrame::new(data, width, height, "synthetic".to_string())
}

/// Create a small synthetic still image.
pub fn synthetic_image() -> CapturedImage {
    let width = 640;
    let height = 480;
    let data = vec![0x80u8; (width * height * 3) as usize];
    CapturedImage::new(data, width, height)
}

/// A document quadrilateral centered in the frame, occupying roughly the
/// middle 60% in both axes.
pub fn centered_corners() -> DocumentCorners {
    DocumentCorners::new(
        NormalizedPoint::new(0.2, 0.2),
        NormalizedPoint::new(0.8, 0.2),
        NormalizedPoint::new(0.2, 0.8),
        NormalizedPoint::new(0.8, 0.8),
    )
}

/// [`centered_corners`] translated by `(dx, dy)`; every corner moves the
/// same amount, so the drift against the centered quad is exactly the
/// translation distance.
pub fn shifted_corners(dx: f32, dy: f32) -> DocumentCorners {
    DocumentCorners::new(
        NormalizedPoint::new(0.2 + dx, 0.2 + dy),
        NormalizedPoint::new(0.8 + dx, 0.2 + dy),
        NormalizedPoint::new(0.2 + dx, 0.8 + dy),
        NormalizedPoint::new(0.8 + dx, 0.8 + dy),
    )
}

/// Detector that reports the same outcome for every frame and counts calls.
pub struct StaticDetector {
    corners: Option<DocumentCorners>,
    calls: AtomicUsize,
}

impl StaticDetector {
    /// Always detects `corners`.
    pub fn detecting(corners: DocumentCorners) -> Self {
        Self {
            corners: Some(corners),
            calls: AtomicUsize::new(0),
        }
    }

    /// Never detects anything.
    pub fn blind() -> Self {
        Self {
            corners: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of frames analyzed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentDetector for StaticDetector {
    fn detect(&self, _frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.corners)
    }
}

/// Detector that replays a prepared outcome per frame, in order.
///
/// Once the script is exhausted every further frame reports no detection.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Result<Option<DocumentCorners>, DetectionError>>>,
}

impl ScriptedDetector {
    pub fn new(outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
        }
    }

    /// Script that detects `corners` for `frames` consecutive frames.
    pub fn steady(corners: DocumentCorners, frames: usize) -> Self {
        Self::new(vec![Ok(Some(corners)); frames])
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script lock poisoned").len()
    }
}

impl DocumentDetector for ScriptedDetector {
    fn detect(&self, _frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError> {
        self.script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frame_has_expected_size() {
        let frame = synthetic_frame(0, 64, 48);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.size_bytes(), 64 * 48 * 3);
    }

    #[test]
    fn test_synthetic_frames_vary_by_number() {
        let a = synthetic_frame(1, 32, 32);
        let b = synthetic_frame(2, 32, 32);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_shifted_corners_drift_matches_translation() {
        let base = centered_corners();
        let moved = shifted_corners(0.03, 0.04);
        let drift = base.max_drift(&moved);
        assert!((drift - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_scripted_detector_replays_in_order() {
        let detector = ScriptedDetector::new(vec![
            Ok(Some(centered_corners())),
            Ok(None),
            Err(DetectionError::new("blur")),
        ]);
        let frame = synthetic_frame(0, 8, 8);

        assert!(detector.detect(&frame).unwrap().is_some());
        assert!(detector.detect(&frame).unwrap().is_none());
        assert!(detector.detect(&frame).is_err());
        // Exhausted scripts read as no detection.
        assert!(detector.detect(&frame).unwrap().is_none());
    }
}
