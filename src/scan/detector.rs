//! Corner detector boundary.

use crate::geometry::DocumentCorners;
use crate::types::VideoFrame;
use thiserror::Error;

/// Failure inside a corner detector.
///
/// Per-frame and transient: the pipeline logs it and moves on without
/// touching stability state, which distinguishes it from a successful
/// "no document in this frame" result.
#[derive(Debug, Clone, Error)]
#[error("document detection failed: {message}")]
pub struct DetectionError {
    pub message: String,
}

impl DetectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Corner detector capability: one frame in, zero or one quadrilateral out.
///
/// `detect` is called on a blocking-friendly context, one frame at a time;
/// implementations may take their time and must not assume any particular
/// thread. Corners are returned in normalized [0,1] coordinates.
pub trait DocumentDetector: Send + Sync {
    fn detect(&self, frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError>;
}

/// Detector used when the host application has not registered one.
///
/// Never detects anything, so document scanning stays inert while session
/// and still-capture operations work normally.
#[derive(Debug, Default)]
pub struct NullDetector;

impl DocumentDetector for NullDetector {
    fn detect(&self, _frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError> {
        Ok(None)
    }
}
