//! Hardware capture seam.
//!
//! The session controller and scan pipeline reach capture hardware only
//! through these traits, so the core runs against in-memory doubles in tests
//! while the production backend lives in [`native`].

pub mod native;

use crate::errors::ScanError;
use crate::types::{CameraDeviceInfo, CameraPosition, CapturedImage, VideoFrame};
use std::sync::Arc;

pub use native::{NokhwaCamera, NokhwaProvider};

/// Live-frame callback installed on a device.
///
/// Invoked from the device's own delivery context for every frame; must not
/// block. Devices deliver frames one at a time and never buffer on a slow
/// consumer, which gives the pipeline its discard-if-busy semantics.
pub type FrameHandler = Arc<dyn Fn(Arc<VideoFrame>) + Send + Sync>;

/// Completion callback for one still-capture request.
///
/// Invoked exactly once, from an arbitrary context.
pub type CaptureCompletion = Box<dyn FnOnce(Result<CapturedImage, ScanError>) + Send>;

/// One capture device: a live frame stream plus a still-capture request.
pub trait CaptureDevice: Send + Sync {
    fn id(&self) -> &str;

    fn position(&self) -> CameraPosition;

    /// Open the live stream. May block; run on a blocking-friendly context.
    fn start(&self) -> Result<(), ScanError>;

    /// Stop the live stream. May block.
    fn stop(&self) -> Result<(), ScanError>;

    fn is_running(&self) -> bool;

    /// Install the live-frame handler, replacing any previous one. The
    /// handler survives stream restarts until replaced.
    fn install_frame_handler(&self, handler: FrameHandler) -> Result<(), ScanError>;

    /// Issue one still-capture request carrying the flash setting. The
    /// completion fires exactly once with the image or the failure.
    fn capture_still(&self, flash: bool, completion: CaptureCompletion);
}

/// Capability query resolving physical devices per requested facing.
pub trait DeviceProvider: Send + Sync {
    /// Resolve the best device for `position`. Implementations fall back to
    /// any available device when the facing cannot be matched and fail only
    /// when no device exists at all. May block; run on a blocking-friendly
    /// context.
    fn device_for(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, ScanError>;

    /// Enumerate devices for diagnostics and UI pickers.
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, ScanError>;
}
