use std::fmt;

/// Errors surfaced by session, capture, and scanning operations.
///
/// Every variant is returned synchronously to the caller of the failing
/// operation. Per-frame analysis failures and failed auto-captures never
/// surface here; they are logged and swallowed inside the pipeline.
#[derive(Debug)]
pub enum ScanError {
    /// Camera permission was not granted.
    NotAuthorized,
    /// No capture device could be resolved, or it could not be brought up.
    DeviceNotAvailable(String),
    /// A capture was requested while the session is not running.
    SessionNotRunning,
    /// The hardware capture request failed or returned no payload.
    CaptureFailed(String),
    /// Manual capture was requested with no detected corners held.
    NoDocumentDetected,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanError::NotAuthorized => write!(f, "Camera access not authorized"),
            ScanError::DeviceNotAvailable(msg) => write!(f, "Capture device not available: {}", msg),
            ScanError::SessionNotRunning => write!(f, "Capture session is not running"),
            ScanError::CaptureFailed(msg) => write!(f, "Still capture failed: {}", msg),
            ScanError::NoDocumentDetected => write!(f, "No document detected"),
        }
    }
}

impl std::error::Error for ScanError {}
