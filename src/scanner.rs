//! Top-level scanner facade and the observable state snapshot it publishes.

use crate::config::ScancamConfig;
use crate::device::DeviceProvider;
use crate::errors::ScanError;
use crate::geometry::DocumentCorners;
use crate::permissions::{Authorization, AuthorizationStatus};
use crate::scan::detector::DocumentDetector;
use crate::scan::DocumentScanPipeline;
use crate::session::CaptureSession;
use crate::types::{CameraPosition, CapturedImage, ScanMode, VideoFrame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Complete externally visible scanner state.
///
/// Always published as a whole snapshot so observers never see a torn
/// combination of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerState {
    pub current_position: CameraPosition,
    pub authorization_status: AuthorizationStatus,
    pub is_session_running: bool,
    pub is_flash_enabled: bool,
    pub document_scanning_mode: ScanMode,
    pub detected_corners: Option<DocumentCorners>,
    pub is_document_stable: bool,
}

impl ScannerState {
    pub fn new(position: CameraPosition, authorization: AuthorizationStatus) -> Self {
        Self {
            current_position: position,
            authorization_status: authorization,
            is_session_running: false,
            is_flash_enabled: false,
            document_scanning_mode: ScanMode::Inactive,
            detected_corners: None,
            is_document_stable: false,
        }
    }
}

impl Default for ScannerState {
    fn default() -> Self {
        Self::new(CameraPosition::Back, AuthorizationStatus::Undetermined)
    }
}

/// Single writer for [`ScannerState`], fanned out over a watch channel.
///
/// All mutation goes through [`SharedScannerState::update`], which applies
/// the closure atomically and notifies every subscriber with the finished
/// snapshot.
pub struct SharedScannerState {
    tx: watch::Sender<ScannerState>,
}

impl SharedScannerState {
    pub fn new(initial: ScannerState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn with_initial(position: CameraPosition, authorization: AuthorizationStatus) -> Self {
        Self::new(ScannerState::new(position, authorization))
    }

    /// Apply one atomic state change and publish the result.
    pub fn update(&self, apply: impl FnOnce(&mut ScannerState)) {
        self.tx.send_modify(apply);
    }

    pub fn snapshot(&self) -> ScannerState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerState> {
        self.tx.subscribe()
    }
}

/// The document scanner: a capture session plus the scan pipeline riding on
/// its frame stream, sharing one published state.
///
/// This is the single entry point hosts interact with; everything below it
/// (device selection, the still-capture bridge, stability tracking) is an
/// implementation detail.
pub struct DocumentScanner {
    session: Arc<CaptureSession>,
    pipeline: Arc<DocumentScanPipeline>,
    state: Arc<SharedScannerState>,
}

impl DocumentScanner {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        authorization: Arc<dyn Authorization>,
        detector: Arc<dyn DocumentDetector>,
        config: &ScancamConfig,
    ) -> Self {
        let mut initial = ScannerState::new(
            config.camera.default_position,
            AuthorizationStatus::Undetermined,
        );
        initial.is_flash_enabled = config.camera.flash_default;

        let state = Arc::new(SharedScannerState::new(initial));
        let session = Arc::new(CaptureSession::new(
            provider,
            authorization,
            Arc::clone(&state),
            &config.camera,
        ));
        let pipeline = Arc::new(DocumentScanPipeline::new(
            Arc::clone(&session),
            detector,
            Arc::clone(&state),
            &config.scanning,
        ));

        Self {
            session,
            pipeline,
            state,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ScannerState {
        self.state.snapshot()
    }

    /// Subscribe to state snapshots; the receiver immediately holds the
    /// current one.
    pub fn subscribe(&self) -> watch::Receiver<ScannerState> {
        self.state.subscribe()
    }

    pub async fn request_authorization(&self) -> bool {
        self.session.request_authorization().await
    }

    pub async fn start_session(&self) -> Result<(), ScanError> {
        self.session.start_session().await
    }

    pub async fn stop_session(&self) {
        self.session.stop_session().await
    }

    pub async fn switch_camera(&self) -> Result<CameraPosition, ScanError> {
        self.session.switch_camera().await
    }

    pub fn toggle_flash(&self) -> bool {
        self.session.toggle_flash()
    }

    pub fn is_flash_enabled(&self) -> bool {
        self.session.is_flash_enabled()
    }

    pub fn is_session_running(&self) -> bool {
        self.session.is_running()
    }

    /// One-shot still capture outside of document scanning.
    pub async fn capture_photo(&self) -> Result<CapturedImage, ScanError> {
        self.session.capture_photo().await
    }

    /// Enter scanning mode; `on_capture` fires once when a stable document
    /// is auto-captured.
    pub async fn start_document_scanning(
        &self,
        on_capture: impl FnOnce(CapturedImage) + Send + 'static,
    ) -> Result<(), ScanError> {
        self.pipeline.start_document_scanning(on_capture).await
    }

    pub fn stop_document_scanning(&self) {
        self.pipeline.stop_document_scanning();
    }

    /// Capture the currently detected document on user demand.
    pub async fn capture_document(&self) -> Result<CapturedImage, ScanError> {
        self.pipeline.capture_document().await
    }

    pub fn scanning_mode(&self) -> ScanMode {
        self.pipeline.mode()
    }

    pub fn stable_frame_count(&self) -> u32 {
        self.pipeline.stable_frame_count()
    }

    pub fn frames_dropped(&self) -> u64 {
        self.pipeline.frames_dropped()
    }

    /// Drive one frame through the analysis path directly; used by hosts
    /// that source frames themselves and by offline tests.
    pub async fn process_frame(&self, frame: Arc<VideoFrame>) {
        self.pipeline.process_frame(frame).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::detector::NullDetector;
    use crate::testing::{FakeAuthorization, FakeProvider};

    fn scanner() -> DocumentScanner {
        DocumentScanner::new(
            Arc::new(FakeProvider::with_back_camera()),
            Arc::new(FakeAuthorization::granted()),
            Arc::new(NullDetector),
            &ScancamConfig::default(),
        )
    }

    #[test]
    fn test_initial_state_matches_config() {
        let state = scanner().state();
        assert_eq!(state.current_position, CameraPosition::Back);
        assert_eq!(state.document_scanning_mode, ScanMode::Inactive);
        assert!(!state.is_session_running);
        assert!(!state.is_flash_enabled);
        assert!(state.detected_corners.is_none());
    }

    #[test]
    fn test_flash_toggle_is_published() {
        let scanner = scanner();
        let rx = scanner.subscribe();

        assert!(scanner.toggle_flash());
        assert!(rx.borrow().is_flash_enabled);
        assert!(!scanner.toggle_flash());
        assert!(!rx.borrow().is_flash_enabled);
    }

    #[tokio::test]
    async fn test_scanning_mode_is_published_on_start_and_stop() {
        let scanner = scanner();

        scanner.start_document_scanning(|_| {}).await.unwrap();
        assert_eq!(scanner.state().document_scanning_mode, ScanMode::Scanning);
        assert_eq!(scanner.scanning_mode(), ScanMode::Scanning);

        // Stopping before any frame leaves no residue.
        scanner.stop_document_scanning();
        assert_eq!(scanner.state().document_scanning_mode, ScanMode::Inactive);
        assert!(!scanner.state().is_document_stable);
        assert!(scanner.state().detected_corners.is_none());
        assert_eq!(scanner.stable_frame_count(), 0);
    }

    #[tokio::test]
    async fn test_capture_document_without_detection_fails() {
        let scanner = scanner();
        let result = scanner.capture_document().await;
        assert!(matches!(result, Err(ScanError::NoDocumentDetected)));
    }
}
