//! In-memory capture doubles
//!
//! A fake device, provider and authorization source with call counters and
//! scriptable outcomes, standing in for the native backend in tests.

use super::synthetic;
use crate::device::{CaptureCompletion, CaptureDevice, DeviceProvider, FrameHandler};
use crate::errors::ScanError;
use crate::permissions::{Authorization, AuthorizationStatus};
use crate::types::{CameraDeviceInfo, CameraPosition, VideoFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Capture device that records every interaction.
///
/// Still captures complete immediately with a synthetic image unless
/// completions are held, in which case they queue until released. The peak
/// number of simultaneously outstanding requests is tracked so tests can
/// assert the one-request-at-a-time contract.
pub struct FakeCamera {
    device_id: String,
    position: CameraPosition,
    running: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    handler: Mutex<Option<FrameHandler>>,
    hold_completions: AtomicBool,
    held: Mutex<VecDeque<CaptureCompletion>>,
    next_failure: Mutex<Option<String>>,
    flash_requests: Mutex<Vec<bool>>,
    outstanding: AtomicUsize,
    peak_outstanding: AtomicUsize,
}

impl FakeCamera {
    pub fn new(position: CameraPosition) -> Self {
        Self {
            device_id: format!("fake-{}", position),
            position,
            running: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            handler: Mutex::new(None),
            hold_completions: AtomicBool::new(false),
            held: Mutex::new(VecDeque::new()),
            next_failure: Mutex::new(None),
            flash_requests: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            peak_outstanding: AtomicUsize::new(0),
        }
    }

    /// Queue completions instead of resolving them immediately.
    pub fn hold_completions(&self) {
        self.hold_completions.store(true, Ordering::SeqCst);
    }

    /// Resolve the oldest held completion with a synthetic image. Returns
    /// false when nothing is held.
    pub fn release_next(&self) -> bool {
        let completion = self
            .held
            .lock()
            .expect("held completions lock poisoned")
            .pop_front();
        match completion {
            Some(completion) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                completion(Ok(synthetic::synthetic_image()));
                true
            }
            None => false,
        }
    }

    /// Make the next still capture fail with `reason`.
    pub fn fail_next_capture(&self, reason: &str) {
        *self
            .next_failure
            .lock()
            .expect("next failure lock poisoned") = Some(reason.to_string());
    }

    /// Deliver a frame through the installed handler, as the device's
    /// delivery context would. Frames without a handler are dropped.
    pub fn emit_frame(&self, frame: VideoFrame) {
        let handler = self
            .handler
            .lock()
            .expect("frame handler lock poisoned")
            .clone();
        if let Some(handler) = handler {
            handler(Arc::new(frame));
        }
    }

    pub fn has_frame_handler(&self) -> bool {
        self.handler
            .lock()
            .expect("frame handler lock poisoned")
            .is_some()
    }

    pub fn start_count(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Flash setting of every capture request, in order.
    pub fn flash_requests(&self) -> Vec<bool> {
        self.flash_requests
            .lock()
            .expect("flash requests lock poisoned")
            .clone()
    }

    pub fn captures_requested(&self) -> usize {
        self.flash_requests
            .lock()
            .expect("flash requests lock poisoned")
            .len()
    }

    /// Highest number of capture requests that were outstanding at once.
    pub fn peak_concurrent_captures(&self) -> usize {
        self.peak_outstanding.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for FakeCamera {
    fn id(&self) -> &str {
        &self.device_id
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn start(&self) -> Result<(), ScanError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), ScanError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn install_frame_handler(&self, handler: FrameHandler) -> Result<(), ScanError> {
        *self.handler.lock().expect("frame handler lock poisoned") = Some(handler);
        Ok(())
    }

    fn capture_still(&self, flash: bool, completion: CaptureCompletion) {
        self.flash_requests
            .lock()
            .expect("flash requests lock poisoned")
            .push(flash);
        let outstanding = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_outstanding.fetch_max(outstanding, Ordering::SeqCst);

        let failure = self
            .next_failure
            .lock()
            .expect("next failure lock poisoned")
            .take();
        if let Some(reason) = failure {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            completion(Err(ScanError::CaptureFailed(reason)));
            return;
        }

        if self.hold_completions.load(Ordering::SeqCst) {
            self.held
                .lock()
                .expect("held completions lock poisoned")
                .push_back(completion);
            return;
        }

        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        completion(Ok(synthetic::synthetic_image()));
    }
}

/// Provider over zero, one or two fake cameras.
///
/// Mirrors the production facing rules: an absent facing falls back to the
/// other camera unless strict mode is on.
pub struct FakeProvider {
    front: Option<Arc<FakeCamera>>,
    back: Option<Arc<FakeCamera>>,
    strict: bool,
}

impl FakeProvider {
    pub fn with_back_camera() -> Self {
        Self {
            front: None,
            back: Some(Arc::new(FakeCamera::new(CameraPosition::Back))),
            strict: false,
        }
    }

    pub fn with_front_camera() -> Self {
        Self {
            front: Some(Arc::new(FakeCamera::new(CameraPosition::Front))),
            back: None,
            strict: false,
        }
    }

    pub fn with_both_cameras() -> Self {
        Self {
            front: Some(Arc::new(FakeCamera::new(CameraPosition::Front))),
            back: Some(Arc::new(FakeCamera::new(CameraPosition::Back))),
            strict: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            front: None,
            back: None,
            strict: false,
        }
    }

    /// Disable cross-facing fallback so a missing facing is an error.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn front_camera(&self) -> Option<Arc<FakeCamera>> {
        self.front.clone()
    }

    pub fn back_camera(&self) -> Option<Arc<FakeCamera>> {
        self.back.clone()
    }
}

impl DeviceProvider for FakeProvider {
    fn device_for(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, ScanError> {
        let (wanted, other) = match position {
            CameraPosition::Front => (&self.front, &self.back),
            CameraPosition::Back => (&self.back, &self.front),
        };

        if let Some(camera) = wanted {
            let device: Arc<dyn CaptureDevice> = Arc::clone(camera);
            return Ok(device);
        }
        if !self.strict {
            if let Some(camera) = other {
                let device: Arc<dyn CaptureDevice> = Arc::clone(camera);
                return Ok(device);
            }
        }
        Err(ScanError::DeviceNotAvailable(format!(
            "no {} camera configured",
            position
        )))
    }

    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, ScanError> {
        let mut devices = Vec::new();
        if let Some(camera) = &self.front {
            devices.push(
                CameraDeviceInfo::new(camera.id().to_string(), "Fake Front Camera".to_string())
                    .with_position(CameraPosition::Front),
            );
        }
        if let Some(camera) = &self.back {
            devices.push(
                CameraDeviceInfo::new(camera.id().to_string(), "Fake Back Camera".to_string())
                    .with_position(CameraPosition::Back),
            );
        }
        Ok(devices)
    }
}

/// Authorization source with a scriptable prompt outcome.
pub struct FakeAuthorization {
    status: Mutex<AuthorizationStatus>,
    grant_on_request: bool,
    requests: Arc<AtomicUsize>,
}

impl FakeAuthorization {
    pub fn granted() -> Self {
        Self {
            status: Mutex::new(AuthorizationStatus::Granted),
            grant_on_request: true,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        Self {
            status: Mutex::new(AuthorizationStatus::Denied),
            grant_on_request: false,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Undetermined; the first prompt is accepted.
    pub fn undetermined() -> Self {
        Self {
            status: Mutex::new(AuthorizationStatus::Undetermined),
            grant_on_request: true,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Undetermined; the first prompt is refused.
    pub fn undetermined_denying() -> Self {
        Self {
            status: Mutex::new(AuthorizationStatus::Undetermined),
            grant_on_request: false,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of OS prompt invocations, shared with the test.
    pub fn request_count_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock().expect("authorization status lock poisoned") = status;
    }
}

impl Authorization for FakeAuthorization {
    fn status(&self) -> AuthorizationStatus {
        *self.status.lock().expect("authorization status lock poisoned")
    }

    fn request_access(&self) -> AuthorizationStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.lock().expect("authorization status lock poisoned");
        if *status == AuthorizationStatus::Undetermined {
            *status = if self.grant_on_request {
                AuthorizationStatus::Granted
            } else {
                AuthorizationStatus::Denied
            };
        }
        *status
    }
}
