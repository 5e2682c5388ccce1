//! Capture session lifecycle: authorization, device selection and switching,
//! start/stop, flash, and the still-capture entry point.

pub mod photo;

use crate::config::CameraConfig;
use crate::device::{CaptureDevice, DeviceProvider, FrameHandler};
use crate::errors::ScanError;
use crate::permissions::{Authorization, AuthorizationStatus};
use crate::scanner::SharedScannerState;
use crate::types::{CameraPosition, CapturedImage};
use photo::PhotoCaptureBridge;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

struct SessionInner {
    device: Option<Arc<dyn CaptureDevice>>,
    frame_tap: Option<FrameHandler>,
    position: CameraPosition,
}

/// Owns the hardware session. Never touches frame content; the scan pipeline
/// reaches the device only through [`CaptureSession::install_frame_tap`].
///
/// Blocking hardware calls (device resolution, stream start/stop) run on the
/// blocking pool; session-control operations serialize on one async mutex so
/// reconfiguration is atomic from the outside.
pub struct CaptureSession {
    provider: Arc<dyn DeviceProvider>,
    authorization: Arc<dyn Authorization>,
    bridge: PhotoCaptureBridge,
    state: Arc<SharedScannerState>,
    inner: Mutex<SessionInner>,
    running: AtomicBool,
    flash_enabled: AtomicBool,
}

impl CaptureSession {
    pub(crate) fn new(
        provider: Arc<dyn DeviceProvider>,
        authorization: Arc<dyn Authorization>,
        state: Arc<SharedScannerState>,
        config: &CameraConfig,
    ) -> Self {
        Self {
            provider,
            authorization,
            bridge: PhotoCaptureBridge::new(),
            state,
            inner: Mutex::new(SessionInner {
                device: None,
                frame_tap: None,
                position: config.default_position,
            }),
            running: AtomicBool::new(false),
            flash_enabled: AtomicBool::new(config.flash_default),
        }
    }

    /// Query or request camera permission. Idempotent: already-granted access
    /// is reported without touching the OS.
    pub async fn request_authorization(&self) -> bool {
        let current = self.authorization.status();
        if current == AuthorizationStatus::Granted {
            self.state
                .update(|s| s.authorization_status = AuthorizationStatus::Granted);
            return true;
        }

        let authorization = Arc::clone(&self.authorization);
        let status = match tokio::task::spawn_blocking(move || authorization.request_access()).await
        {
            Ok(status) => status,
            Err(e) => {
                log::error!("Authorization request task failed: {}", e);
                AuthorizationStatus::Undetermined
            }
        };

        self.state.update(|s| s.authorization_status = status);
        log::info!("Camera authorization: {}", status);
        status == AuthorizationStatus::Granted
    }

    /// Start the hardware pipeline and await confirmation.
    ///
    /// No-op while already running. The frame-analysis tap is applied here
    /// only if the scan pipeline installed one earlier; the still output
    /// needs no configuration because every device can capture on request.
    pub async fn start_session(&self) -> Result<(), ScanError> {
        let status = self.authorization.status();
        self.state.update(|s| s.authorization_status = status);
        if status != AuthorizationStatus::Granted {
            return Err(ScanError::NotAuthorized);
        }

        let mut inner = self.inner.lock().await;
        if self.running.load(Ordering::SeqCst) {
            log::debug!("Capture session already running");
            return Ok(());
        }

        let position = inner.position;
        let device = match inner.device.clone() {
            Some(device) => device,
            None => {
                let provider = Arc::clone(&self.provider);
                let resolved = tokio::task::spawn_blocking(move || provider.device_for(position))
                    .await
                    .map_err(|e| {
                        ScanError::DeviceNotAvailable(format!(
                            "Device resolution task failed: {}",
                            e
                        ))
                    })??;
                inner.device = Some(Arc::clone(&resolved));
                resolved
            }
        };

        if let Some(tap) = inner.frame_tap.clone() {
            device.install_frame_handler(tap)?;
        }

        let starting = Arc::clone(&device);
        tokio::task::spawn_blocking(move || starting.start())
            .await
            .map_err(|e| {
                ScanError::DeviceNotAvailable(format!("Session start task failed: {}", e))
            })??;

        self.running.store(true, Ordering::SeqCst);
        self.state.update(|s| s.is_session_running = true);
        log::info!(
            "Capture session running on {} camera (device {})",
            position,
            device.id()
        );
        Ok(())
    }

    /// Stop the hardware pipeline without waiting for it to quiesce.
    ///
    /// The running flag flips immediately; the device stop happens on the
    /// blocking pool off the caller's path.
    pub async fn stop_session(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.state.update(|s| s.is_session_running = false);

        let device = self.inner.lock().await.device.clone();
        if let Some(device) = device {
            tokio::task::spawn_blocking(move || {
                if let Err(e) = device.stop() {
                    log::warn!("Failed to stop capture device: {}", e);
                }
            });
        }
        log::info!("Capture session stopped");
    }

    /// Swap to the opposite-facing device as one atomic reconfiguration.
    ///
    /// The new input is resolved, tapped, and (for a running session) started
    /// before the old input is released, so a failure at any point leaves the
    /// previous device attached and the position unchanged.
    pub async fn switch_camera(&self) -> Result<CameraPosition, ScanError> {
        let mut inner = self.inner.lock().await;
        let current = inner.position;
        let target = current.opposite();

        let provider = Arc::clone(&self.provider);
        let new_device = tokio::task::spawn_blocking(move || provider.device_for(target))
            .await
            .map_err(|e| {
                ScanError::DeviceNotAvailable(format!("Device resolution task failed: {}", e))
            })??;

        if let Some(tap) = inner.frame_tap.clone() {
            new_device.install_frame_handler(tap)?;
        }

        if self.running.load(Ordering::SeqCst) {
            let starting = Arc::clone(&new_device);
            tokio::task::spawn_blocking(move || starting.start())
                .await
                .map_err(|e| {
                    ScanError::DeviceNotAvailable(format!("Session start task failed: {}", e))
                })??;

            if let Some(old) = inner.device.take() {
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = old.stop() {
                        log::warn!("Failed to stop previous capture device: {}", e);
                    }
                });
            }
        }

        inner.device = Some(new_device);
        inner.position = target;
        self.state.update(|s| s.current_position = target);
        log::info!("Switched camera from {} to {}", current, target);
        Ok(target)
    }

    /// Toggle flash; effective on the next capture request.
    pub fn toggle_flash(&self) -> bool {
        let enabled = !self.flash_enabled.fetch_xor(true, Ordering::SeqCst);
        self.state.update(|s| s.is_flash_enabled = enabled);
        log::debug!("Flash {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn is_flash_enabled(&self) -> bool {
        self.flash_enabled.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Store the scan pipeline's frame tap and apply it to the active device.
    ///
    /// This is the only path by which anything other than the controller
    /// reconfigures the hardware session. The tap persists across device
    /// switches and session restarts.
    pub(crate) async fn install_frame_tap(&self, tap: FrameHandler) -> Result<(), ScanError> {
        let mut inner = self.inner.lock().await;
        inner.frame_tap = Some(Arc::clone(&tap));
        if let Some(device) = inner.device.clone() {
            device.install_frame_handler(tap)?;
        }
        Ok(())
    }

    /// Issue one still capture carrying the current flash setting.
    ///
    /// Fails with `SessionNotRunning` before touching the bridge when the
    /// session is inactive; otherwise delegates to the single-slot bridge.
    pub async fn capture_photo(&self) -> Result<CapturedImage, ScanError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(ScanError::SessionNotRunning);
        }

        let device = self
            .inner
            .lock()
            .await
            .device
            .clone()
            .ok_or(ScanError::SessionNotRunning)?;

        let flash = self.flash_enabled.load(Ordering::SeqCst);
        self.bridge.capture(&device, flash).await
    }
}
