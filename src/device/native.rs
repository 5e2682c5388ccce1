//! Production capture backend over nokhwa.

use crate::config::CameraConfig;
use crate::device::{CaptureCompletion, CaptureDevice, DeviceProvider, FrameHandler};
use crate::errors::ScanError;
use crate::types::{CameraDeviceInfo, CameraPosition, CapturedImage, VideoFrame};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use std::sync::{Arc, Mutex};

/// One physical camera driven through nokhwa's callback stream.
pub struct NokhwaCamera {
    camera: Arc<Mutex<CallbackCamera>>,
    device_id: String,
    position: CameraPosition,
}

impl NokhwaCamera {
    /// Open a camera by backend index without starting the stream.
    pub fn open(index: u32, position: CameraPosition) -> Result<Self, ScanError> {
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);

        let camera = CallbackCamera::new(CameraIndex::Index(index), requested_format, |_| {})
            .map_err(|e| {
                ScanError::DeviceNotAvailable(format!("Failed to open camera {}: {}", index, e))
            })?;

        Ok(Self {
            camera: Arc::new(Mutex::new(camera)),
            device_id: index.to_string(),
            position,
        })
    }
}

impl CaptureDevice for NokhwaCamera {
    fn id(&self) -> &str {
        &self.device_id
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn start(&self) -> Result<(), ScanError> {
        let mut camera = self.camera.lock().expect("camera lock poisoned");
        camera.open_stream().map_err(|e| {
            ScanError::DeviceNotAvailable(format!(
                "Failed to start stream on camera {}: {}",
                self.device_id, e
            ))
        })
    }

    fn stop(&self) -> Result<(), ScanError> {
        let mut camera = self.camera.lock().expect("camera lock poisoned");
        camera.stop_stream().map_err(|e| {
            ScanError::DeviceNotAvailable(format!(
                "Failed to stop stream on camera {}: {}",
                self.device_id, e
            ))
        })
    }

    fn is_running(&self) -> bool {
        self.camera
            .lock()
            .map(|c| c.is_stream_open())
            .unwrap_or(false)
    }

    fn install_frame_handler(&self, handler: FrameHandler) -> Result<(), ScanError> {
        let device_id = self.device_id.clone();

        // Wrap the handler to transform nokhwa Buffer -> VideoFrame.
        let wrapper = move |buffer: nokhwa::Buffer| {
            let frame = VideoFrame::new(
                buffer.buffer_bytes().to_vec(),
                buffer.resolution().width_x,
                buffer.resolution().height_y,
                device_id.clone(),
            );
            handler(Arc::new(frame));
        };

        let mut camera = self.camera.lock().expect("camera lock poisoned");
        camera.set_callback(wrapper).map_err(|e| {
            ScanError::DeviceNotAvailable(format!(
                "Failed to install frame handler on camera {}: {}",
                self.device_id, e
            ))
        })
    }

    fn capture_still(&self, flash: bool, completion: CaptureCompletion) {
        if flash {
            log::debug!(
                "Flash requested on camera {} but the backend exposes no light control",
                self.device_id
            );
        }

        let camera = Arc::clone(&self.camera);
        let device_id = self.device_id.clone();

        // One frame polled off the open stream stands in for a dedicated
        // still pipeline; the completion fires from this thread the way a
        // hardware delegate would.
        std::thread::spawn(move || {
            let polled = {
                let mut camera = camera.lock().expect("camera lock poisoned");
                camera.poll_frame()
            };

            let outcome = match polled {
                Ok(buffer) => Ok(CapturedImage::new(
                    buffer.buffer_bytes().to_vec(),
                    buffer.resolution().width_x,
                    buffer.resolution().height_y,
                )),
                Err(e) => Err(ScanError::CaptureFailed(format!(
                    "Camera {} returned no frame: {}",
                    device_id, e
                ))),
            };

            completion(outcome);
        });
    }
}

// Ensure the stream is released with the device handle.
impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        if let Ok(mut camera) = self.camera.lock() {
            let _ = camera.stop_stream();
        }
    }
}

// Thread-safe: all access to the inner camera goes through the mutex.
unsafe impl Send for NokhwaCamera {}
unsafe impl Sync for NokhwaCamera {}

/// Resolves physical cameras for a requested facing.
///
/// Explicit device ids from the configuration win; otherwise the device name
/// is matched against facing hints, falling back to the first enumerated
/// device when no name matches.
pub struct NokhwaProvider {
    config: CameraConfig,
}

impl NokhwaProvider {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(crate::config::ScancamConfig::default().camera)
    }

    fn configured_id(&self, position: CameraPosition) -> Option<&str> {
        match position {
            CameraPosition::Front => self.config.front_device_id.as_deref(),
            CameraPosition::Back => self.config.back_device_id.as_deref(),
        }
    }
}

impl DeviceProvider for NokhwaProvider {
    fn device_for(&self, position: CameraPosition) -> Result<Arc<dyn CaptureDevice>, ScanError> {
        if let Some(id) = self.configured_id(position) {
            let index = id.parse::<u32>().map_err(|_| {
                ScanError::DeviceNotAvailable(format!("Configured device id '{}' is not an index", id))
            })?;
            let camera = NokhwaCamera::open(index, position)?;
            return Ok(Arc::new(camera));
        }

        let cameras = query(ApiBackend::Auto).map_err(|e| {
            ScanError::DeviceNotAvailable(format!("Failed to query cameras: {}", e))
        })?;
        if cameras.is_empty() {
            return Err(ScanError::DeviceNotAvailable(
                "no capture devices present".to_string(),
            ));
        }

        let picked = cameras
            .iter()
            .find(|info| guess_position(&info.human_name()) == Some(position))
            .unwrap_or(&cameras[0]);

        let index = match picked.index() {
            CameraIndex::Index(i) => *i,
            CameraIndex::String(s) => s.parse::<u32>().map_err(|_| {
                ScanError::DeviceNotAvailable(format!("Unsupported device index '{}'", s))
            })?,
        };

        log::info!(
            "Resolved {} camera to device {} ({})",
            position,
            index,
            picked.human_name()
        );

        let camera = NokhwaCamera::open(index, position)?;
        Ok(Arc::new(camera))
    }

    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, ScanError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            ScanError::DeviceNotAvailable(format!("Failed to query cameras: {}", e))
        })?;

        Ok(cameras
            .into_iter()
            .map(|info| {
                let mut device =
                    CameraDeviceInfo::new(info.index().to_string(), info.human_name());
                if let Some(position) = guess_position(&info.human_name()) {
                    device = device.with_position(position);
                }
                device
            })
            .collect())
    }
}

/// Guess a facing from a device name. Desktop webcams rarely advertise one.
fn guess_position(name: &str) -> Option<CameraPosition> {
    let lower = name.to_lowercase();
    if lower.contains("front") || lower.contains("user") || lower.contains("facetime") {
        Some(CameraPosition::Front)
    } else if lower.contains("back") || lower.contains("rear") || lower.contains("world") {
        Some(CameraPosition::Back)
    } else {
        None
    }
}
