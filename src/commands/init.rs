use crate::config::ScancamConfig;
use crate::device::{DeviceProvider, NokhwaProvider};
use crate::permissions::SystemAuthorization;
use crate::scan::detector::{DocumentDetector, NullDetector};
use crate::scanner::{DocumentScanner, ScannerState};
use crate::types::CameraDeviceInfo;
use std::sync::Arc;
use std::sync::Mutex as SyncMutex;
use tauri::command;
use tokio::sync::RwLock;

// One scanner per process; commands all route through it. The detector slot
// is filled by the host before initialization, since detectors cannot cross
// the IPC boundary.
lazy_static::lazy_static! {
    static ref SCANNER: Arc<RwLock<Option<Arc<DocumentScanner>>>> = Arc::new(RwLock::new(None));
    static ref DETECTOR: SyncMutex<Option<Arc<dyn DocumentDetector>>> = SyncMutex::new(None);
}

/// Register the corner detector used by every scanner initialized afterwards.
///
/// Call this from Rust host code before invoking `initialize_scanner`.
/// Without a registration the scanner falls back to a detector that never
/// finds a document.
pub fn register_detector(detector: Arc<dyn DocumentDetector>) {
    *DETECTOR.lock().expect("detector slot lock poisoned") = Some(detector);
}

/// Shared accessor for command implementations.
pub(crate) async fn scanner() -> Result<Arc<DocumentScanner>, String> {
    SCANNER
        .read()
        .await
        .clone()
        .ok_or_else(|| "Scanner not initialized".to_string())
}

/// Initialize the document scanner, optionally from a config file
#[command]
pub async fn initialize_scanner(config_path: Option<String>) -> Result<ScannerState, String> {
    let config = match config_path {
        Some(path) => ScancamConfig::load_from_file(&path)?,
        None => ScancamConfig::load_or_default(),
    };

    let detector = DETECTOR
        .lock()
        .map_err(|_| "Mutex poisoned".to_string())?
        .clone();
    let detector = match detector {
        Some(detector) => detector,
        None => {
            log::warn!("No document detector registered; documents will never be detected");
            Arc::new(NullDetector)
        }
    };

    let scanner = Arc::new(DocumentScanner::new(
        Arc::new(NokhwaProvider::new(config.camera.clone())),
        Arc::new(SystemAuthorization::new()),
        detector,
        &config,
    ));
    let state = scanner.state();

    let mut slot = SCANNER.write().await;
    if let Some(previous) = slot.take() {
        log::warn!("Scanner re-initialized; shutting down the previous instance");
        previous.stop_document_scanning();
        previous.stop_session().await;
    }
    *slot = Some(scanner);

    log::info!(
        "Scanner initialized (default camera: {})",
        state.current_position
    );
    Ok(state)
}

/// Shut down the scanner and release the camera
#[command]
pub async fn shutdown_scanner() -> Result<(), String> {
    let scanner = SCANNER.write().await.take();
    match scanner {
        Some(scanner) => {
            scanner.stop_document_scanning();
            scanner.stop_session().await;
            log::info!("Scanner shut down");
        }
        None => {
            log::debug!("Shutdown requested but no scanner was initialized");
        }
    }
    Ok(())
}

/// Get the current scanner state snapshot
#[command]
pub async fn get_scanner_state() -> Result<ScannerState, String> {
    let scanner = scanner().await?;
    Ok(scanner.state())
}

/// List cameras visible to the capture backend
#[command]
pub async fn get_available_cameras() -> Result<Vec<CameraDeviceInfo>, String> {
    let provider = NokhwaProvider::new(ScancamConfig::load_or_default().camera);
    match tokio::task::spawn_blocking(move || provider.list_devices()).await {
        Ok(Ok(cameras)) => {
            log::info!("Found {} cameras", cameras.len());
            for camera in &cameras {
                log::debug!(
                    "Camera: {} - {} (Available: {})",
                    camera.id,
                    camera.name,
                    camera.is_available
                );
            }
            Ok(cameras)
        }
        Ok(Err(e)) => {
            log::error!("Failed to list cameras: {}", e);
            Err(format!("Failed to list cameras: {}", e))
        }
        Err(e) => {
            log::error!("Camera enumeration task failed: {}", e);
            Err("Failed to execute camera enumeration task".to_string())
        }
    }
}

/// Get crate name, version and description
#[command]
pub async fn get_scancam_info() -> Result<crate::CrateInfo, String> {
    Ok(crate::get_info())
}
