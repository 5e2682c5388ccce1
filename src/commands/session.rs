use super::init::scanner;
use crate::types::{CameraPosition, CapturedImage};
use tauri::command;

/// Request camera permission from the OS
#[command]
pub async fn request_camera_authorization() -> Result<bool, String> {
    let scanner = scanner().await?;
    let granted = scanner.request_authorization().await;
    log::info!(
        "Camera authorization request: {}",
        if granted { "granted" } else { "not granted" }
    );
    Ok(granted)
}

/// Start the live capture session on the current camera
#[command]
pub async fn start_capture_session() -> Result<(), String> {
    let scanner = scanner().await?;
    match scanner.start_session().await {
        Ok(()) => {
            log::info!("Capture session started");
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to start capture session: {}", e);
            Err(format!("Failed to start capture session: {}", e))
        }
    }
}

/// Stop the live capture session
#[command]
pub async fn stop_capture_session() -> Result<(), String> {
    let scanner = scanner().await?;
    scanner.stop_session().await;
    log::info!("Capture session stopped");
    Ok(())
}

/// Switch between the front and back cameras
#[command]
pub async fn switch_camera() -> Result<CameraPosition, String> {
    let scanner = scanner().await?;
    match scanner.switch_camera().await {
        Ok(position) => {
            log::info!("Switched to {} camera", position);
            Ok(position)
        }
        Err(e) => {
            log::error!("Failed to switch camera: {}", e);
            Err(format!("Failed to switch camera: {}", e))
        }
    }
}

/// Toggle the flash setting; returns the new state
#[command]
pub async fn toggle_flash() -> Result<bool, String> {
    let scanner = scanner().await?;
    let enabled = scanner.toggle_flash();
    log::info!("Flash {}", if enabled { "enabled" } else { "disabled" });
    Ok(enabled)
}

/// Capture a single photo outside of document scanning
#[command]
pub async fn capture_photo() -> Result<CapturedImage, String> {
    let scanner = scanner().await?;
    match scanner.capture_photo().await {
        Ok(image) => {
            log::info!(
                "Captured photo {} ({}x{}, {} bytes)",
                image.id,
                image.width,
                image.height,
                image.size_bytes()
            );
            Ok(image)
        }
        Err(e) => {
            log::error!("Failed to capture photo: {}", e);
            Err(format!("Failed to capture photo: {}", e))
        }
    }
}
