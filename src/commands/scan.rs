use super::init::scanner;
use crate::types::CapturedImage;
use std::sync::Mutex as SyncMutex;
use tauri::command;

// Auto-captured documents land here until the host polls them; capture
// callbacks cannot cross the IPC boundary.
lazy_static::lazy_static! {
    static ref LAST_CAPTURE: SyncMutex<Option<CapturedImage>> = SyncMutex::new(None);
}

/// Start document scanning with auto-capture
///
/// The auto-captured document is retrieved with `poll_captured_document`
/// or written to disk with `save_captured_document`.
#[command]
pub async fn start_document_scanning() -> Result<(), String> {
    let scanner = scanner().await?;

    // A stale result from an earlier scan must not satisfy this one's poll.
    LAST_CAPTURE
        .lock()
        .map_err(|_| "Mutex poisoned".to_string())?
        .take();

    let result = scanner
        .start_document_scanning(|image| {
            log::info!(
                "Document auto-captured: {} ({}x{})",
                image.id,
                image.width,
                image.height
            );
            *LAST_CAPTURE.lock().expect("capture slot lock poisoned") = Some(image);
        })
        .await;

    match result {
        Ok(()) => {
            log::info!("Document scanning started");
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to start document scanning: {}", e);
            Err(format!("Failed to start document scanning: {}", e))
        }
    }
}

/// Stop document scanning and clear tracking state
#[command]
pub async fn stop_document_scanning() -> Result<(), String> {
    let scanner = scanner().await?;
    scanner.stop_document_scanning();
    Ok(())
}

/// Capture the currently detected document immediately
#[command]
pub async fn capture_document() -> Result<CapturedImage, String> {
    let scanner = scanner().await?;
    match scanner.capture_document().await {
        Ok(image) => {
            log::info!(
                "Document captured manually: {} ({}x{})",
                image.id,
                image.width,
                image.height
            );
            Ok(image)
        }
        Err(e) => {
            log::error!("Failed to capture document: {}", e);
            Err(format!("Failed to capture document: {}", e))
        }
    }
}

/// Retrieve and clear the auto-captured document, if one has arrived
#[command]
pub async fn poll_captured_document() -> Result<Option<CapturedImage>, String> {
    let image = LAST_CAPTURE
        .lock()
        .map_err(|_| "Mutex poisoned".to_string())?
        .take();
    if let Some(image) = &image {
        log::debug!("Delivering auto-captured document {}", image.id);
    }
    Ok(image)
}

/// Save the most recent auto-captured document to disk
///
/// PNG unless the path ends in .jpg/.jpeg. The stored capture is kept, so
/// saving and polling can happen in either order.
#[command]
pub async fn save_captured_document(file_path: String) -> Result<String, String> {
    let image = LAST_CAPTURE
        .lock()
        .map_err(|_| "Mutex poisoned".to_string())?
        .clone()
        .ok_or_else(|| "No captured document available".to_string())?;

    log::info!("Saving captured document {} to {}", image.id, file_path);

    let img = image::RgbImage::from_vec(image.width, image.height, image.data.to_vec())
        .ok_or_else(|| "Captured data does not match its dimensions".to_string())?;
    let dynamic_img = image::DynamicImage::ImageRgb8(img);

    let format = if file_path.to_lowercase().ends_with(".jpg")
        || file_path.to_lowercase().ends_with(".jpeg")
    {
        image::ImageFormat::Jpeg
    } else {
        image::ImageFormat::Png
    };

    let file_path_clone = file_path.clone();
    match tokio::task::spawn_blocking(move || dynamic_img.save_with_format(&file_path_clone, format))
        .await
    {
        Ok(Ok(())) => {
            log::info!("Document saved to: {}", file_path);
            Ok(format!("Document saved to {}", file_path))
        }
        Ok(Err(e)) => {
            log::error!("Failed to save document: {}", e);
            Err(format!("Failed to save document: {}", e))
        }
        Err(e) => {
            log::error!("Task join error: {}", e);
            Err("Failed to execute save task".to_string())
        }
    }
}
