//! Scancam: Live document scanning camera engine for Tauri applications
//!
//! This crate drives a device camera as a document scanner: it watches the
//! live frame stream for a stably held document and captures a still
//! automatically, with manual capture, camera switching and flash control
//! alongside.
//!
//! # Features
//! - Stability-gated auto-capture of detected documents
//! - Non-blocking frame analysis with drop-based backpressure
//! - Front/back camera selection and hot switching
//! - Flash control and one-shot photo capture
//! - Pluggable corner detection behind a single trait
//! - Fully observable scanner state over a watch channel
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! scancam = "0.4"
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! use scancam;
//!
//! fn main() {
//!     scancam::register_detector(std::sync::Arc::new(MyDetector));
//!     tauri::Builder::default()
//!         .plugin(scancam::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod commands;
pub mod config;
pub mod device;
pub mod errors;
pub mod geometry;
pub mod permissions;
pub mod scan;
pub mod scanner;
pub mod session;
pub mod types;

// Testing utilities - fakes and synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use commands::register_detector;
pub use errors::ScanError;
pub use geometry::{DocumentCorners, NormalizedPoint};
pub use permissions::{Authorization, AuthorizationStatus};
pub use scan::detector::{DetectionError, DocumentDetector};
pub use scanner::{DocumentScanner, ScannerState};
pub use types::{CameraDeviceInfo, CameraPosition, CapturedImage, ScanMode, VideoFrame};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the scancam plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("scancam")
        .invoke_handler(tauri::generate_handler![
            // Initialization commands
            commands::init::initialize_scanner,
            commands::init::shutdown_scanner,
            commands::init::get_scanner_state,
            commands::init::get_available_cameras,
            commands::init::get_scancam_info,
            // Session commands
            commands::session::request_camera_authorization,
            commands::session::start_capture_session,
            commands::session::stop_capture_session,
            commands::session::switch_camera,
            commands::session::toggle_flash,
            commands::session::capture_photo,
            // Document scanning commands
            commands::scan::start_document_scanning,
            commands::scan::stop_document_scanning,
            commands::scan::capture_document,
            commands::scan::poll_captured_document,
            commands::scan::save_captured_document,
        ])
        .build()
}

/// Initialize logging for the scanning engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "scancam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
