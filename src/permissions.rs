//! Camera authorization probing.
//!
//! Desktop platforms do not expose a uniform permission prompt; availability
//! of the native capture stack is used as the authorization proxy, with a
//! device-node check on Linux.

use serde::{Deserialize, Serialize};

/// Authorization state for camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// Access granted
    Granted,
    /// Access denied
    Denied,
    /// Not yet determined (user has not been asked, or no probe succeeded)
    Undetermined,
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::Granted => write!(f, "granted"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Detailed authorization information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationInfo {
    pub status: AuthorizationStatus,
    pub message: String,
    pub can_request: bool,
}

/// Camera permission capability.
///
/// `request_access` may block on an OS prompt and is run on a
/// blocking-friendly context by the session controller. Both methods are
/// idempotent; requesting while already granted has no side effect.
pub trait Authorization: Send + Sync {
    fn status(&self) -> AuthorizationStatus;
    fn request_access(&self) -> AuthorizationStatus;

    fn info(&self) -> AuthorizationInfo {
        let status = self.status();
        AuthorizationInfo {
            status,
            message: status.to_string(),
            can_request: status != AuthorizationStatus::Granted,
        }
    }
}

/// Authorization backed by the native capture stack.
#[derive(Debug, Default)]
pub struct SystemAuthorization;

impl SystemAuthorization {
    pub fn new() -> Self {
        Self
    }
}

impl Authorization for SystemAuthorization {
    fn status(&self) -> AuthorizationStatus {
        probe().status
    }

    fn request_access(&self) -> AuthorizationStatus {
        let info = probe();
        if info.status != AuthorizationStatus::Granted && info.can_request {
            log::info!("Camera access not granted: {}", info.message);
        }
        // Native desktop stacks prompt on first device open, not on query;
        // report the current determination.
        info.status
    }

    fn info(&self) -> AuthorizationInfo {
        probe()
    }
}

fn probe() -> AuthorizationInfo {
    #[cfg(target_os = "linux")]
    {
        probe_linux()
    }

    #[cfg(not(target_os = "linux"))]
    {
        probe_native()
    }
}

/// Query the native backend as a permission proxy.
#[cfg(not(target_os = "linux"))]
fn probe_native() -> AuthorizationInfo {
    use nokhwa::query;

    match query(nokhwa::utils::ApiBackend::Auto) {
        Ok(devices) if !devices.is_empty() => AuthorizationInfo {
            status: AuthorizationStatus::Granted,
            message: "Camera access granted via system privacy settings".to_string(),
            can_request: false,
        },
        Ok(_) => AuthorizationInfo {
            status: AuthorizationStatus::Undetermined,
            message: "No cameras found - access may not be granted yet".to_string(),
            can_request: true,
        },
        Err(e) => AuthorizationInfo {
            status: AuthorizationStatus::Denied,
            message: format!("Camera access denied: {}", e),
            can_request: true,
        },
    }
}

#[cfg(target_os = "linux")]
fn probe_linux() -> AuthorizationInfo {
    use std::path::Path;

    let video_devices: Vec<_> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    if video_devices.is_empty() {
        return AuthorizationInfo {
            status: AuthorizationStatus::Undetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    }

    let first_device = &video_devices[0];
    match std::fs::metadata(first_device) {
        Ok(_) => {
            if in_video_group() {
                AuthorizationInfo {
                    status: AuthorizationStatus::Granted,
                    message: format!("Camera access granted ({} readable)", first_device),
                    can_request: false,
                }
            } else {
                AuthorizationInfo {
                    status: AuthorizationStatus::Denied,
                    message: format!(
                        "{} exists but user not in video group - run: sudo usermod -a -G video $USER",
                        first_device
                    ),
                    can_request: true,
                }
            }
        }
        Err(e) => AuthorizationInfo {
            status: AuthorizationStatus::Denied,
            message: format!("Cannot access {}: {}", first_device, e),
            can_request: true,
        },
    }
}

#[cfg(target_os = "linux")]
fn in_video_group() -> bool {
    use std::process::Command;

    let output = Command::new("groups").output().ok();
    if let Some(output) = output {
        if let Ok(groups) = String::from_utf8(output.stdout) {
            return groups.contains("video") || groups.contains("plugdev");
        }
    }
    false
}
