//! Configuration management for scancam.
//!
//! Provides loading, saving, and validation of scanning tuning and camera
//! selection settings.

use crate::types::CameraPosition;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default per-corner displacement threshold in normalized coordinates.
pub const DEFAULT_STABILITY_THRESHOLD: f32 = 0.02;

/// Default number of consecutive stable frames required before auto-capture.
/// Approximates half a second at a 30 Hz analysis rate.
pub const DEFAULT_REQUIRED_STABLE_FRAMES: u32 = 15;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScancamConfig {
    pub scanning: ScanningConfig,
    pub camera: CameraConfig,
}

/// Stability tuning for the document scan pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanningConfig {
    /// Per-corner displacement threshold in normalized coordinates (0.0-1.0)
    pub stability_threshold: f32,
    /// Consecutive stable frames required before auto-capture fires
    pub required_stable_frames: u32,
}

/// Camera selection and session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Facing selected when a session first starts
    pub default_position: CameraPosition,
    /// Explicit device id for the front-facing camera
    pub front_device_id: Option<String>,
    /// Explicit device id for the back-facing camera
    pub back_device_id: Option<String>,
    /// Start with flash enabled
    pub flash_default: bool,
}

impl Default for ScancamConfig {
    fn default() -> Self {
        Self {
            scanning: ScanningConfig {
                stability_threshold: DEFAULT_STABILITY_THRESHOLD,
                required_stable_frames: DEFAULT_REQUIRED_STABLE_FRAMES,
            },
            camera: CameraConfig {
                default_position: CameraPosition::Back,
                front_device_id: None,
                back_device_id: None,
                flash_default: false,
            },
        }
    }
}

impl ScancamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: ScancamConfig =
            toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))?;

        config.validate()?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, toml_string).map_err(|e| format!("Failed to write config file: {}", e))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("scancam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.scanning.stability_threshold > 0.0 && self.scanning.stability_threshold < 1.0) {
            return Err("Stability threshold must be between 0.0 and 1.0 exclusive".to_string());
        }
        if self.scanning.required_stable_frames == 0 || self.scanning.required_stable_frames > 600 {
            return Err("Required stable frames must be between 1 and 600".to_string());
        }
        if let Some(id) = &self.camera.front_device_id {
            if id.is_empty() {
                return Err("Front device id must not be empty when set".to_string());
            }
        }
        if let Some(id) = &self.camera.back_device_id {
            if id.is_empty() {
                return Err("Back device id must not be empty when set".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScancamConfig::default();
        assert_eq!(config.scanning.stability_threshold, 0.02);
        assert_eq!(config.scanning.required_stable_frames, 15);
        assert_eq!(config.camera.default_position, CameraPosition::Back);
        assert!(!config.camera.flash_default);
    }

    #[test]
    fn test_config_validation() {
        let config = ScancamConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_threshold = config.clone();
        bad_threshold.scanning.stability_threshold = 0.0;
        assert!(bad_threshold.validate().is_err());

        let mut bad_frames = ScancamConfig::default();
        bad_frames.scanning.required_stable_frames = 0;
        assert!(bad_frames.validate().is_err());

        let mut bad_device = ScancamConfig::default();
        bad_device.camera.back_device_id = Some(String::new());
        assert!(bad_device.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("scancam.toml");

        let mut config = ScancamConfig::default();
        config.scanning.required_stable_frames = 30;
        config.camera.front_device_id = Some("1".to_string());
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = ScancamConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.scanning.required_stable_frames, 30);
        assert_eq!(loaded.camera.front_device_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_config_toml_format() {
        let config = ScancamConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[scanning]"));
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("stability_threshold"));
        assert!(toml_string.contains("required_stable_frames"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScancamConfig::load_from_file("nonexistent_scancam.toml");
        assert!(result.is_ok()); // Should return defaults
        assert_eq!(result.unwrap().scanning.required_stable_frames, 15);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("scancam.toml");
        fs::write(
            &config_path,
            "[scanning]\nstability_threshold = 2.0\nrequired_stable_frames = 15\n\n[camera]\ndefault_position = \"back\"\nflash_default = false\n",
        )
        .unwrap();

        assert!(ScancamConfig::load_from_file(&config_path).is_err());
    }
}
