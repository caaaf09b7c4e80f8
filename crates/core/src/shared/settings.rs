use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::infrastructure::onnx_blazeface_detector::DEFAULT_CONFIDENCE;
use crate::overlay::domain::coordinate_mapper::OverlayGeometry;
use crate::overlay::domain::overlay_renderer::CompositeMode;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_DISPLAY_SIZE, DEFAULT_MAX_IN_FLIGHT, DEFAULT_PRESENTATION_FPS,
    SETTINGS_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Session configuration persisted as JSON.
///
/// Every field has a default, so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub composite_mode: CompositeMode,
    pub geometry: OverlayGeometry,
    pub confidence: f64,
    pub max_in_flight: usize,
    pub presentation_fps: f64,
    pub display_width: u32,
    pub display_height: u32,
    pub overlay_image: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub camera_device: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            composite_mode: CompositeMode::default(),
            geometry: OverlayGeometry::default(),
            confidence: DEFAULT_CONFIDENCE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            presentation_fps: DEFAULT_PRESENTATION_FPS,
            display_width: DEFAULT_DISPLAY_SIZE.0,
            display_height: DEFAULT_DISPLAY_SIZE.1,
            overlay_image: None,
            model_path: None,
            model_url: None,
            camera_device: None,
        }
    }
}

impl Settings {
    /// `$CONFIG_DIR/ShadeCam/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads from [`Settings::default_path`], falling back to defaults.
    pub fn load_default() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn display_size(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "composite_mode": "frame-plus-overlay", "display_width": 1280 }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.composite_mode, CompositeMode::FramePlusOverlay);
        assert_eq!(settings.display_width, 1280);
        assert_eq!(settings.display_height, DEFAULT_DISPLAY_SIZE.1);
        assert_relative_eq!(settings.geometry.width_multiplier, 1.1);
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            camera_device: Some("/dev/video2".into()),
            max_in_flight: 4,
            ..Settings::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_unknown_composite_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "composite_mode": "sideways" }"#).unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_default_path_mentions_app_dir() {
        if let Some(path) = Settings::default_path() {
            assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        }
    }
}
