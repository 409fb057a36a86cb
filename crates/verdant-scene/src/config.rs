//! Viewer configuration loading

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunables for the camera, picking, and animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub pulse: PulseConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            input: InputConfig::default(),
            pulse: PulseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Orbit radius around the scene origin
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Initial azimuth in radians
    #[serde(default = "default_azimuth")]
    pub azimuth: f32,
    /// Initial elevation in radians (clamped on use)
    #[serde(default = "default_elevation")]
    pub elevation: f32,
    /// Vertical field of view in degrees
    #[serde(default = "default_fov")]
    pub fov_y_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// Auto-patrol rotation speed in radians per second
    #[serde(default = "default_patrol_rate")]
    pub patrol_rate: f32,
    /// Start with auto-patrol enabled
    #[serde(default)]
    pub auto_patrol: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            azimuth: default_azimuth(),
            elevation: default_elevation(),
            fov_y_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            patrol_rate: default_patrol_rate(),
            auto_patrol: false,
        }
    }
}

fn default_radius() -> f32 {
    22.0
}

fn default_azimuth() -> f32 {
    0.5
}

fn default_elevation() -> f32 {
    0.6
}

fn default_fov() -> f32 {
    45.0
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    100.0
}

fn default_patrol_rate() -> f32 {
    0.12 // 0.002 rad per frame at 60 Hz
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Radians of orbit per pixel of drag
    #[serde(default = "default_sensitivity")]
    pub drag_sensitivity: f32,
    /// Net pointer travel in pixels beyond which a press counts as a drag
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold_px: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            drag_sensitivity: default_sensitivity(),
            drag_threshold_px: default_drag_threshold(),
        }
    }
}

fn default_sensitivity() -> f32 {
    0.005
}

fn default_drag_threshold() -> f32 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Angular frequency of the scale oscillation (rad/s)
    #[serde(default = "default_pulse_frequency")]
    pub frequency: f32,
    /// Relative scale amplitude
    #[serde(default = "default_pulse_amplitude")]
    pub amplitude: f32,
    /// Spin speed around Y (rad/s)
    #[serde(default = "default_pulse_spin")]
    pub spin: f32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            frequency: default_pulse_frequency(),
            amplitude: default_pulse_amplitude(),
            spin: default_pulse_spin(),
        }
    }
}

fn default_pulse_frequency() -> f32 {
    5.0
}

fn default_pulse_amplitude() -> f32 {
    0.2
}

fn default_pulse_spin() -> f32 {
    1.2
}

impl ViewerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            info!(path = %path.display(), "Loaded viewer configuration");
            Ok(config)
        } else {
            info!(
                path = %path.display(),
                "Viewer configuration not found, using defaults"
            );
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            [camera]
            radius = 30.0
            auto_patrol = true

            [input]
            drag_threshold_px = 8.0
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.radius, 30.0);
        assert!(config.camera.auto_patrol);
        assert_eq!(config.camera.fov_y_degrees, 45.0);
        assert_eq!(config.input.drag_threshold_px, 8.0);
        assert_eq!(config.input.drag_sensitivity, 0.005);
        assert_eq!(config.pulse, PulseConfig::default());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ViewerConfig::load(&temp_dir.path().join("verdant.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("verdant.toml");
        std::fs::write(&path, "[pulse]\nspin = 2.0\n").unwrap();
        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.pulse.spin, 2.0);
    }
}
