//! Viewer settings
//!
//! Defaults reproduce the stock viewer; a TOML document can override any
//! subset of fields.

use std::f32::consts::PI;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{Camera, DEFAULT_LINEAR_SPEED};
use crate::transform::ModelTransform;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: [f32; 3],
    /// Distance per millisecond while a movement key is held
    pub linear_speed: f32,
    pub model_scale: [f32; 3],
    /// Model spin in radians per millisecond
    pub spin_rate: f32,
    /// Horizontal bands rasterized in parallel; 1 keeps the single-threaded path
    pub bands: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            fov: 0.25 * PI,
            near: 0.01,
            far: 10.0,
            camera_position: [0.0, 0.0, 10.0],
            linear_speed: DEFAULT_LINEAR_SPEED,
            // Mesh files are y-up with the opposite winding, hence the flip
            model_scale: [0.1, -0.1, 0.1],
            spin_rate: 0.001,
            bands: 1,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::Invalid(format!(
                "clipping planes must satisfy 0 < near < far (near = {}, far = {})",
                self.near, self.far
            )));
        }
        if !(self.fov > 0.0 && self.fov < PI) {
            return Err(ConfigError::Invalid(format!("fov {} is outside (0, pi)", self.fov)));
        }
        if self.bands == 0 {
            return Err(ConfigError::Invalid("bands must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Camera set up for a `width` x `height` output
    pub fn camera(&self, width: u32, height: u32) -> Camera {
        let mut camera = Camera::new();
        camera.set_viewport(0, 0, width, height);
        camera.set_fov(self.fov);
        camera.set_clipping_planes(self.near, self.far);
        camera.set_linear_speed(self.linear_speed);
        camera.set_position(Point3::from(self.camera_position));
        camera
    }

    pub fn model_transform(&self) -> ModelTransform {
        ModelTransform::new(Vector3::from(self.model_scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bands, 1);
    }

    #[test]
    fn test_partial_override() {
        let config = ViewerConfig::from_toml_str("far = 50.0\nbands = 4\n").unwrap();
        assert_eq!(config.far, 50.0);
        assert_eq!(config.bands, 4);
        assert_eq!(config.near, ViewerConfig::default().near);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = ViewerConfig::default();
        config.spin_rate = 0.0;
        let text = config.to_toml_string().unwrap();
        assert_eq!(ViewerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("softrast-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("viewer.toml");
        std::fs::write(&path, "camera_position = [1.0, 2.0, 3.0]\nspin_rate = 0.0\n").unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.camera_position, [1.0, 2.0, 3.0]);
        assert_eq!(config.spin_rate, 0.0);
        assert_eq!(config.fov, ViewerConfig::default().fov);

        assert!(matches!(
            ViewerConfig::load(&dir.join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ViewerConfig::from_toml_str("near = 5.0\nfar = 1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(ViewerConfig::from_toml_str("bands = 0\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(ViewerConfig::from_toml_str("fov = \"wide\"\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_camera_from_config() {
        let config = ViewerConfig::default();
        let camera = config.camera(320, 200);
        assert_eq!(camera.viewport().width, 320);
        assert_eq!(camera.clipping_planes(), (0.01, 10.0));
        assert_eq!(camera.position(), Point3::new(0.0, 0.0, 10.0));
    }
}
