use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use glam::Vec3;
use log::{info, warn};
use tinyjson::JsonValue;

use crate::error::{Result, ViewerError};

/// Viewer settings read from `config.json`, so the light, camera distance
/// and rotation center can change without recompiling.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Rotation center the camera orbits around.
    pub rc: Vec3,
    pub camera_distance: f32,
    /// Enables the fourth (displacement) texture slot.
    pub displacement: bool,
    pub light_pos: Vec3,
    pub clearcolor: Vec3,
    /// Degrees of rotation per pixel of pointer movement.
    pub camera_sensitivity: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rc: Vec3::ZERO,
            camera_distance: 1.0,
            displacement: false,
            light_pos: Vec3::ONE,
            clearcolor: Vec3::splat(0.1),
            camera_sensitivity: 0.1,
            fov: 45.0,
        }
    }
}

impl Config {
    /// Loads the config at `path`, or the defaults if there is no such file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = Config::parse(&text)?;
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("{} not found, using default settings", path.display());
                Ok(Config::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Config> {
        let json: JsonValue = text
            .parse()
            .map_err(|err| ViewerError::Config(format!("{err}")))?;
        let object: &HashMap<String, JsonValue> = json
            .get()
            .ok_or_else(|| ViewerError::Config("top level is not an object".to_string()))?;

        let mut config = Config::default();
        if let Some(value) = object.get("rc") {
            config.rc = take_vec3("rc", value)?;
        }
        if let Some(value) = object.get("camera_distance") {
            config.camera_distance = take_f32("camera_distance", value)?.max(0.0);
        }
        if let Some(value) = object.get("displacement") {
            config.displacement = match value {
                JsonValue::Boolean(enabled) => *enabled,
                JsonValue::Number(n) if *n == 0.0 || *n == 1.0 => *n == 1.0,
                _ => return Err(invalid("displacement", "0, 1 or a boolean")),
            };
        }
        if let Some(value) = object.get("light_pos") {
            config.light_pos = take_vec3("light_pos", value)?;
        }
        if let Some(value) = object.get("clearcolor") {
            config.clearcolor = take_vec3("clearcolor", value)?;
        }
        if let Some(value) = object.get("camera_sensitivity") {
            config.camera_sensitivity = take_f32("camera_sensitivity", value)?;
        }
        if let Some(value) = object.get("fov") {
            config.fov = take_f32("fov", value)?;
        }
        Ok(config)
    }
}

fn invalid(key: &str, expected: &str) -> ViewerError {
    ViewerError::Config(format!("\"{key}\" must be {expected}"))
}

fn take_f32(key: &str, value: &JsonValue) -> Result<f32> {
    value
        .get::<f64>()
        .map(|&n| n as f32)
        .ok_or_else(|| invalid(key, "a number"))
}

fn take_vec3(key: &str, value: &JsonValue) -> Result<Vec3> {
    let values = value
        .get::<Vec<JsonValue>>()
        .ok_or_else(|| invalid(key, "an array of 3 numbers"))?;
    if values.len() != 3 {
        return Err(invalid(key, "an array of 3 numbers"));
    }
    let mut vec = [0.0; 3];
    for (slot, value) in vec.iter_mut().zip(values) {
        *slot = take_f32(key, value)?;
    }
    Ok(Vec3::from_array(vec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_recognized_keys() {
        let config = Config::parse(
            r#"{
                "rc": [0, 0.5, 0],
                "camera_distance": 3,
                "displacement": 1,
                "light_pos": [2, 4, 2],
                "clearcolor": [0.2, 0.3, 0.4],
                "camera_sensitivity": 0.25,
                "fov": 60,
                "unknown": "ignored"
            }"#,
        )
        .unwrap();
        assert_eq!(config.rc, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(config.camera_distance, 3.0);
        assert!(config.displacement);
        assert_eq!(config.light_pos, Vec3::new(2.0, 4.0, 2.0));
        assert_eq!(config.clearcolor, Vec3::new(0.2, 0.3, 0.4));
        assert_eq!(config.camera_sensitivity, 0.25);
        assert_eq!(config.fov, 60.0);
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let config = Config::parse(r#"{ "displacement": false }"#).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn wrong_types_are_errors() {
        assert!(matches!(
            Config::parse(r#"{ "rc": [1, 2] }"#),
            Err(ViewerError::Config(_))
        ));
        assert!(Config::parse(r#"{ "displacement": 2 }"#).is_err());
        assert!(Config::parse(r#"{ "camera_distance": "far" }"#).is_err());
        assert!(Config::parse("[1, 2, 3]").is_err());
        assert!(Config::parse("{").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load("definitely/not/here/config.json").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn bundled_config_parses() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.json")).unwrap();
        assert_eq!(config.camera_distance, 3.0);
        assert!(!config.displacement);
    }
}
