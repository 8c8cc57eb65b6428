//! Persistent settings for the command-line front end.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::Result;

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "bvh-accel.json";

/// Settings loaded from JSON. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Input
    pub triangulate: bool,
    /// Material slot for meshes without one.
    pub default_material: i32,

    // Output
    pub output_dir: Option<PathBuf>,
    pub write_report: bool,
    pub pad_to_texture: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            triangulate: true,
            default_material: 0,
            output_dir: None,
            write_report: false,
            pad_to_texture: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults, a
    /// malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Save settings to `path` as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Where an output named `file_name` goes: `output_dir` if set, else
    /// next to `input`.
    pub fn output_path(&self, input: &Path, file_name: &str) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.join(file_name),
            None => input.with_file_name(file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let settings = Settings {
            triangulate: false,
            default_material: 3,
            output_dir: Some(PathBuf::from("out")),
            write_report: true,
            pad_to_texture: true,
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "write_report": true }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.write_report);
        assert!(settings.triangulate);
        assert_eq!(settings.output_dir, None);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("meshes/bunny.obj");
        let settings = Settings::default();
        assert_eq!(settings.output_path(input, "bunny.bvh"), Path::new("meshes/bunny.bvh"));

        let settings = Settings {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        };
        assert_eq!(settings.output_path(input, "bunny.bvh"), Path::new("/tmp/out/bunny.bvh"));
    }
}
