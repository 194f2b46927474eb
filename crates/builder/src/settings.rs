//! Settings file support for the toolchain builder.
//!
//! Reads `toolchain-builder.toml` from the working directory to locate the
//! Android checkout and the output directories.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "toolchain-builder.toml";

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Root of the Android checkout (contains `toolchain/`, `prebuilts/`).
    #[serde(default = "default_android_dir")]
    pub android_dir: PathBuf,

    /// Overridden by `OUT_DIR`.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Overridden by `DIST_DIR`.
    #[serde(default)]
    pub dist_dir: Option<PathBuf>,

    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_build_name")]
    pub build_name: String,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            build_name: default_build_name(),
            verbose: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            android_dir: default_android_dir(),
            out_dir: None,
            dist_dir: None,
            build: BuildSettings::default(),
        }
    }
}

fn default_android_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_build_name() -> String {
    "dev".to_string()
}

impl Settings {
    /// Load settings from toolchain-builder.toml (or use defaults if it doesn't exist)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// `OUT_DIR` from the environment wins over the settings file.
    pub fn out_dir(&self) -> PathBuf {
        std::env::var_os("OUT_DIR")
            .map(PathBuf::from)
            .or_else(|| self.out_dir.clone())
            .unwrap_or_else(|| self.android_dir.join("out"))
    }

    /// `DIST_DIR` from the environment wins; falls back to the out dir.
    pub fn dist_dir(&self) -> PathBuf {
        std::env::var_os("DIST_DIR")
            .map(PathBuf::from)
            .or_else(|| self.dist_dir.clone())
            .unwrap_or_else(|| self.out_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings.android_dir, PathBuf::from("."));
        assert_eq!(settings.build.build_name, "dev");
        assert!(!settings.build.verbose);
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(SETTINGS_FILE);
        fs::write(
            &file,
            "android_dir = \"/src/android\"\nout_dir = \"/tmp/out\"\n\n[build]\nbuild_name = \"12345\"\nverbose = true\n",
        )
        .unwrap();

        let settings = Settings::load_from(&file).unwrap();
        assert_eq!(settings.android_dir, PathBuf::from("/src/android"));
        assert_eq!(settings.out_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(settings.build.build_name, "12345");
        assert!(settings.build.verbose);
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(SETTINGS_FILE);
        fs::write(&file, "android_dir = [").unwrap();
        assert!(Settings::load_from(&file).is_err());
    }
}
