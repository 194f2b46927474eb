//! Windows SDK used for MSVC builds.

use crate::config::Env;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WinSdk {
    pub path: PathBuf,
    pub version: String,
}

impl WinSdk {
    /// Picks the SDK version from `Include/` and prepares the tree.
    pub fn open(path: &Path) -> Result<Self> {
        let include = path.join("Include");
        let version = fs::read_dir(&include)
            .with_context(|| format!("Failed to read {}", include.display()))?
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .min()
            .with_context(|| format!("No SDK version under {}", include.display()))?;

        let sdk = Self {
            path: path.to_path_buf(),
            version,
        };
        sdk.prepare()?;
        Ok(sdk)
    }

    /// The SDK is case-sensitive on Linux; sources include headers and
    /// libraries by their lowercase names.
    pub fn prepare(&self) -> Result<()> {
        let header_dir = self.path.join("Include").join(&self.version).join("um");
        let lib_dir = self.path.join("Lib").join(&self.version).join("um/x64");
        for dir in [header_dir, lib_dir] {
            for entry in fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))? {
                let file = entry?.path();
                let lower = file_name(&file).to_lowercase();
                create_symlink(&file, &lower)?;
            }
        }

        let shared = self.path.join("Include").join(&self.version).join("shared");
        create_symlink(&shared.join("driverspecs.h"), "DriverSpecs.h")?;
        create_symlink(&shared.join("specstrings.h"), "SpecStrings.h")?;
        create_symlink(&shared.join("WTypesbase.h"), "wtypesbase.h")?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Adds `new_name` next to `src_file`, pointing at it.
fn create_symlink(src_file: &Path, new_name: &str) -> Result<()> {
    let name = file_name(src_file);
    if name == new_name {
        return Ok(());
    }
    let Some(parent) = src_file.parent() else {
        return Ok(());
    };
    let link = parent.join(new_name);
    if link.is_symlink() {
        fs::remove_file(&link)?;
    }
    crate::fs_util::symlink(Path::new(&name), &link)
}

#[derive(Deserialize)]
struct SetEnvFile {
    env: BTreeMap<String, Vec<Vec<String>>>,
}

/// Environment from `bin/SetEnv.x64.json`: each value is a list of path
/// components under `bin/`, joined with `;`.
pub fn env_settings(sdk: &Path) -> Result<Env> {
    let base = sdk.join("bin");
    let file = base.join("SetEnv.x64.json");
    let content =
        fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let setting: SetEnvFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    Ok(setting
        .env
        .into_iter()
        .map(|(key, values)| {
            let joined = values
                .iter()
                .map(|parts| {
                    parts
                        .iter()
                        .fold(base.clone(), |path, part| path.join(part))
                        .display()
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(";");
            (key, joined)
        })
        .collect())
}
