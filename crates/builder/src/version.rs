//! Clang version as recorded in `Version.inc`.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangVersion {
    pub major: String,
    pub minor: String,
    pub patch: String,
}

impl ClangVersion {
    pub fn from_file(version_file: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(version_file)
            .with_context(|| format!("Failed to read {}", version_file.display()))?;
        Self::parse(&text).with_context(|| format!("Bad version file {}", version_file.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            major: find_macro(text, "CLANG_VERSION_MAJOR")?,
            minor: find_macro(text, "CLANG_VERSION_MINOR")?,
            patch: find_macro(text, "CLANG_VERSION_PATCHLEVEL")?,
        })
    }

    /// `17.0.2`
    pub fn long_version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// `17.0`
    pub fn short_version(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    pub fn major_version(&self) -> &str {
        &self.major
    }
}

fn find_macro(text: &str, key: &str) -> Result<String> {
    let re = Regex::new(&format!(r"{key}\s+(\d+)"))?;
    re.captures(text)
        .map(|caps| caps[1].to_string())
        .with_context(|| format!("{key} not found"))
}
