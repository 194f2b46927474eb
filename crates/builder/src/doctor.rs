//! Preflight checks for a build machine.

use crate::paths::Paths;
use anyhow::{bail, Result};
use std::path::PathBuf;

const REQUIRED_TOOLS: &[&str] = &["tar", "git", "patch"];

/// Prebuilts the build cannot start without.
fn required_prebuilts(paths: &Paths) -> Result<Vec<PathBuf>> {
    Ok(vec![
        paths.cmake_bin_path(),
        paths.ninja_bin_path(),
        paths.make_bin_path(),
        paths.clang_prebuilt_dir(),
        paths.python_executable(paths.build_host)?,
    ])
}

pub fn run(paths: &Paths) -> Result<()> {
    let mut ok = true;

    for tool in REQUIRED_TOOLS {
        if which::which(tool).is_err() {
            eprintln!("[FAIL] missing `{tool}` in PATH");
            ok = false;
        } else {
            eprintln!("[OK] {tool}");
        }
    }

    for prebuilt in required_prebuilts(paths)? {
        if prebuilt.exists() {
            eprintln!("[OK] {}", prebuilt.display());
        } else {
            eprintln!("[FAIL] missing prebuilt: {}", prebuilt.display());
            ok = false;
        }
    }

    if !ok {
        bail!("doctor checks failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Host;

    #[test]
    fn test_empty_checkout_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(
            dir.path().to_path_buf(),
            dir.path().join("out"),
            dir.path().join("out"),
            Host::Linux,
        )
        .unwrap();
        assert!(run(&paths).is_err());
    }

    #[test]
    fn test_prebuilts_live_in_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(
            dir.path().to_path_buf(),
            dir.path().join("out"),
            dir.path().join("out"),
            Host::Linux,
        )
        .unwrap();
        for prebuilt in required_prebuilts(&paths).unwrap() {
            assert!(prebuilt.starts_with(dir.path().join("prebuilts")));
        }
    }
}
