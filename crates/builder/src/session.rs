//! Per-invocation build state shared by every builder.

use crate::android_version::AndroidVersion;
use crate::builder::registry::BuilderRegistry;
use crate::config::Env;
use crate::paths::Paths;
use crate::timer::Timer;
use crate::toolchain::Toolchain;
use crate::win_sdk::WinSdk;
use anyhow::{Context, Result};
use log::info;

/// Everything a builder needs besides its own options.
///
/// The default toolchain starts out as the prebuilt and is replaced once a
/// stage has been installed. The output toolchain is where runtimes are
/// installed and is only known after stage2.
pub struct Session {
    pub paths: Paths,
    pub android_version: AndroidVersion,
    pub registry: BuilderRegistry,
    pub timer: Timer,
    /// Environment of the process at start-up.
    pub orig_env: Env,
    pub win_sdk: Option<WinSdk>,
    prebuilt: Toolchain,
    toolchain: Option<Toolchain>,
    output_toolchain: Option<Toolchain>,
}

impl Session {
    pub fn new(paths: Paths, android_version: AndroidVersion) -> Self {
        let orig_env = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        Self::with_env(paths, android_version, orig_env)
    }

    pub fn with_env(paths: Paths, android_version: AndroidVersion, orig_env: Env) -> Self {
        let prebuilt = Toolchain::prebuilt(&paths);
        Self {
            paths,
            android_version,
            registry: BuilderRegistry::new(),
            timer: Timer::new(),
            orig_env,
            win_sdk: None,
            prebuilt,
            toolchain: None,
            output_toolchain: None,
        }
    }

    pub fn prebuilt_toolchain(&self) -> &Toolchain {
        &self.prebuilt
    }

    /// Toolchain used to compile.
    pub fn toolchain(&self) -> &Toolchain {
        self.toolchain.as_ref().unwrap_or(&self.prebuilt)
    }

    pub fn set_default_toolchain(&mut self, toolchain: Toolchain) {
        info!("Default toolchain is now {}", toolchain.path.display());
        self.toolchain = Some(toolchain);
    }

    /// Toolchain that receives runtimes and other installed artifacts.
    pub fn output_toolchain(&self) -> Result<&Toolchain> {
        self.output_toolchain
            .as_ref()
            .context("No output toolchain; stage2 has not been set up")
    }

    pub fn set_output_toolchain(&mut self, toolchain: Toolchain) {
        self.output_toolchain = Some(toolchain);
    }

    pub fn win_sdk_enabled(&self) -> bool {
        self.win_sdk.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hosts::Host;
    use std::path::{Path, PathBuf};

    /// A session rooted at `root` with a fixed environment.
    pub(crate) fn session_at(root: &Path) -> Session {
        let paths = Paths::new(
            root.to_path_buf(),
            root.join("out"),
            root.join("out/dist"),
            Host::Linux,
        )
        .unwrap();
        let env: Env = [("PATH".to_string(), "/usr/bin:/bin".to_string())].into();
        Session::with_env(paths, AndroidVersion::default(), env)
    }

    #[test]
    fn test_default_toolchain() {
        let mut cx = session_at(Path::new("/android"));
        assert_eq!(cx.toolchain().path, cx.paths.clang_prebuilt_dir());
        assert!(cx.output_toolchain().is_err());

        cx.set_default_toolchain(Toolchain::new("/android/out/stage1-install", "/android/out/stage1"));
        assert_eq!(cx.toolchain().path, PathBuf::from("/android/out/stage1-install"));
        assert_eq!(cx.prebuilt_toolchain().path, cx.paths.clang_prebuilt_dir());

        cx.set_output_toolchain(Toolchain::new("/android/out/stage2-install", "/android/out/stage2"));
        assert_eq!(
            cx.output_toolchain().unwrap().build_path,
            PathBuf::from("/android/out/stage2")
        );
    }
}
