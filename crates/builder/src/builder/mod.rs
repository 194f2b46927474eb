//! Builder framework.
//!
//! Structure:
//! - `registry` - name filters deciding which builders run
//! - `lib_info` - libraries produced by one builder and linked by another
//! - `autoconf` - `configure && make` builds
//! - `cmake` - CMake + Ninja builds
//! - `llvm` - LLVM-specific CMake layers (base, runtimes, whole project)
//! - `components/` - every concrete builder
//!
//! A builder is a [`Builder`] implementation holding its options. Layers are
//! traits with default methods; a concrete builder that extends a layer's
//! behaviour calls the layer's free function and adds to the result.

pub mod autoconf;
pub mod cmake;
pub mod components;
pub mod lib_info;
pub mod llvm;
pub mod registry;

use crate::config::{Config, Env};
use crate::hosts::Arch;
use crate::session::Session;
use crate::toolchain::Toolchain;
use anyhow::Result;
use log::info;
use std::path::PathBuf;

pub trait Builder {
    fn name(&self) -> &'static str;

    /// Configs built, in order.
    fn config_list(&self) -> Vec<Config>;

    /// Toolchain compiling this builder's configs.
    fn toolchain<'a>(&'a self, cx: &'a Session) -> &'a Toolchain {
        cx.toolchain()
    }

    /// Extra cflags on top of the config's.
    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn cxxflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        self.cflags(cx, c)
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        Ok(base_ldflags(self.toolchain(cx), c))
    }

    fn env(&self, cx: &Session, c: &Config) -> Result<Env> {
        base_env(cx, c)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()>;

    /// Runs once after every config has been built.
    fn install(&self, _cx: &Session) -> Result<()> {
        Ok(())
    }
}

/// Builds every config of `builder` and installs it, unless the registry
/// filters it out.
///
/// Returns whether the builder ran.
pub fn build(builder: &dyn Builder, cx: &Session) -> Result<bool> {
    let name = builder.name();
    cx.registry.register(name);
    if !cx.registry.should_build(name) {
        info!("Skipping {name}.");
        return Ok(false);
    }
    info!("Building {name}.");

    for config in builder.config_list() {
        info!("Building {name} for {config}");
        cx.timer
            .time(&format!("{name}_{config}"), || builder.build_config(cx, &config))?;
    }
    builder.install(cx)?;
    Ok(true)
}

/// `-L` for the toolchain's own libraries when the output runs on this machine.
pub fn base_ldflags(toolchain: &Toolchain, c: &Config) -> Vec<String> {
    if c.is_cross_compiling() || c.is_musl() {
        return Vec::new();
    }
    // swig and libncurses link lib/libc++.so
    toolchain
        .lib_dirs()
        .iter()
        .map(|dir| format!("-L{}", dir.display()))
        .collect()
}

/// The start-up environment overlaid with the config's, with the config's
/// `PATH` and prebuilt python ahead of the original `PATH`.
pub fn base_env(cx: &Session, c: &Config) -> Result<Env> {
    let config_env = c.env(&cx.paths)?;
    let mut env = cx.orig_env.clone();
    env.extend(config_env.clone());

    let python_bin = cx.paths.python_dir(cx.paths.build_host)?.join("bin");
    let python_bin = python_bin.display().to_string();
    let path: Vec<&str> = [
        config_env.get("PATH").map(String::as_str),
        Some(python_bin.as_str()),
        cx.orig_env.get("PATH").map(String::as_str),
    ]
    .into_iter()
    .flatten()
    .filter(|p| !p.is_empty())
    .collect();
    env.insert("PATH".to_string(), path.join(":"));
    Ok(env)
}

/// aarch64 and x86_64 only. riscv64 runtimes follow the 32-bit paths.
pub fn is_64bit(c: &Config) -> bool {
    matches!(c.arch(), Arch::Aarch64 | Arch::X86_64)
}

/// Where the default toolchain looks for runtimes of `c`.
pub fn resource_dir(cx: &Session, c: &Config) -> Result<PathBuf> {
    Ok(cx
        .toolchain()
        .clang_lib_dir()?
        .join("lib")
        .join(c.os().crt_dir()?))
}

/// Where runtimes of `c` are installed in the output toolchain.
pub fn output_resource_dir(cx: &Session, c: &Config) -> Result<PathBuf> {
    Ok(cx
        .output_toolchain()?
        .clang_lib_dir()?
        .join("lib")
        .join(c.os().crt_dir()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{android_configs, AndroidOptions};
    use crate::session::tests::session_at;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::path::Path;

    struct Recording {
        seen: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Builder for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn config_list(&self) -> Vec<Config> {
            android_configs(AndroidOptions::ndk())
        }

        fn build_config(&self, _cx: &Session, c: &Config) -> Result<()> {
            if self.fail {
                bail!("broken config");
            }
            self.seen.borrow_mut().push(c.arch().to_string());
            Ok(())
        }

        fn install(&self, _cx: &Session) -> Result<()> {
            self.seen.borrow_mut().push("install".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_build_runs_every_config_then_install() {
        let cx = session_at(Path::new("/android"));
        let builder = Recording {
            seen: RefCell::new(Vec::new()),
            fail: false,
        };
        assert!(build(&builder, &cx).unwrap());
        assert_eq!(
            *builder.seen.borrow(),
            vec!["arm", "aarch64", "i386", "x86_64", "install"]
        );
        assert!(cx
            .timer
            .report()
            .contains("recording_android-arm (platform=false, static=false, default)"));
    }

    #[test]
    fn test_build_skipped_by_registry() {
        let mut cx = session_at(Path::new("/android"));
        cx.registry.add_skips(["recording"]);
        let builder = Recording {
            seen: RefCell::new(Vec::new()),
            fail: false,
        };
        assert!(!build(&builder, &cx).unwrap());
        assert!(builder.seen.borrow().is_empty());
        assert_eq!(cx.registry.registered(), vec!["recording"]);
    }

    #[test]
    fn test_build_failure_is_timed() {
        let cx = session_at(Path::new("/android"));
        let builder = Recording {
            seen: RefCell::new(Vec::new()),
            fail: true,
        };
        assert!(build(&builder, &cx).is_err());
        assert!(cx.timer.report().contains("recording_android-arm"));
    }

    #[test]
    fn test_base_env_path_order() {
        let cx = session_at(Path::new("/android"));
        let env = base_env(&cx, &Config::linux(false)).unwrap();
        assert_eq!(
            env["PATH"],
            "/android/prebuilts/python/linux-x86/bin:/usr/bin:/bin"
        );
    }

    #[test]
    fn test_base_ldflags() {
        let cx = session_at(Path::new("/android"));
        let ldflags = base_ldflags(cx.toolchain(), &Config::linux(false));
        assert_eq!(ldflags.len(), 3);
        assert!(ldflags[0].starts_with("-L/android/prebuilts/clang/host/linux-x86/"));
        assert!(base_ldflags(cx.toolchain(), &Config::mingw(false)).is_empty());
        assert!(base_ldflags(cx.toolchain(), &Config::linux_musl_host(Arch::X86_64)).is_empty());
    }
}
