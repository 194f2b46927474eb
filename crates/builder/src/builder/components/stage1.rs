//! First-stage clang, built with the prebuilt toolchain for the build host.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::llvm::{self, LlvmDeps, LlvmOptions, LlvmProject};
use crate::builder::{base_ldflags, Builder};
use crate::config::{Config, Defines};
use crate::constants::{ANDROID_TARGETS, DARWIN_HOST_TARGETS, HOST_TARGETS};
use crate::session::Session;
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub struct Stage1<'a> {
    pub config: Config,
    pub options: LlvmOptions,
    pub deps: LlvmDeps<'a>,
    /// Instrumented and debug stage2 builds are compiled by stage1 for
    /// Android too.
    pub build_android_targets: bool,
    /// Keeps the static analyzer, needed by the stage1 tests.
    pub build_extra_tools: bool,
}

impl Stage1<'_> {
    pub fn new(config: Config, options: LlvmOptions) -> Self {
        Self {
            config,
            options,
            deps: LlvmDeps::default(),
            build_android_targets: false,
            build_extra_tools: false,
        }
    }

    /// stage1 cannot run check-cxx.
    pub fn test(&self, cx: &Session) -> Result<()> {
        let targets: Vec<String> = ["check-clang", "check-llvm", "check-clang-tools"]
            .iter()
            .map(|t| (*t).to_string())
            .collect();
        cx.timer.time("stage1_test", || {
            cmake::ninja(self, cx, &self.config, &targets, None)
        })
    }
}

impl Builder for Stage1<'_> {
    fn name(&self) -> &'static str {
        "stage1"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    /// libc++ is linked statically so the tools don't need an rpath to the
    /// prebuilt's lib dirs.
    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        ldflags.push("-static-libstdc++".to_string());
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_build_config(self, cx, c)
    }
}

impl CMakeBuilder for Stage1<'_> {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        llvm::llvm_src_dir(cx)
    }

    fn output_dir(&self, cx: &Session, _c: &Config) -> PathBuf {
        llvm::project_output_dir(cx, self.name())
    }

    fn install_dir(&self, cx: &Session, _c: &Config) -> Result<PathBuf> {
        Ok(llvm::project_install_dir(cx, self.name()))
    }

    fn enable_assertions(&self) -> bool {
        self.options.enable_assertions
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::project_defines(self, cx, c)?;
        define(&mut defines, "CLANG_ENABLE_ARCMT", "OFF");
        if !self.build_extra_tools {
            define(&mut defines, "CLANG_ENABLE_STATIC_ANALYZER", "OFF");
        }
        define(&mut defines, "LLVM_BUILD_TOOLS", "ON");
        // Darwin host runtimes are neither shipped nor buildable against
        // bionic's stdatomic.h.
        if c.os().is_darwin() {
            define(&mut defines, "LLVM_BUILD_EXTERNAL_COMPILER_RT", "ON");
        }
        define(&mut defines, "COMPILER_RT_BUILD_LIBFUZZER", "OFF");
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_install_config(self, cx, c)
    }
}

impl LlvmProject for Stage1<'_> {
    fn options(&self) -> &LlvmOptions {
        &self.options
    }

    fn deps(&self) -> LlvmDeps<'_> {
        self.deps
    }

    fn llvm_projects(&self) -> BTreeSet<&'static str> {
        // clang-tools-extra provides the generators the Windows build needs.
        let mut projects: BTreeSet<_> = ["clang", "lld", "clang-tools-extra"].into_iter().collect();
        if self.options.build_lldb {
            projects.insert("lldb");
        }
        projects
    }

    fn llvm_runtime_projects(&self, c: &Config) -> BTreeSet<&'static str> {
        let mut projects: BTreeSet<_> = ["compiler-rt", "libcxx", "libcxxabi"].into_iter().collect();
        if c.is_musl() {
            projects.insert("libunwind");
        }
        projects
    }

    fn llvm_targets(&self, c: &Config) -> BTreeSet<&'static str> {
        if self.build_android_targets {
            HOST_TARGETS.iter().chain(ANDROID_TARGETS).copied().collect()
        } else if c.os().is_darwin() {
            DARWIN_HOST_TARGETS.iter().copied().collect()
        } else {
            HOST_TARGETS.iter().copied().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Arch;
    use crate::session::tests::session_at;
    use std::path::Path;

    fn stage1(config: Config) -> Stage1<'static> {
        Stage1::new(
            config,
            LlvmOptions {
                build_name: "stage1".to_string(),
                svn_revision: "r498229b".to_string(),
                build_lldb: true,
                ..LlvmOptions::default()
            },
        )
    }

    #[test]
    fn test_projects_and_targets() {
        let mut b = stage1(Config::linux(false));
        let c = b.config.clone();
        assert_eq!(
            b.llvm_projects().into_iter().collect::<Vec<_>>(),
            vec!["clang", "clang-tools-extra", "lld", "lldb"]
        );
        assert!(!b.llvm_runtime_projects(&c).contains("libunwind"));
        assert!(b
            .llvm_runtime_projects(&Config::linux_musl_host(Arch::X86_64))
            .contains("libunwind"));
        assert_eq!(b.llvm_targets(&c).into_iter().collect::<Vec<_>>(), vec!["X86"]);

        b.build_android_targets = true;
        let targets = b.llvm_targets(&c);
        assert_eq!(targets.len(), ANDROID_TARGETS.len());
        assert!(targets.contains("RISCV"));
    }

    #[test]
    fn test_dirs() {
        let cx = session_at(Path::new("/android"));
        let b = stage1(Config::linux(false));
        assert_eq!(b.output_dir(&cx, &b.config), PathBuf::from("/android/out/stage1"));
        assert_eq!(
            b.install_dir(&cx, &b.config).unwrap(),
            PathBuf::from("/android/out/stage1-install")
        );
        let installed = llvm::installed_toolchain(&b, &cx);
        assert_eq!(installed.path, PathBuf::from("/android/out/stage1-install"));
        assert_eq!(installed.build_path, PathBuf::from("/android/out/stage1"));
    }

    #[test]
    fn test_ldflags_link_libcxx_statically() {
        let cx = session_at(Path::new("/android"));
        let b = stage1(Config::linux(false));
        let ldflags = b.ldflags(&cx, &b.config).unwrap();
        assert_eq!(ldflags.last().unwrap(), "-static-libstdc++");
    }
}
