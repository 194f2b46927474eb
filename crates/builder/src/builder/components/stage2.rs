//! The shipped host toolchain, built by stage1.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::llvm::{self, LlvmDeps, LlvmOptions, LlvmProject};
use crate::builder::{base_env, base_ldflags, Builder};
use crate::config::{path_str, Config, Defines, Env};
use crate::constants::ANDROID_TARGETS;
use crate::fs_util::set_executable;
use crate::session::Session;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

pub struct Stage2<'a> {
    pub config: Config,
    pub options: LlvmOptions,
    pub deps: LlvmDeps<'a>,
    pub debug_build: bool,
    /// Builds a PGO-instrumented clang.
    pub build_instrumented: bool,
    /// Keeps relocations for llvm-bolt.
    pub bolt_optimize: bool,
    pub bolt_instrument: bool,
    pub profdata_file: Option<PathBuf>,
    pub lto: bool,
}

impl Stage2<'_> {
    pub fn new(config: Config, options: LlvmOptions) -> Self {
        Self {
            config,
            options,
            deps: LlvmDeps::default(),
            debug_build: false,
            build_instrumented: false,
            bolt_optimize: false,
            bolt_instrument: false,
            profdata_file: None,
            lto: false,
        }
    }

    fn thin_lto(&self, c: &Config) -> bool {
        self.lto && !c.os().is_darwin() && !self.build_instrumented && !self.debug_build
    }

    pub fn test(&self, cx: &Session) -> Result<()> {
        let checks = ["check-clang", "check-llvm", "check-clang-tools"];
        let c = &self.config;
        if !c.is_musl() {
            return llvm::run_tests(self, cx, c, "stage2_test", &checks, None);
        }
        // musl cannot run check-cxx yet.
        cx.timer.time("stage2_test", || {
            cmake::ninja(
                self,
                cx,
                c,
                &["check-clang".to_string(), "check-llvm".to_string()],
                None,
            )?;
            // Flaky on musl buildbots.
            let filter: Env = [(
                "GTEST_FILTER".to_string(),
                "-TUSchedulerTests.PreambleThrottle".to_string(),
            )]
            .into();
            cmake::ninja(self, cx, c, &["check-clang-tools".to_string()], Some(&filter))
        })
    }
}

/// Runs lldb against the bundled python.
fn lldb_wrapper(lib_path_env: &str) -> String {
    format!(
        "#!/bin/bash\n\
         CURDIR=$(cd $(dirname $0) && pwd)\n\
         export PYTHONHOME=\"$CURDIR/../python3\"\n\
         export {lib_path_env}=\"$CURDIR/../python3/lib:${lib_path_env}\"\n\
         \"$CURDIR/lldb\" \"$@\"\n"
    )
}

impl Builder for Stage2<'_> {
    fn name(&self) -> &'static str {
        "stage2"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        let mut cflags = Vec::new();
        if self.profdata_file.is_some() {
            cflags.push("-Wno-profile-instr-out-of-date".to_string());
            cflags.push("-Wno-profile-instr-unprofiled".to_string());
        }
        if !self.lto && self.options.enable_mlgo {
            cflags.push("-mllvm -regalloc-enable-advisor=release".to_string());
        }
        Ok(cflags)
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        // llvm's CMake rules add $ORIGIN/../lib.
        if c.os().is_linux() {
            let libc = if c.is_musl() { "musl" } else { "gnu" };
            ldflags.push(format!(
                "-Wl,-rpath,\\$ORIGIN/../lib/x86_64-unknown-linux-{libc}"
            ));
        }
        if self.bolt_optimize || self.bolt_instrument {
            ldflags.push("-Wl,-q".to_string());
        }
        // TODO: ICF on Darwin once it links with lld.
        if !c.os().is_darwin() {
            ldflags.push("-Wl,--icf=safe".to_string());
        }
        if self.lto && self.options.enable_mlgo {
            ldflags.push("-Wl,-mllvm,-regalloc-enable-advisor=release".to_string());
        }
        Ok(ldflags)
    }

    /// Points the just-built tools at stage1's libc++ and, for unittests,
    /// at the installed one.
    fn env(&self, cx: &Session, c: &Config) -> Result<Env> {
        let mut env = base_env(cx, c)?;
        let mut lib_dirs: Vec<String> = self
            .toolchain(cx)
            .lib_dirs()
            .iter()
            .map(|dir| path_str(dir))
            .collect();
        lib_dirs.push(path_str(&self.install_dir(cx, c)?.join("lib")));
        env.insert("LD_LIBRARY_PATH".to_string(), lib_dirs.join(":"));
        Ok(env)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_build_config(self, cx, c)
    }
}

impl CMakeBuilder for Stage2<'_> {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        llvm::llvm_src_dir(cx)
    }

    fn output_dir(&self, cx: &Session, _c: &Config) -> PathBuf {
        llvm::project_output_dir(cx, self.name())
    }

    fn install_dir(&self, cx: &Session, _c: &Config) -> Result<PathBuf> {
        Ok(llvm::project_install_dir(cx, self.name()))
    }

    fn remove_install_dir(&self) -> bool {
        true
    }

    fn enable_assertions(&self) -> bool {
        self.options.enable_assertions
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::project_defines(self, cx, c)?;
        define(&mut defines, "CLANG_PYTHON_BINDINGS_VERSIONS", "3");

        if self.thin_lto(c) {
            define(&mut defines, "LLVM_ENABLE_LTO", "Thin");
            define(
                &mut defines,
                "LLVM_PARALLEL_LINK_JOBS",
                (num_cpus::get() / 2).min(16).to_string(),
            );
        }

        // Exported for host fuzzer builds; unsupported on Darwin.
        define(
            &mut defines,
            "COMPILER_RT_BUILD_LIBFUZZER",
            if c.os().is_darwin() { "OFF" } else { "ON" },
        );

        if self.debug_build {
            define(&mut defines, "CMAKE_BUILD_TYPE", "Debug");
        }

        if self.build_instrumented {
            define(&mut defines, "LLVM_BUILD_INSTRUMENTED", "ON");
            // Only needed to finish configuring perf-training.
            define(
                &mut defines,
                "LLVM_PROFDATA",
                path_str(&self.toolchain(cx).path.join("bin/llvm-profdata")),
            );
        } else if let Some(profdata) = &self.profdata_file {
            define(&mut defines, "LLVM_PROFDATA_FILE", path_str(profdata));
        }

        if c.os().is_darwin() {
            define(&mut defines, "LLVM_BUILD_EXTERNAL_COMPILER_RT", "ON");
        }
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_install_config(self, cx, c)?;
        let wrapper = self.install_dir(cx, c)?.join("bin/lldb.sh");
        let lib_path_env = if c.os().is_linux() {
            "LD_LIBRARY_PATH"
        } else {
            "DYLD_LIBRARY_PATH"
        };
        fs::write(&wrapper, lldb_wrapper(lib_path_env))
            .with_context(|| format!("Failed to write {}", wrapper.display()))?;
        set_executable(&wrapper)
    }
}

impl LlvmProject for Stage2<'_> {
    fn options(&self) -> &LlvmOptions {
        &self.options
    }

    fn deps(&self) -> LlvmDeps<'_> {
        self.deps
    }

    fn llvm_projects(&self) -> BTreeSet<&'static str> {
        let mut projects: BTreeSet<_> = ["clang", "lld", "clang-tools-extra", "polly", "bolt"]
            .into_iter()
            .collect();
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

    fn llvm_targets(&self, _c: &Config) -> BTreeSet<&'static str> {
        ANDROID_TARGETS.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Arch;
    use crate::session::tests::session_at;
    use std::path::Path;

    fn stage2(config: Config) -> Stage2<'static> {
        Stage2::new(config, LlvmOptions::default())
    }

    #[test]
    fn test_ldflags() {
        let cx = session_at(Path::new("/android"));
        let mut b = stage2(Config::linux(false));
        let c = b.config.clone();
        let ldflags = b.ldflags(&cx, &c).unwrap();
        assert!(ldflags.contains(&"-Wl,-rpath,\\$ORIGIN/../lib/x86_64-unknown-linux-gnu".to_string()));
        assert!(ldflags.contains(&"-Wl,--icf=safe".to_string()));
        assert!(!ldflags.contains(&"-Wl,-q".to_string()));

        b.bolt_instrument = true;
        b.lto = true;
        b.options.enable_mlgo = true;
        let ldflags = b.ldflags(&cx, &c).unwrap();
        assert!(ldflags.contains(&"-Wl,-q".to_string()));
        assert_eq!(ldflags.last().unwrap(), "-Wl,-mllvm,-regalloc-enable-advisor=release");
        assert!(b.cflags(&cx, &c).unwrap().is_empty());

        let musl = stage2(Config::linux_musl_host(Arch::X86_64));
        let ldflags = musl.ldflags(&cx, &musl.config).unwrap();
        assert_eq!(ldflags[0], "-Wl,-rpath,\\$ORIGIN/../lib/x86_64-unknown-linux-musl");
    }

    #[test]
    fn test_cflags_with_profile() {
        let cx = session_at(Path::new("/android"));
        let mut b = stage2(Config::linux(false));
        b.profdata_file = Some(PathBuf::from("/out/clang.profdata"));
        b.options.enable_mlgo = true;
        let c = b.config.clone();
        assert_eq!(
            b.cflags(&cx, &c).unwrap(),
            vec![
                "-Wno-profile-instr-out-of-date",
                "-Wno-profile-instr-unprofiled",
                "-mllvm -regalloc-enable-advisor=release",
            ]
        );
    }

    #[test]
    fn test_thin_lto_conditions() {
        let mut b = stage2(Config::linux(false));
        let c = b.config.clone();
        assert!(!b.thin_lto(&c));
        b.lto = true;
        assert!(b.thin_lto(&c));
        b.build_instrumented = true;
        assert!(!b.thin_lto(&c));
        b.build_instrumented = false;
        b.debug_build = true;
        assert!(!b.thin_lto(&c));
    }

    #[test]
    fn test_env_library_path() {
        let cx = session_at(Path::new("/android"));
        let b = stage2(Config::linux(false));
        let env = b.env(&cx, &b.config).unwrap();
        let lib_path = &env["LD_LIBRARY_PATH"];
        assert!(lib_path.starts_with("/android/prebuilts/clang/host/linux-x86/"));
        assert!(lib_path.ends_with(":/android/out/stage2-install/lib"));
        assert_eq!(lib_path.split(':').count(), 4);
    }

    #[test]
    fn test_projects() {
        let b = stage2(Config::linux(false));
        assert!(b.llvm_projects().contains("bolt"));
        assert!(!b.llvm_projects().contains("lldb"));
        assert_eq!(b.llvm_targets(&b.config).len(), ANDROID_TARGETS.len());
        assert!(b.remove_install_dir());
    }

    #[test]
    fn test_lldb_wrapper() {
        let script = lldb_wrapper("LD_LIBRARY_PATH");
        assert!(script.starts_with("#!/bin/bash\nCURDIR="));
        assert!(script.contains(
            "export LD_LIBRARY_PATH=\"$CURDIR/../python3/lib:$LD_LIBRARY_PATH\"\n"
        ));
        assert!(script.ends_with("\"$CURDIR/lldb\" \"$@\"\n"));
    }
}
