//! The Windows toolchain, cross-compiled on Linux with stage1.

use crate::builder::cmake::{define, CMakeBuilder};
use crate::builder::llvm::{self, LlvmDeps, LlvmOptions, LlvmProject};
use crate::builder::{base_ldflags, Builder};
use crate::config::{path_str, Config, Defines};
use crate::constants::ANDROID_TARGETS;
use crate::paths::PYTHON_VER;
use crate::session::Session;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

const LLDB_WRAPPER: &str = "@ECHO OFF\n\
SET PYTHONHOME=%~dp0..\\python3\n\
SET PATH=%~dp0..\\python3;%PATH%\n\
%~dp0lldb.exe %*\n\
EXIT /B %ERRORLEVEL%\n";

pub struct WindowsToolchain<'a> {
    pub config: Config,
    pub options: LlvmOptions,
    pub deps: LlvmDeps<'a>,
    /// stage1, whose host tablegens and llvm-config drive the cross build.
    pub toolchain: &'a Toolchain,
}

impl Builder for WindowsToolchain<'_> {
    fn name(&self) -> &'static str {
        "windows-x86-64"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn toolchain<'a>(&'a self, _cx: &'a Session) -> &'a Toolchain {
        self.toolchain
    }

    fn cflags(&self, cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec![
            "-DLZMA_API_STATIC".to_string(),
            "-DMS_WIN64".to_string(),
            format!("-I{}", cx.paths.win_zlib_include_path().display()),
        ])
    }

    /// `-fuse-cxa-atexit` allows static TLS destructors (clangd).
    fn cxxflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut cxxflags = self.cflags(cx, c)?;
        cxxflags.push("-fuse-cxa-atexit".to_string());
        Ok(cxxflags)
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        let libpath_prefix = if c.is_msvc() {
            "/LIBPATH:"
        } else {
            // No runtime dependency on libgcc_eh, which needs pthread.
            ldflags.push("-static-libgcc".to_string());
            ldflags.push("-pthread".to_string());
            "-L"
        };
        ldflags.push(format!(
            "{libpath_prefix}{}",
            cx.paths.win_zlib_lib_path().display()
        ));
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_build_config(self, cx, c)
    }
}

impl CMakeBuilder for WindowsToolchain<'_> {
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
        let host_bin = self.toolchain.build_path.join("bin");
        let host_tool = |name: &str| path_str(&host_bin.join(name));

        define(&mut defines, "LLVM_BUILD_RUNTIME", "OFF");
        define(&mut defines, "LLVM_TOOL_CLANG_TOOLS_EXTRA_BUILD", "ON");
        define(&mut defines, "LLVM_TOOL_OPENMP_BUILD", "OFF");
        define(&mut defines, "LLVM_INCLUDE_TESTS", "OFF");

        define(&mut defines, "LLVM_CONFIG_PATH", host_tool("llvm-config"));
        define(&mut defines, "LLVM_TABLEGEN", host_tool("llvm-tblgen"));
        define(&mut defines, "CLANG_TABLEGEN", host_tool("clang-tblgen"));
        define(&mut defines, "CLANG_PSEUDO_GEN", host_tool("clang-pseudo-gen"));
        define(
            &mut defines,
            "CLANG_TIDY_CONFUSABLE_CHARS_GEN",
            host_tool("clang-tidy-confusable-chars-gen"),
        );
        if self.options.build_lldb {
            define(&mut defines, "LLDB_TABLEGEN", host_tool("lldb-tblgen"));
            define(
                &mut defines,
                "LLDB_PYTHON_RELATIVE_PATH",
                format!("lib/python{PYTHON_VER}/site-packages"),
            );
            define(&mut defines, "LLDB_PYTHON_EXE_RELATIVE_PATH", "python3");
            define(&mut defines, "LLDB_PYTHON_EXT_SUFFIX", ".exe");
        }
        define(&mut defines, "LLVM_ENABLE_PLUGINS", "ON");
        define(&mut defines, "CMAKE_CXX_STANDARD", "17");

        let zlib_lib = path_str(&cx.paths.win_zlib_lib_path().join("libz.a"));
        define(
            &mut defines,
            "ZLIB_INCLUDE_DIR",
            path_str(&cx.paths.win_zlib_include_path()),
        );
        define(&mut defines, "ZLIB_LIBRARY_DEBUG", zlib_lib.clone());
        define(&mut defines, "ZLIB_LIBRARY_RELEASE", zlib_lib);
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        llvm::project_install_config(self, cx, c)?;
        let wrapper = self.install_dir(cx, c)?.join("bin/lldb.cmd");
        fs::write(&wrapper, LLDB_WRAPPER)
            .with_context(|| format!("Failed to write {}", wrapper.display()))
    }
}

impl LlvmProject for WindowsToolchain<'_> {
    fn options(&self) -> &LlvmOptions {
        &self.options
    }

    fn deps(&self) -> LlvmDeps<'_> {
        self.deps
    }

    fn llvm_projects(&self) -> BTreeSet<&'static str> {
        let mut projects: BTreeSet<_> = ["clang", "clang-tools-extra", "lld", "polly"]
            .into_iter()
            .collect();
        if self.options.build_lldb {
            projects.insert("lldb");
        }
        projects
    }

    fn llvm_runtime_projects(&self, _c: &Config) -> BTreeSet<&'static str> {
        BTreeSet::new()
    }

    fn llvm_targets(&self, _c: &Config) -> BTreeSet<&'static str> {
        ANDROID_TARGETS.iter().copied().collect()
    }
}
