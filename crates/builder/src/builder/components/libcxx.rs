//! Static libc++ for the MinGW Windows toolchain.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::{llvm, Builder};
use crate::config::{Config, Defines};
use crate::fs_util::{copy_file, copy_tree, remove_dir_if_exists, remove_file_if_exists};
use crate::session::Session;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct LibCxx {
    pub config: Config,
    pub enable_assertions: bool,
}

impl Builder for LibCxx {
    fn name(&self) -> &'static str {
        "libcxx"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![self.config.clone()]
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for LibCxx {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("runtimes")
    }

    /// Shared with the Windows toolchain.
    fn install_dir(&self, cx: &Session, _c: &Config) -> Result<PathBuf> {
        Ok(llvm::project_install_dir(cx, "windows-x86-64"))
    }

    fn enable_assertions(&self) -> bool {
        self.enable_assertions
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let triple = c.llvm_triple();
        let cxxflags = defines.get("CMAKE_CXX_FLAGS").cloned().unwrap_or_default();
        let ldflags = defines.get("CMAKE_EXE_LINKER_FLAGS").cloned().unwrap_or_default();

        define(&mut defines, "LLVM_ENABLE_RUNTIMES", "libcxx;libcxxabi");
        define(&mut defines, "LIBCXX_ENABLE_STATIC_ABI_LIBRARY", "ON");
        define(&mut defines, "LIBCXX_ENABLE_NEW_DELETE_DEFINITIONS", "ON");
        define(&mut defines, "LIBCXXABI_ENABLE_NEW_DELETE_DEFINITIONS", "OFF");
        define(&mut defines, "LIBCXX_CXX_ABI", "libcxxabi");
        define(&mut defines, "LIBCXX_HAS_WIN32_THREAD_API", "ON");
        define(&mut defines, "LIBCXX_TEST_COMPILER_FLAGS", cxxflags);
        define(&mut defines, "LIBCXX_TEST_LINKER_FLAGS", ldflags);
        define(&mut defines, "LIBCXX_TARGET_TRIPLE", triple.clone());
        define(&mut defines, "LIBCXXABI_TARGET_TRIPLE", triple);

        define(&mut defines, "LIBCXX_ENABLE_SHARED", "OFF");
        define(&mut defines, "LIBCXXABI_ENABLE_SHARED", "OFF");
        define(&mut defines, "LIBCXX_ENABLE_EXPERIMENTAL_LIBRARY", "OFF");

        if self.enable_assertions {
            define(&mut defines, "LIBCXX_ENABLE_ASSERTIONS", "ON");
            define(&mut defines, "LIBCXXABI_ENABLE_ASSERTIONS", "ON");
        }
        Ok(defines)
    }

    /// Replaces the prebuilt libc++ seeded into the sysroot.
    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::ninja_install(self, cx, c)?;

        let install_dir = self.install_dir(cx, c)?;
        let sysroot = c
            .sysroot(&cx.paths)
            .with_context(|| format!("{c} has no sysroot"))?;
        let headers = sysroot.join("include/c++/v1");
        for lib in ["libc++.a", "libc++abi.a"] {
            let dest = sysroot.join("lib").join(lib);
            remove_file_if_exists(&dest)?;
            copy_file(&install_dir.join("lib").join(lib), &dest)?;
        }
        remove_dir_if_exists(&headers)?;
        copy_tree(&install_dir.join("include/c++/v1"), &headers, false, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use std::path::Path;

    #[test]
    fn test_installs_next_to_windows_toolchain() {
        let cx = session_at(Path::new("/android"));
        let libcxx = LibCxx {
            config: Config::mingw(false),
            enable_assertions: false,
        };
        assert_eq!(
            libcxx.install_dir(&cx, &Config::mingw(false)).unwrap(),
            PathBuf::from("/android/out/windows-x86-64-install")
        );
        assert_eq!(libcxx.config_list(), vec![Config::mingw(false)]);
    }
}
