//! A clang toolchain: either the prebuilt or one produced by a stage.

use crate::paths::Paths;
use crate::version::ClangVersion;
use anyhow::Result;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Toolchain {
    pub path: PathBuf,
    /// Build tree the toolchain was installed from (tablegen etc. live here).
    pub build_path: PathBuf,
    version: OnceCell<ClangVersion>,
}

impl Toolchain {
    pub fn new(path: impl Into<PathBuf>, build_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            build_path: build_path.into(),
            version: OnceCell::new(),
        }
    }

    /// The checked-in prebuilt. It has no build tree.
    pub fn prebuilt(paths: &Paths) -> Self {
        Self::new(paths.clang_prebuilt_dir(), ".")
    }

    fn bin(&self, name: &str) -> PathBuf {
        self.path.join("bin").join(name)
    }

    pub fn cc(&self) -> PathBuf {
        self.bin("clang")
    }
    pub fn cxx(&self) -> PathBuf {
        self.bin("clang++")
    }
    pub fn cl(&self) -> PathBuf {
        self.bin("clang-cl")
    }
    pub fn ar(&self) -> PathBuf {
        self.bin("llvm-ar")
    }
    pub fn lipo(&self) -> PathBuf {
        self.bin("llvm-lipo")
    }
    pub fn lld(&self) -> PathBuf {
        self.bin("ld.lld")
    }
    pub fn lld_link(&self) -> PathBuf {
        self.bin("lld-link")
    }
    pub fn rc(&self) -> PathBuf {
        self.bin("llvm-windres")
    }
    pub fn ranlib(&self) -> PathBuf {
        self.bin("llvm-ranlib")
    }
    pub fn addr2line(&self) -> PathBuf {
        self.bin("llvm-addr2line")
    }
    pub fn nm(&self) -> PathBuf {
        self.bin("llvm-nm")
    }
    pub fn objcopy(&self) -> PathBuf {
        self.bin("llvm-objcopy")
    }
    pub fn objdump(&self) -> PathBuf {
        self.bin("llvm-objdump")
    }
    pub fn readelf(&self) -> PathBuf {
        self.bin("llvm-readelf")
    }
    pub fn mt(&self) -> PathBuf {
        self.bin("llvm-mt")
    }
    pub fn strip(&self) -> PathBuf {
        self.bin("llvm-strip")
    }

    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        let lib = self.path.join("lib");
        let gnu = lib.join("x86_64-unknown-linux-gnu");
        let musl = lib.join("x86_64-unknown-linux-musl");
        vec![lib, gnu, musl]
    }

    fn version_file(&self) -> PathBuf {
        self.path.join("include/clang/Basic/Version.inc")
    }

    /// Read from `Version.inc` on first use.
    pub fn version(&self) -> Result<&ClangVersion> {
        if let Some(version) = self.version.get() {
            return Ok(version);
        }
        let version = ClangVersion::from_file(&self.version_file())?;
        Ok(self.version.get_or_init(|| version))
    }

    /// `lib/clang/<major>`
    pub fn clang_lib_dir(&self) -> Result<PathBuf> {
        Ok(self
            .path
            .join("lib/clang")
            .join(self.version()?.major_version()))
    }

    pub fn clang_builtin_header_dir(&self) -> Result<PathBuf> {
        Ok(self.clang_lib_dir()?.join("include"))
    }

    pub fn libcxx_headers(&self) -> PathBuf {
        self.path.join("include/c++/v1")
    }

    pub fn is_at(&self, path: &Path) -> bool {
        self.path == path
    }
}
