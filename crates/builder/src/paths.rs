//! Well-known locations in the Android checkout and the output tree.

use crate::android_version::AndroidVersion;
use crate::constants::{CLANG_PREBUILT_VERSION, NDK_VERSION};
use crate::hosts::Host;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub const PYTHON_VER: &str = "3.10";
const PYTHON_VER_SHORT: &str = "310";

/// Directory layout for one build invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    pub android_dir: PathBuf,
    pub out_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub build_host: Host,
    os_tag: &'static str,
    os_tag_musl: &'static str,
}

impl Paths {
    pub fn new(android_dir: PathBuf, out_dir: PathBuf, dist_dir: PathBuf, build_host: Host) -> Result<Self> {
        Ok(Self {
            android_dir,
            out_dir,
            dist_dir,
            build_host,
            os_tag: build_host.os_tag()?,
            os_tag_musl: build_host.os_tag_musl()?,
        })
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.toolchain_dir().join("llvm_android")
    }

    pub fn sysroots(&self) -> PathBuf {
        self.out_dir.join("sysroots")
    }

    pub fn llvm_path(&self) -> PathBuf {
        self.out_dir.join("llvm-project")
    }

    pub fn prebuilts_dir(&self) -> PathBuf {
        self.android_dir.join("prebuilts")
    }

    pub fn external_dir(&self) -> PathBuf {
        self.android_dir.join("external")
    }

    pub fn toolchain_dir(&self) -> PathBuf {
        self.android_dir.join("toolchain")
    }

    pub fn toolchain_utils_dir(&self) -> PathBuf {
        self.external_dir().join("toolchain-utils")
    }

    pub fn toolchain_llvm_path(&self) -> PathBuf {
        self.toolchain_dir().join("llvm-project")
    }

    pub fn clang_prebuilt_dir(&self) -> PathBuf {
        self.prebuilts_dir()
            .join("clang/host")
            .join(self.os_tag)
            .join(CLANG_PREBUILT_VERSION)
    }

    pub fn clang_prebuilt_libcxx_headers(&self) -> PathBuf {
        self.clang_prebuilt_dir().join("include/c++/v1")
    }

    pub fn windows_clang_prebuilt_dir(&self) -> PathBuf {
        self.prebuilts_dir()
            .join("clang/host/windows-x86")
            .join(CLANG_PREBUILT_VERSION)
    }

    pub fn bionic_headers(&self) -> PathBuf {
        self.android_dir.join("bionic/libc/include")
    }

    pub fn bionic_kernel_headers(&self) -> PathBuf {
        self.android_dir.join("bionic/libc/kernel/uapi")
    }

    pub fn go_root(&self) -> PathBuf {
        self.prebuilts_dir().join("go").join(self.os_tag)
    }

    pub fn go_bin_path(&self) -> PathBuf {
        self.go_root().join("bin")
    }

    pub fn cmake_bin_path(&self) -> PathBuf {
        self.prebuilts_dir()
            .join("cmake")
            .join(self.os_tag)
            .join("bin/cmake")
    }

    pub fn build_tools_dir(&self) -> PathBuf {
        self.prebuilts_dir().join("build-tools")
    }

    pub fn make_bin_path(&self) -> PathBuf {
        self.build_tools_dir().join(self.os_tag).join("bin/make")
    }

    pub fn ninja_bin_path(&self) -> PathBuf {
        self.build_tools_dir().join(self.os_tag_musl).join("bin/ninja")
    }

    pub fn libedit_src_dir(&self) -> PathBuf {
        self.external_dir().join("libedit")
    }

    pub fn libncurses_src_dir(&self) -> PathBuf {
        self.external_dir().join("libncurses")
    }

    pub fn libxml2_src_dir(&self) -> PathBuf {
        self.external_dir().join("libxml2")
    }

    pub fn swig_src_dir(&self) -> PathBuf {
        self.external_dir().join("swig")
    }

    pub fn xz_src_dir(&self) -> PathBuf {
        self.toolchain_dir().join("xz")
    }

    pub fn zstd_src_dir(&self) -> PathBuf {
        self.external_dir().join("zstd")
    }

    pub fn ndk_base(&self) -> PathBuf {
        self.toolchain_dir().join("prebuilts/ndk").join(NDK_VERSION)
    }

    pub fn ndk_libcxx_headers(&self) -> PathBuf {
        self.ndk_base().join("sources/cxx-stl/llvm-libc++/include")
    }

    pub fn ndk_libcxxabi_headers(&self) -> PathBuf {
        self.ndk_base().join("sources/cxx-stl/llvm-libc++abi/include")
    }

    pub fn ndk_support_headers(&self) -> PathBuf {
        self.ndk_base().join("sources/android/support/include")
    }

    pub fn riscv64_android_sysroot(&self) -> PathBuf {
        self.toolchain_dir()
            .join("prebuilts/sysroot/platform/riscv64-linux-android")
    }

    pub fn gcc_root(&self) -> PathBuf {
        self.prebuilts_dir().join("gcc").join(self.os_tag)
    }

    pub fn mingw_root(&self) -> PathBuf {
        self.prebuilts_dir()
            .join("gcc/linux-x86/host/x86_64-w64-mingw32-4.8/x86_64-w64-mingw32")
    }

    fn win_zlib_path(&self) -> PathBuf {
        self.prebuilts_dir()
            .join("clang/host/windows-x86/toolchain-prebuilts/zlib")
    }

    pub fn win_zlib_include_path(&self) -> PathBuf {
        self.win_zlib_path().join("include")
    }

    pub fn win_zlib_lib_path(&self) -> PathBuf {
        self.win_zlib_path().join("lib")
    }

    fn profiles_dir(&self) -> PathBuf {
        self.prebuilts_dir().join("clang/host/linux-x86/profiles")
    }

    pub fn pgo_profdata_filename(&self, version: AndroidVersion) -> Result<String> {
        Ok(format!("r{}.profdata", version.svn_revision_number()?))
    }

    pub fn pgo_profdata_tar(&self, version: AndroidVersion) -> Result<Option<PathBuf>> {
        let tar = self
            .profiles_dir()
            .join(format!("pgo-r{}.tar.bz2", version.svn_revision_number()?));
        Ok(existing(tar))
    }

    pub fn bolt_fdata_tar(&self, version: AndroidVersion) -> Result<Option<PathBuf>> {
        let tar = self
            .profiles_dir()
            .join(format!("bolt-r{}.tar.bz2", version.svn_revision_number()?));
        Ok(existing(tar))
    }

    pub fn mlgo_model(&self, filename: &str) -> Option<PathBuf> {
        existing(
            self.prebuilts_dir()
                .join("clang/host/linux-x86/mlgo-models")
                .join(filename),
        )
    }

    pub fn package_install_path(&self, host: Host, package_name: &str) -> Result<PathBuf> {
        Ok(self.out_dir.join("install").join(host.os_tag()?).join(package_name))
    }

    pub fn python_dir(&self, host: Host) -> Result<PathBuf> {
        Ok(self.prebuilts_dir().join("python").join(host.os_tag()?))
    }

    pub fn python_executable(&self, host: Host) -> Result<PathBuf> {
        let root = self.python_dir(host)?;
        Ok(if host.is_windows() {
            root.join("python.exe")
        } else {
            root.join("bin").join(format!("python{PYTHON_VER}"))
        })
    }

    pub fn python_include_dir(&self, host: Host) -> Result<PathBuf> {
        let root = self.python_dir(host)?;
        Ok(if host.is_windows() {
            root.join("include")
        } else {
            root.join("include").join(format!("python{PYTHON_VER}"))
        })
    }

    pub fn python_lib(&self, host: Host) -> Result<PathBuf> {
        let root = self.python_dir(host)?;
        Ok(match host {
            Host::Windows => root.join("libs").join(format!("python{PYTHON_VER_SHORT}.lib")),
            Host::Darwin => root.join("lib").join(format!("libpython{PYTHON_VER}.dylib")),
            _ => root.join("lib").join(format!("libpython{PYTHON_VER}.so")),
        })
    }

    pub fn python_dynamic_lib(&self, host: Host) -> Result<PathBuf> {
        let root = self.python_dir(host)?;
        Ok(match host {
            Host::Windows => root.join(format!("python{PYTHON_VER_SHORT}.dll")),
            Host::Darwin => root.join("lib").join(format!("libpython{PYTHON_VER}.dylib")),
            _ => root.join("lib").join(format!("libpython{PYTHON_VER}.so.1.0")),
        })
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Joins `path` under `root` unless it already is absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
