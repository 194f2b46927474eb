//! Sysroots for the Windows host and for Android devices, and the platform
//! libc++abi installed into the latter.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::{is_64bit, llvm, Builder};
use crate::config::{android_configs, AndroidOptions, Config, Defines};
use crate::fs_util::{copy_file, copy_tree, remove_dir_if_exists};
use crate::hosts::Arch;
use crate::process::{arg, check_call};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn sysroot_of(cx: &Session, c: &Config) -> Result<PathBuf> {
    c.sysroot(&cx.paths)
        .with_context(|| format!("{c} has no sysroot"))
}

/// MinGW sysroot assembled from the GCC prebuilt, seeded with the prebuilt
/// Windows libc++ so the libcxx build can configure.
pub struct HostSysroots;

impl Builder for HostSysroots {
    fn name(&self) -> &'static str {
        "host-sysroots"
    }

    fn config_list(&self) -> Vec<Config> {
        vec![Config::mingw(false)]
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let paths = &cx.paths;
        let sysroot = sysroot_of(cx, c)?;
        let sysroot_lib = sysroot.join("lib");
        remove_dir_if_exists(&sysroot)?;
        if let Some(parent) = sysroot.parent() {
            fs::create_dir_all(parent)?;
        }

        let (Some(gcc_dir), Some(gcc_lib_dir)) = (c.gcc_triple_dir(paths), c.gcc_lib_dir(paths)) else {
            bail!("{c} has no GCC prebuilt");
        };
        copy_tree(&gcc_dir, &sysroot, true, &[])?;
        copy_tree(&gcc_lib_dir, &sysroot_lib, false, &[])?;

        // Overwritten once libcxx is built.
        let prebuilt = paths.windows_clang_prebuilt_dir();
        for lib in ["libc++.a", "libc++abi.a"] {
            copy_file(&prebuilt.join("lib").join(lib), &sysroot_lib.join(lib))?;
        }
        copy_tree(
            &prebuilt.join("include/c++/v1"),
            &sysroot.join("include/c++/v1"),
            false,
            &[],
        )
    }
}

const PLATFORM_LIBCXX_STUB: &str = "\
void __cxa_atexit() {}
void __cxa_demangle() {}
void __cxa_finalize() {}
void __dynamic_cast() {}
void _ZTIN10__cxxabiv117__class_type_infoE() {}
void _ZTIN10__cxxabiv120__si_class_type_infoE() {}
void _ZTIN10__cxxabiv121__vmi_class_type_infoE() {}
void _ZTISt9type_info() {}
";

/// Android sysroots copied from the NDK (or the riscv64 sysroot). The
/// platform variant drops the NDK's STL.
pub struct DeviceSysroots;

fn remove(file: &Path) -> Result<()> {
    fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))
}

/// Removes the NDK's compiler-rt extras and, with `drop_stl`, its libc++
/// from `lib_dir` and the per-API-level directories below it.
pub fn prune_sysroot_libs(lib_dir: &Path, drop_stl: bool) -> Result<()> {
    remove(&lib_dir.join("libcompiler_rt-extras.a"))?;
    if !drop_stl {
        return Ok(());
    }
    for lib in ["libc++abi.a", "libc++_static.a", "libc++_shared.so"] {
        remove(&lib_dir.join(lib))?;
    }
    for entry in fs::read_dir(lib_dir)? {
        let path = entry?.path();
        if path.is_symlink() || !path.is_dir() {
            continue;
        }
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_digit()) {
            continue;
        }
        remove(&path.join("libc++.a"))?;
        remove(&path.join("libc++.so"))?;
    }
    Ok(())
}

/// Fails if a library that should have been pruned is still in `sysroot`.
pub fn verify_pruned(sysroot: &Path, platform: bool) -> Result<()> {
    let mut gone = vec!["libcompiler_rt-extras.a", "libunwind.a"];
    if platform {
        gone.extend(["libc++abi.a", "libc++_static.a", "libc++_shared.so", "libc++.a", "libc++.so"]);
    }
    for entry in WalkDir::new(sysroot).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if gone.contains(&name.as_ref()) {
            bail!("sysroot file should have been removed: {}", entry.path().display());
        }
    }
    Ok(())
}

impl Builder for DeviceSysroots {
    fn name(&self) -> &'static str {
        "device-sysroots"
    }

    fn config_list(&self) -> Vec<Config> {
        let mut configs = android_configs(AndroidOptions::platform());
        configs.extend(android_configs(AndroidOptions::ndk()));
        configs
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let Some(android) = c.android_target() else {
            bail!("{c} is not an Android config");
        };
        let paths = &cx.paths;
        let platform = android.platform;
        let riscv64 = android.arch == Arch::Riscv64;
        let sysroot = sysroot_of(cx, c)?;
        remove_dir_if_exists(&sysroot)?;
        fs::create_dir_all(&sysroot)?;

        let src_sysroot = if riscv64 {
            paths.riscv64_android_sysroot()
        } else {
            paths.ndk_base().join("toolchains/llvm/prebuilt/linux-x86_64/sysroot")
        };

        copy_tree(&src_sysroot.join("usr/include"), &sysroot.join("usr/include"), true, &[])?;
        if platform {
            if !riscv64 {
                remove_dir_if_exists(&sysroot.join("usr/include/c++"))?;
            }
        } else {
            // android_support headers.
            copy_tree(
                &src_sysroot.join("usr/local/include"),
                &sysroot.join("usr/local/include"),
                true,
                &[],
            )?;
        }

        let triple_lib = Path::new("usr/lib").join(android.ndk_sysroot_triple());
        let dest_lib = sysroot.join(&triple_lib);
        copy_tree(&src_sysroot.join(&triple_lib), &dest_lib, true, &[])?;
        // The riscv64 sysroot has no STL to remove.
        prune_sysroot_libs(&dest_lib, platform && !riscv64)?;
        verify_pruned(&sysroot, platform)?;

        if platform {
            let stub_dir = paths.out_dir.join("platform_stubs").join(android.ndk_arch());
            fs::create_dir_all(&stub_dir)?;
            let lib_dir = sysroot.join("usr/lib");
            fs::create_dir_all(&lib_dir)?;
            let stub = stub_dir.join("libc++.c");
            fs::write(&stub, PLATFORM_LIBCXX_STUB)?;
            check_call([
                arg(self.toolchain(cx).cc()),
                format!("--target={}", c.llvm_triple()),
                "-fuse-ld=lld".to_string(),
                "-nostdlib".to_string(),
                "-shared".to_string(),
                "-Wl,-soname,libc++.so".to_string(),
                format!("-o{}", lib_dir.join("libc++.so").display()),
                arg(&stub),
            ])?;
        }
        Ok(())
    }
}

/// Static libc++abi in the platform sysroots, used by the sanitizer runtimes.
/// 32-bit sysroots get a linker script pointing at libc++ instead.
pub struct PlatformLibcxxAbi;

impl Builder for PlatformLibcxxAbi {
    fn name(&self) -> &'static str {
        "platform-libcxxabi"
    }

    fn config_list(&self) -> Vec<Config> {
        android_configs(AndroidOptions {
            suppress_libcxx_headers: true,
            ..AndroidOptions::platform()
        })
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        if is_64bit(c) {
            cmake::build_config(self, cx, c)
        } else {
            self.install_config(cx, c)
        }
    }
}

impl CMakeBuilder for PlatformLibcxxAbi {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("runtimes")
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        llvm::runtime_install_dir(cx, c)
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let triple = c.llvm_triple();
        define(&mut defines, "LLVM_ENABLE_RUNTIMES", "libcxx;libcxxabi");
        define(&mut defines, "LIBCXXABI_ENABLE_SHARED", "OFF");
        define(&mut defines, "LIBCXXABI_TARGET_TRIPLE", triple.clone());
        define(&mut defines, "LIBCXX_ENABLE_SHARED", "OFF");
        define(&mut defines, "LIBCXX_TARGET_TRIPLE", triple);
        define(&mut defines, "LIBCXX_ENABLE_ABI_LINKER_SCRIPT", "OFF");
        define(&mut defines, "LIBCXX_ENABLE_STATIC_ABI_LIBRARY", "ON");
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let lib_dir = sysroot_of(cx, c)?.join("usr/lib");
        if is_64bit(c) {
            let src = self.output_dir(cx, c).join("lib/libc++abi.a");
            copy_file(&src, &lib_dir.join("libc++abi.a"))
        } else {
            fs::create_dir_all(&lib_dir)?;
            fs::write(lib_dir.join("libc++abi.so"), "INPUT(-lc++)")
                .context("Failed to write libc++abi.so linker script")
        }
    }
}
