//! compiler-rt builtins.

use crate::builder::cmake::{self, define, lib_output_dir, suffixed, CMakeBuilder};
use crate::builder::{llvm, output_resource_dir, resource_dir, Builder};
use crate::config::{android_configs, AndroidOptions, AndroidTarget, Config, Defines, Target, Variant};
use crate::fs_util::copy_file;
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::Result;
use std::path::PathBuf;

pub struct Builtins;

/// Arch component of the builtins file name.
pub fn builtins_arch(c: &Config) -> &'static str {
    match c.arch() {
        Arch::I386 => "i686",
        Arch::Arm if c.is_musl() => "armhf",
        arch => arch.value(),
    }
}

/// `libclang_rt.builtins-<arch>[-android].a`
pub fn builtins_file_name(c: &Config) -> String {
    let suffix = if c.os().is_android() { "-android.a" } else { ".a" };
    format!("libclang_rt.builtins-{}{suffix}", builtins_arch(c))
}

impl Builder for Builtins {
    fn name(&self) -> &'static str {
        "builtins"
    }

    /// NDK only: the platform shares the NDK copy since both use the same
    /// resource directory. riscv64 has no NDK, so it gets a platform build.
    /// arm and i386 also get a copy exporting its symbols for bionic.
    fn config_list(&self) -> Vec<Config> {
        let mut configs = android_configs(AndroidOptions::ndk());
        configs.push(Config::android(AndroidTarget {
            platform: true,
            ..AndroidTarget::new(Arch::Riscv64)
        }));
        configs.push(Target::Baremetal { arch: Arch::Aarch64 }.into());
        for arch in [Arch::Arm, Arch::I386] {
            configs.push(Config::android(AndroidTarget::new(arch)).with_variant(Variant::Exported));
        }
        configs.push(Config::linux_musl(Arch::Aarch64));
        configs.push(Config::linux_musl(Arch::Arm));
        configs
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for Builtins {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("compiler-rt/lib/builtins")
    }

    fn output_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        let dir = lib_output_dir(cx, self.name(), c);
        if c.variant.is_exported() {
            suffixed(&dir, "-exported")
        } else {
            dir
        }
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        llvm::runtime_install_dir(cx, c)
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let exported = c.variant.is_exported();
        define(
            &mut defines,
            "COMPILER_RT_BUILTINS_HIDE_SYMBOLS",
            if exported { "FALSE" } else { "TRUE" },
        );
        // COMPILER_RT_DEFAULT_TARGET_TRIPLE would also build armv6m on
        // non-Android arm, under the same output name.
        let triple = c.llvm_triple();
        define(&mut defines, "CMAKE_C_COMPILER_TARGET", triple.clone());
        define(&mut defines, "CMAKE_CXX_COMPILER_TARGET", triple);
        define(&mut defines, "COMPILER_RT_DEFAULT_TARGET_ONLY", "TRUE");
        // Nothing links until the builtins exist.
        define(&mut defines, "CMAKE_TRY_COMPILE_TARGET_TYPE", "STATIC_LIBRARY");
        define(&mut defines, "COMPILER_RT_EXCLUDE_ATOMIC_BUILTIN", "OFF");
        define(&mut defines, "COMPILER_RT_OS_DIR", c.os().crt_dir()?);
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let filename = builtins_file_name(c);
        let src = self
            .output_dir(cx, c)
            .join("lib")
            .join(c.os().crt_dir()?)
            .join(&filename);
        let out_res_dir = output_resource_dir(cx, c)?;

        if c.variant.is_exported() {
            // Only for bionic's libc.so.
            let exported = format!("libclang_rt.builtins-{}-android-exported.a", builtins_arch(c));
            return copy_file(&src, &out_res_dir.join(exported));
        }

        copy_file(&src, &out_res_dir.join(&filename))?;
        let res_dir = resource_dir(cx, c)?;
        if res_dir != out_res_dir {
            copy_file(&src, &res_dir.join(&filename))?;
        }
        if c.os().is_android() {
            let ndk_dir = cx.output_toolchain()?.path.join("runtimes_ndk_cxx");
            copy_file(&src, &ndk_dir.join(&filename))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use std::path::Path;

    #[test]
    fn test_file_names() {
        let android_i386 = Config::android(AndroidTarget::new(Arch::I386));
        assert_eq!(builtins_file_name(&android_i386), "libclang_rt.builtins-i686-android.a");
        assert_eq!(
            builtins_file_name(&Config::linux_musl(Arch::Arm)),
            "libclang_rt.builtins-armhf.a"
        );
        assert_eq!(
            builtins_file_name(&Target::Baremetal { arch: Arch::Aarch64 }.into()),
            "libclang_rt.builtins-aarch64.a"
        );
    }

    #[test]
    fn test_configs_and_output_dirs() {
        let cx = session_at(Path::new("/android"));
        let configs = Builtins.config_list();
        assert_eq!(configs.len(), 10);
        let exported: Vec<_> = configs.iter().filter(|c| c.variant.is_exported()).collect();
        assert_eq!(exported.len(), 2);
        assert_eq!(
            Builtins.output_dir(&cx, exported[0]),
            PathBuf::from("/android/out/lib/builtins-arm-ndk-cxx-exported")
        );
        assert!(configs.iter().any(|c| c.arch() == Arch::Riscv64 && c.is_platform()));
    }
}
