//! Static libunwind for Android.
//!
//! Two flavours: hidden symbols (NDK and runtime builds) and exported symbols
//! (bionic's libc.so re-exports the unwinder).

use crate::builder::cmake::{self, define, lib_output_dir, suffixed, CMakeBuilder};
use crate::builder::{base_ldflags, llvm, output_resource_dir, resource_dir, Builder};
use crate::config::{android_configs, AndroidOptions, AndroidTarget, Config, Defines, Variant};
use crate::fs_util::copy_file;
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::Result;
use std::path::PathBuf;

pub struct LibUnwind {
    pub enable_assertions: bool,
}

impl Builder for LibUnwind {
    fn name(&self) -> &'static str {
        "libunwind"
    }

    fn config_list(&self) -> Vec<Config> {
        let mut configs = android_configs(AndroidOptions::ndk().variant(Variant::Hidden));
        configs.extend(android_configs(
            AndroidOptions::platform().variant(Variant::Exported),
        ));
        // riscv64 has no NDK sysroot but the runtimes still need a hidden copy.
        configs.push(
            Config::android(AndroidTarget {
                platform: true,
                ..AndroidTarget::new(Arch::Riscv64)
            })
            .with_variant(Variant::Hidden),
        );
        configs
    }

    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec!["-D_LIBUNWIND_USE_DLADDR=0".to_string()])
    }

    /// libunwind.a doesn't exist yet, so the default `-unwindlib` can't link.
    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        ldflags.push("-unwindlib=none".to_string());
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for LibUnwind {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("runtimes")
    }

    fn output_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        let suffix = if c.variant.is_exported() { "-exported" } else { "-hermetic" };
        suffixed(&lib_output_dir(cx, self.name(), c), suffix)
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        llvm::runtime_install_dir(cx, c)
    }

    fn enable_assertions(&self) -> bool {
        self.enable_assertions
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let exported = c.variant.is_exported();
        let flag = |on: bool| if on { "TRUE" } else { "FALSE" };
        define(&mut defines, "LLVM_ENABLE_RUNTIMES", "libunwind");
        define(&mut defines, "LIBUNWIND_HIDE_SYMBOLS", flag(!exported));
        define(&mut defines, "LIBUNWIND_ENABLE_SHARED", "FALSE");
        define(&mut defines, "LIBUNWIND_ENABLE_ASSERTIONS", flag(self.enable_assertions));
        // Needs dlpi_adds/dlpi_subs, only in bionic since R, so libc.so only.
        define(&mut defines, "LIBUNWIND_USE_FRAME_HEADER_CACHE", flag(exported));
        define(&mut defines, "LIBUNWIND_TARGET_TRIPLE", c.llvm_triple());
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let arch = c.arch().value();
        let src = self.output_dir(cx, c).join("lib/libunwind.a");
        let out_res_dir = output_resource_dir(cx, c)?.join(arch);

        if c.variant.is_exported() {
            return copy_file(&src, &out_res_dir.join("libunwind-exported.a"));
        }

        copy_file(&src, &out_res_dir.join("libunwind.a"))?;
        let res_dir = resource_dir(cx, c)?.join(arch);
        if res_dir != out_res_dir {
            copy_file(&src, &res_dir.join("libunwind.a"))?;
        }
        let ndk_dir = cx.output_toolchain()?.path.join("runtimes_ndk_cxx").join(arch);
        copy_file(&src, &ndk_dir.join("libunwind.a"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use std::path::Path;

    #[test]
    fn test_variants() {
        let cx = session_at(Path::new("/android"));
        let builder = LibUnwind {
            enable_assertions: false,
        };
        let configs = builder.config_list();
        // 4 NDK + 5 platform + riscv64 hidden.
        assert_eq!(configs.len(), 10);
        let last = configs.last().unwrap();
        assert_eq!(last.variant, Variant::Hidden);
        assert_eq!(
            builder.output_dir(&cx, last),
            PathBuf::from("/android/out/lib/libunwind-riscv64-hermetic")
        );
        assert_eq!(
            builder.output_dir(&cx, &configs[4]),
            PathBuf::from("/android/out/lib/libunwind-arm-exported")
        );
    }

    #[test]
    fn test_ldflags_disable_unwindlib() {
        let cx = session_at(Path::new("/android"));
        let builder = LibUnwind {
            enable_assertions: false,
        };
        let c = Config::android(AndroidTarget::new(Arch::Arm));
        assert_eq!(builder.ldflags(&cx, &c).unwrap(), vec!["-unwindlib=none"]);
    }
}
