//! OpenMP runtime for Android.

use crate::builder::cmake::{self, define, lib_output_dir, suffixed, CMakeBuilder};
use crate::builder::{llvm, Builder};
use crate::config::{android_configs, AndroidOptions, Config, Defines, Variant};
use crate::fs_util::copy_file;
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::Result;
use std::path::PathBuf;

pub struct LibOmp;

fn lib_file_name(c: &Config) -> &'static str {
    if c.variant.is_shared() {
        "libomp.so"
    } else {
        "libomp.a"
    }
}

impl Builder for LibOmp {
    fn name(&self) -> &'static str {
        "libomp"
    }

    fn config_list(&self) -> Vec<Config> {
        let mut configs = android_configs(AndroidOptions::platform().variant(Variant::Static));
        configs.extend(android_configs(AndroidOptions::ndk().variant(Variant::Static)));
        configs.extend(android_configs(AndroidOptions::ndk().variant(Variant::Shared)));
        configs
    }

    /// Replaces the default flags: libomp's version script names symbols
    /// that aren't always defined.
    fn ldflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec!["-Wl,--undefined-version".to_string()])
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for LibOmp {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("openmp")
    }

    fn output_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        let suffix = if c.variant.is_shared() { "-shared" } else { "-static" };
        suffixed(&lib_output_dir(cx, self.name(), c), suffix)
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        llvm::runtime_install_dir(cx, c)
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        define(&mut defines, "OPENMP_ENABLE_LIBOMPTARGET", "FALSE");
        define(&mut defines, "OPENMP_ENABLE_OMPT_TOOLS", "FALSE");
        define(
            &mut defines,
            "LIBOMP_ENABLE_SHARED",
            if c.variant.is_shared() { "TRUE" } else { "FALSE" },
        );
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let src_dir = self.output_dir(cx, c).join("runtime/src");
        let libname = lib_file_name(c);
        copy_file(&src_dir.join(libname), &self.install_dir(cx, c)?.join(libname))?;

        // Headers are the same for every config.
        if c.arch() == Arch::Aarch64 {
            let header_dir = cx.output_toolchain()?.clang_builtin_header_dir()?;
            for header in ["omp.h", "omp-tools.h"] {
                copy_file(&src_dir.join(header), &header_dir.join(header))?;
            }
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
    fn test_configs_and_dirs() {
        let cx = session_at(Path::new("/android"));
        let configs = LibOmp.config_list();
        assert_eq!(configs.len(), 13);
        let shared: Vec<_> = configs.iter().filter(|c| c.variant.is_shared()).collect();
        assert_eq!(shared.len(), 4);
        assert_eq!(lib_file_name(shared[0]), "libomp.so");
        assert_eq!(
            LibOmp.output_dir(&cx, shared[0]),
            PathBuf::from("/android/out/lib/libomp-arm-ndk-cxx-shared")
        );
        assert_eq!(
            LibOmp.ldflags(&cx, shared[0]).unwrap(),
            vec!["-Wl,--undefined-version"]
        );
    }
}
