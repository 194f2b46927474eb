//! compiler-rt and libunwind for the musl host triples.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::{llvm, output_resource_dir, Builder};
use crate::config::{Config, Defines};
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::Result;
use std::path::PathBuf;

pub struct MuslHostRuntime {
    pub enable_assertions: bool,
}

impl Builder for MuslHostRuntime {
    fn name(&self) -> &'static str {
        "compiler-rt-linux-musl"
    }

    fn config_list(&self) -> Vec<Config> {
        [Arch::X86_64, Arch::I386, Arch::Aarch64, Arch::Arm]
            .into_iter()
            .map(Config::linux_musl)
            .collect()
    }

    /// The output toolchain's resource dir holds the freshly built builtins.
    /// Only matters when an earlier stage compiles the runtimes.
    fn cflags(&self, cx: &Session, _c: &Config) -> Result<Vec<String>> {
        let clang_lib_dir = cx.output_toolchain()?.clang_lib_dir()?;
        Ok(vec![
            "-resource-dir".to_string(),
            clang_lib_dir.display().to_string(),
        ])
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for MuslHostRuntime {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("runtimes")
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        Ok(output_resource_dir(cx, c)?.join(c.llvm_triple()))
    }

    fn enable_assertions(&self) -> bool {
        self.enable_assertions
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let triple = c.llvm_triple();
        define(&mut defines, "LLVM_ENABLE_RUNTIMES", "compiler-rt;libunwind");

        // ORC doesn't build against musl.
        define(&mut defines, "COMPILER_RT_BUILD_ORC", "OFF");

        define(
            &mut defines,
            "LIBUNWIND_ENABLE_ASSERTIONS",
            if self.enable_assertions { "TRUE" } else { "FALSE" },
        );
        define(&mut defines, "LIBUNWIND_ENABLE_SHARED", "FALSE");
        define(&mut defines, "LIBUNWIND_TARGET_TRIPLE", triple.clone());
        define(&mut defines, "COMPILER_RT_HAS_LIBSTDCXX", "FALSE");
        define(&mut defines, "COMPILER_RT_HAS_LIBCXX", "TRUE");
        define(&mut defines, "SANITIZER_CXX_ABI", "libcxxabi");
        define(&mut defines, "COMPILER_RT_USE_BUILTINS_LIBRARY", "TRUE");

        // Only armhf for arm; the C++ target also covers the libc++ inside
        // libclang_rt.fuzzer.
        define(&mut defines, "CMAKE_C_COMPILER_TARGET", triple.clone());
        define(&mut defines, "CMAKE_CXX_COMPILER_TARGET", triple);
        define(&mut defines, "COMPILER_RT_DEFAULT_TARGET_ONLY", "TRUE");
        Ok(defines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use std::path::Path;

    #[test]
    fn test_configs_cross_compile() {
        let builder = MuslHostRuntime {
            enable_assertions: false,
        };
        let configs = builder.config_list();
        assert_eq!(configs.len(), 4);
        assert!(configs.iter().all(|c| c.is_musl() && c.is_cross_compiling()));
        assert_eq!(configs[3].llvm_triple(), "arm-unknown-linux-musleabihf");
    }

    #[test]
    fn test_needs_output_toolchain() {
        let cx = session_at(Path::new("/android"));
        let builder = MuslHostRuntime {
            enable_assertions: true,
        };
        let c = Config::linux_musl(Arch::X86_64);
        assert!(builder.cflags(&cx, &c).is_err());
        assert!(builder.install_dir(&cx, &c).is_err());
    }
}
