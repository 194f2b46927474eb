//! Static lldb-server for Android devices.

use crate::builder::cmake::{self, define, CMakeBuilder};
use crate::builder::{base_ldflags, llvm, Builder};
use crate::config::{android_configs, path_str, AndroidOptions, Config, Defines};
use crate::fs_util::copy_file;
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub struct LldbServer;

fn llvm_target(arch: Arch) -> Result<&'static str> {
    Ok(match arch {
        Arch::Arm => "ARM",
        Arch::Aarch64 => "AArch64",
        Arch::I386 | Arch::X86_64 => "X86",
        Arch::Riscv64 => bail!("lldb-server is not built for {arch}"),
    })
}

impl Builder for LldbServer {
    fn name(&self) -> &'static str {
        "lldb-server"
    }

    fn config_list(&self) -> Vec<Config> {
        android_configs(AndroidOptions {
            static_link: true,
            ..AndroidOptions::ndk()
        })
    }

    /// `-stdlib=libc++` is added by the build and unused under -nostdinc++.
    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec!["-Wno-unused-command-line-argument".to_string()])
    }

    fn ldflags(&self, cx: &Session, c: &Config) -> Result<Vec<String>> {
        let mut ldflags = base_ldflags(self.toolchain(cx), c);
        ldflags.push("-lunwind".to_string());
        Ok(ldflags)
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for LldbServer {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("llvm")
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        llvm::runtime_install_dir(cx, c)
    }

    fn ninja_targets(&self) -> Vec<String> {
        vec!["lldb-server".to_string()]
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = llvm::runtime_defines(self, cx, c)?;
        let host_bin = self.toolchain(cx).build_path.join("bin");
        define(&mut defines, "LLVM_ENABLE_PROJECTS", "clang;lldb");
        define(&mut defines, "LLVM_TARGETS_TO_BUILD", llvm_target(c.arch())?);
        define(&mut defines, "LLVM_TABLEGEN", path_str(&host_bin.join("llvm-tblgen")));
        define(&mut defines, "CLANG_TABLEGEN", path_str(&host_bin.join("clang-tblgen")));
        define(&mut defines, "LLDB_TABLEGEN", path_str(&host_bin.join("lldb-tblgen")));
        define(&mut defines, "LLVM_HOST_TRIPLE", c.llvm_triple().replace("i686", "i386"));
        define(&mut defines, "LLDB_ENABLE_LUA", "OFF");
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let src = self.output_dir(cx, c).join("bin/lldb-server");
        copy_file(&src, &self.install_dir(cx, c)?.join("lldb-server"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(llvm_target(Arch::I386).unwrap(), "X86");
        assert!(llvm_target(Arch::Riscv64).is_err());
        let configs = LldbServer.config_list();
        assert_eq!(configs.len(), 4);
        assert!(configs.iter().all(|c| !c.is_platform()));
        assert!(configs
            .iter()
            .all(|c| c.android_target().is_some_and(|a| a.static_link)));
    }
}
