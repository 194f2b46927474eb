//! Version scripts for the platform sanitizer runtimes.

use crate::builder::{is_64bit, Builder};
use crate::config::{android_configs, AndroidOptions, Config};
use crate::hosts::Arch;
use crate::mapfile;
use crate::session::Session;
use anyhow::Result;

pub struct SanitizerMapFile;

/// (sanitizer, map file section) pairs for `c`.
fn sanitizers(c: &Config) -> Vec<(&'static str, &'static str)> {
    let mut sanitizers = vec![("asan", "ASAN"), ("ubsan_standalone", "ASAN")];
    if is_64bit(c) {
        sanitizers.push(("tsan", "TSAN"));
    }
    if c.arch() == Arch::Aarch64 {
        sanitizers.push(("hwasan", "ASAN"));
    }
    sanitizers
}

impl Builder for SanitizerMapFile {
    fn name(&self) -> &'static str {
        "sanitizer-mapfile"
    }

    fn config_list(&self) -> Vec<Config> {
        android_configs(AndroidOptions::platform())
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        let lib_dir = cx.output_toolchain()?.clang_lib_dir()?.join("lib/linux");
        let readelf = self.toolchain(cx).readelf();
        let arch = c.arch().llvm_arch();
        for (san, section) in sanitizers(c) {
            let lib = lib_dir.join(format!("libclang_rt.{san}-{arch}-android.so"));
            let map = lib_dir.join(format!("libclang_rt.{san}-{arch}-android.map.txt"));
            mapfile::create_map_file(&readelf, &lib, &map, section)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AndroidTarget;

    #[test]
    fn test_sanitizers_per_arch() {
        let arm = Config::android(AndroidTarget::new(Arch::Arm));
        assert_eq!(sanitizers(&arm).len(), 2);
        let aarch64 = Config::android(AndroidTarget::new(Arch::Aarch64));
        assert_eq!(
            sanitizers(&aarch64),
            vec![
                ("asan", "ASAN"),
                ("ubsan_standalone", "ASAN"),
                ("tsan", "TSAN"),
                ("hwasan", "ASAN"),
            ]
        );
        // riscv64 has no tsan runtime.
        let riscv64 = Config::android(AndroidTarget::new(Arch::Riscv64));
        assert_eq!(sanitizers(&riscv64).len(), 2);
    }
}
