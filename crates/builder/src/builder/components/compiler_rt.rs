//! compiler-rt sanitizers and libFuzzer for Android, plus the NDK tsan build.

use super::builtins::builtins_arch;
use crate::builder::cmake::{self, define, suffixed, CMakeBuilder};
use crate::builder::{llvm, output_resource_dir, Builder};
use crate::config::{android_configs, android_ndk_tsan_configs, AndroidOptions, AndroidTarget, Config, Defines};
use crate::fs_util::{copy_file, copy_tree, force_symlink, matches_glob};
use crate::hosts::Arch;
use crate::session::Session;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Defines shared by the full compiler-rt build and the tsan-only one.
fn sanitizer_defines<B: CMakeBuilder + ?Sized>(
    b: &B,
    cx: &Session,
    c: &Config,
    link_libs: &[&str],
) -> Result<Defines> {
    let mut defines = llvm::runtime_defines(b, cx, c)?;
    define(&mut defines, "COMPILER_RT_BUILD_BUILTINS", "OFF");
    define(&mut defines, "COMPILER_RT_USE_BUILTINS_LIBRARY", "ON");
    let cflags = defines.get("CMAKE_C_FLAGS").cloned().unwrap_or_default();
    define(&mut defines, "COMPILER_RT_TEST_COMPILER_CFLAGS", cflags);
    define(&mut defines, "COMPILER_RT_DEFAULT_TARGET_TRIPLE", c.llvm_triple());
    define(&mut defines, "COMPILER_RT_INCLUDE_TESTS", "OFF");
    define(&mut defines, "SANITIZER_CXX_ABI", "libcxxabi");
    // Otherwise compiler-rt installs into lib/android rather than lib/linux.
    defines.remove("CMAKE_SYSTEM_NAME");
    define(&mut defines, "SANITIZER_COMMON_LINK_LIBS", link_libs.join(" "));
    // compiler-rt drops -z defs once it uses the builtins library.
    define(&mut defines, "SANITIZER_COMMON_LINK_FLAGS", "-Wl,-z,defs");
    Ok(defines)
}

pub struct CompilerRt;

impl Builder for CompilerRt {
    fn name(&self) -> &'static str {
        "compiler-rt"
    }

    fn config_list(&self) -> Vec<Config> {
        let mut configs = android_configs(AndroidOptions::platform());
        configs.extend(android_configs(AndroidOptions::ndk()));
        configs
    }

    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec!["-funwind-tables".to_string()])
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }

    fn install(&self, cx: &Session) -> Result<()> {
        let header_src = self.src_dir(cx).join("lib/fuzzer");
        let header_dst = cx
            .output_toolchain()?
            .path
            .join("prebuilt_include/llvm/lib/Fuzzer");
        fs::create_dir_all(&header_dst)?;
        for entry in fs::read_dir(&header_src)
            .with_context(|| format!("Failed to read {}", header_src.display()))?
        {
            let path = entry?.path();
            let is_header = path
                .extension()
                .is_some_and(|ext| ext == "h" || ext == "def");
            if is_header {
                copy_file(&path, &header_dst.join(path.file_name().unwrap_or_default()))?;
            }
        }

        let aarch64 = Config::android(AndroidTarget::new(Arch::Aarch64));
        let link = output_resource_dir(cx, &aarch64)?.join("libclang_rt.hwasan_static-aarch64-android.a");
        force_symlink(Path::new("libclang_rt.hwasan-aarch64-android.a"), &link)
    }
}

impl CMakeBuilder for CompilerRt {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("compiler-rt")
    }

    /// Platform builds go straight into the output toolchain; NDK builds
    /// are staged and copied to runtimes_ndk_cxx.
    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        if c.is_platform() {
            return cx.output_toolchain()?.clang_lib_dir();
        }
        Ok(suffixed(&self.output_dir(cx, c), "-install"))
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut link_libs = Vec::new();
        if c.api_level().is_some_and(|level| level < 21) {
            link_libs.push("-landroid_support");
        }
        // -rtlib=compiler-rt doesn't pull in libunwind.a on Android.
        link_libs.push("-lunwind");
        let mut defines = sanitizer_defines(self, cx, c, &link_libs)?;
        if c.is_platform() {
            define(&mut defines, "COMPILER_RT_HWASAN_WITH_INTERCEPTORS", "OFF");
        }
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::ninja_install(self, cx, c)?;

        let lib_dir = self.install_dir(cx, c)?.join("lib/linux");
        // Old location of libFuzzer.a, still used by some users.
        let fuzzer = format!("libclang_rt.fuzzer-{}-android.a", builtins_arch(c));
        copy_file(
            &lib_dir.join(fuzzer),
            &lib_dir.join(c.arch().value()).join("libFuzzer.a"),
        )?;

        if !c.is_platform() {
            let ndk_dir = cx.output_toolchain()?.path.join("runtimes_ndk_cxx");
            copy_tree(&lib_dir, &ndk_dir, false, &[])?;
        }
        Ok(())
    }
}

/// tsan for the NDK, at the API level tsan needs.
pub struct Tsan;

impl Builder for Tsan {
    fn name(&self) -> &'static str {
        "tsan"
    }

    fn config_list(&self) -> Vec<Config> {
        android_ndk_tsan_configs()
    }

    fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
        Ok(vec!["-funwind-tables".to_string()])
    }

    fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::build_config(self, cx, c)
    }
}

impl CMakeBuilder for Tsan {
    fn src_dir(&self, cx: &Session) -> PathBuf {
        cx.paths.llvm_path().join("compiler-rt")
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        let mut defines = sanitizer_defines(self, cx, c, &["-lunwind"])?;
        define(&mut defines, "COMPILER_RT_SANITIZERS_TO_BUILD", "tsan");
        Ok(defines)
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        cmake::ninja_install(self, cx, c)?;

        // The build also produces fuzzer, ubsan etc.; only tsan ships.
        let lib_dir = self.install_dir(cx, c)?.join("lib/linux");
        let ndk_dir = cx.output_toolchain()?.path.join("runtimes_ndk_cxx");
        fs::create_dir_all(&ndk_dir)?;
        for entry in fs::read_dir(&lib_dir)
            .with_context(|| format!("Failed to read {}", lib_dir.display()))?
        {
            let path = entry?.path();
            let name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
            if matches_glob(&name, "*tsan*") {
                copy_file(&path, &ndk_dir.join(&name))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;
    use crate::toolchain::Toolchain;

    #[test]
    fn test_install_dirs() {
        let mut cx = session_at(Path::new("/android"));
        let ndk = Config::android(AndroidTarget::new(Arch::Aarch64));
        assert_eq!(
            CompilerRt.install_dir(&cx, &ndk).unwrap(),
            PathBuf::from("/android/out/lib/compiler-rt-aarch64-ndk-cxx-install")
        );

        let platform = Config::android(AndroidTarget {
            platform: true,
            ..AndroidTarget::new(Arch::Aarch64)
        });
        assert!(CompilerRt.install_dir(&cx, &platform).is_err());

        let install = tempfile::tempdir().unwrap();
        let version_dir = install.path().join("include/clang/Basic");
        fs::create_dir_all(&version_dir).unwrap();
        fs::write(
            version_dir.join("Version.inc"),
            "#define CLANG_VERSION_MAJOR 17\n#define CLANG_VERSION_MINOR 0\n#define CLANG_VERSION_PATCHLEVEL 2\n",
        )
        .unwrap();
        cx.set_output_toolchain(Toolchain::new(install.path(), "/android/out/stage2"));
        assert_eq!(
            CompilerRt.install_dir(&cx, &platform).unwrap(),
            install.path().join("lib/clang/17")
        );
    }

    #[test]
    fn test_config_counts() {
        assert_eq!(CompilerRt.config_list().len(), 9);
        assert!(Tsan
            .config_list()
            .iter()
            .all(|c| c.api_level() == Some(24) && !c.is_platform()));
    }
}
