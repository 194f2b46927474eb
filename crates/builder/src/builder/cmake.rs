//! CMake + Ninja builds.

use super::Builder;
use crate::config::{join_flags, path_str, Config, Defines, Env};
use crate::constants::MAC_MIN_VERSION;
use crate::fs_util::remove_dir_if_exists;
use crate::process::{arg, create_script, Cmd};
use crate::session::Session;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait CMakeBuilder: Builder {
    fn src_dir(&self, cx: &Session) -> PathBuf;

    /// Build tree for `c`.
    fn output_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        lib_output_dir(cx, self.name(), c)
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> Result<PathBuf> {
        Ok(suffixed(&self.output_dir(cx, c), "-install"))
    }

    fn cmake_defines(&self, cx: &Session, c: &Config) -> Result<Defines> {
        base_defines(self, cx, c)
    }

    /// Targets for the build step. Empty means ninja's default.
    fn ninja_targets(&self) -> Vec<String> {
        Vec::new()
    }

    fn remove_cmake_cache(&self) -> bool {
        false
    }

    fn remove_install_dir(&self) -> bool {
        false
    }

    /// Only consulted by the LLVM layers.
    fn enable_assertions(&self) -> bool {
        false
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        ninja_install(self, cx, c)
    }
}

/// `out/lib/<name><config suffix>`
pub fn lib_output_dir(cx: &Session, name: &str, c: &Config) -> PathBuf {
    cx.paths
        .out_dir
        .join("lib")
        .join(format!("{name}{}", c.output_suffix()))
}

/// `dir` with `suffix` appended to its last component.
pub fn suffixed(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    dir.with_file_name(name)
}

pub fn define(defines: &mut Defines, key: &str, value: impl Into<String>) {
    defines.insert(key.to_string(), value.into());
}

/// Compilers, binutils, flags and cross-compilation settings for `c`.
pub fn base_defines<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<Defines> {
    let paths = &cx.paths;
    let toolchain = b.toolchain(cx);

    let mut cflags = c.cflags(paths);
    cflags.extend(b.cflags(cx, c)?);
    let mut cxxflags = c.cxxflags(paths);
    cxxflags.extend(b.cxxflags(cx, c)?);
    let mut ldflags = c.ldflags(paths);
    ldflags.extend(b.ldflags(cx, c)?);
    let sysroot = c.sysroot(paths);
    if let Some(sysroot) = &sysroot {
        let flag = format!("--sysroot={}", sysroot.display());
        cflags.push(flag.clone());
        cxxflags.push(flag.clone());
        ldflags.push(flag);
    }
    let cflags = join_flags(&cflags);
    let cxxflags = join_flags(&cxxflags);
    let ldflags = join_flags(&ldflags);

    let mut defines = Defines::new();
    define(&mut defines, "CMAKE_C_COMPILER", path_str(&c.c_compiler(toolchain)));
    define(&mut defines, "CMAKE_CXX_COMPILER", path_str(&c.cxx_compiler(toolchain)));

    define(&mut defines, "CMAKE_ADDR2LINE", path_str(&toolchain.addr2line()));
    define(&mut defines, "CMAKE_AR", path_str(&toolchain.ar()));
    define(&mut defines, "CMAKE_NM", path_str(&toolchain.nm()));
    define(&mut defines, "CMAKE_OBJCOPY", path_str(&toolchain.objcopy()));
    define(&mut defines, "CMAKE_OBJDUMP", path_str(&toolchain.objdump()));
    define(&mut defines, "CMAKE_RANLIB", path_str(&toolchain.ranlib()));
    define(&mut defines, "CMAKE_READELF", path_str(&toolchain.readelf()));
    define(&mut defines, "CMAKE_STRIP", path_str(&toolchain.strip()));
    define(&mut defines, "CMAKE_MT", path_str(&toolchain.mt()));

    define(&mut defines, "CMAKE_ASM_FLAGS", cflags.clone());
    define(&mut defines, "CMAKE_C_FLAGS", cflags);
    define(&mut defines, "CMAKE_CXX_FLAGS", cxxflags);

    define(&mut defines, "CMAKE_EXE_LINKER_FLAGS", ldflags.clone());
    define(&mut defines, "CMAKE_SHARED_LINKER_FLAGS", ldflags.clone());
    define(&mut defines, "CMAKE_MODULE_LINKER_FLAGS", ldflags);

    define(&mut defines, "CMAKE_BUILD_TYPE", "Release");
    define(&mut defines, "CMAKE_INSTALL_PREFIX", path_str(&b.install_dir(cx, c)?));
    define(&mut defines, "CMAKE_MAKE_PROGRAM", path_str(&paths.ninja_bin_path()));

    define(&mut defines, "CMAKE_FIND_ROOT_PATH_MODE_INCLUDE", "ONLY");
    define(&mut defines, "CMAKE_FIND_ROOT_PATH_MODE_LIBRARY", "ONLY");
    define(&mut defines, "CMAKE_FIND_ROOT_PATH_MODE_PACKAGE", "ONLY");
    define(&mut defines, "CMAKE_FIND_ROOT_PATH_MODE_PROGRAM", "NEVER");
    define(&mut defines, "CMAKE_POSITION_INDEPENDENT_CODE", "ON");

    if let Some(linker) = c.linker(toolchain) {
        define(&mut defines, "CMAKE_LINKER", path_str(&linker));
    }
    if let Some(sysroot) = &sysroot {
        define(&mut defines, "CMAKE_SYSROOT", path_str(sysroot));
    }
    let os = c.os();
    if os.is_android() {
        define(&mut defines, "ANDROID", "1");
        // Keeps CMake's own NDK handling out of the way.
        define(&mut defines, "CMAKE_SYSTEM_VERSION", "1");
    }
    if os.is_darwin() {
        define(&mut defines, "CMAKE_OSX_DEPLOYMENT_TARGET", MAC_MIN_VERSION);
        define(&mut defines, "CMAKE_OSX_ARCHITECTURES", "arm64;x86_64");
        define(&mut defines, "CMAKE_LIPO", path_str(&toolchain.lipo()));
    }
    if os.is_windows() {
        define(&mut defines, "CMAKE_RC_COMPILER", path_str(&toolchain.rc()));
        define(
            &mut defines,
            "CMAKE_RC_FLAGS",
            format!("-I {}/include/", paths.mingw_root().display()),
        );
    }
    if c.is_cross_compiling() {
        define(&mut defines, "CMAKE_SYSTEM_NAME", os.capitalized());
        define(&mut defines, "CMAKE_SYSTEM_PROCESSOR", c.arch().value());
    }
    defines.extend(c.cmake_defines());
    Ok(defines)
}

/// Removes `CMakeCache.txt` files and `CMakeFiles` directories below `dir`.
pub fn rm_cmake_cache(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    let stale: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() == "CMakeCache.txt" || e.file_name() == "CMakeFiles")
        .map(walkdir::DirEntry::into_path)
        .collect();
    for path in stale {
        if path.is_dir() {
            remove_dir_if_exists(&path)?;
        } else if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Runs ninja in the build tree of `c`, optionally with extra variables.
pub fn ninja<B: CMakeBuilder + ?Sized>(
    b: &B,
    cx: &Session,
    c: &Config,
    targets: &[String],
    add_env: Option<&Env>,
) -> Result<()> {
    let mut env = b.env(cx, c)?;
    if let Some(add_env) = add_env {
        env.extend(add_env.clone());
    }
    Cmd::new([arg(cx.paths.ninja_bin_path())])
        .args(targets.iter().cloned())
        .cwd(b.output_dir(cx, c))
        .env(env)
        .run()
}

/// The CMake command line configuring `c`.
pub fn cmake_command<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<Vec<String>> {
    let mut cmd = vec![
        arg(cx.paths.cmake_bin_path()),
        "-G".to_string(),
        "Ninja".to_string(),
    ];
    cmd.extend(
        b.cmake_defines(cx, c)?
            .into_iter()
            .map(|(key, value)| format!("-D{key}={value}")),
    );
    cmd.push(arg(b.src_dir(cx)));
    Ok(cmd)
}

/// Configure, build and install one config.
pub fn build_config<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    let output_dir = b.output_dir(cx, c);
    if b.remove_cmake_cache() {
        rm_cmake_cache(&output_dir)?;
    }
    if b.remove_install_dir() {
        remove_dir_if_exists(&b.install_dir(cx, c)?)?;
    }

    let cmake_cmd = cmake_command(b, cx, c)?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let env = b.env(cx, c)?;
    create_script(&output_dir.join("cmake_invocation.sh"), &cmake_cmd, &env, &cx.orig_env)?;
    Cmd::new(cmake_cmd).cwd(&output_dir).env(env).run()?;

    ninja(b, cx, c, &b.ninja_targets(), None)?;
    b.install_config(cx, c)
}

pub fn ninja_install<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    ninja(b, cx, c, &["install".to_string()], None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AndroidTarget, Target};
    use crate::hosts::Arch;
    use crate::session::tests::session_at;

    struct Plain {
        config: Config,
    }

    impl Builder for Plain {
        fn name(&self) -> &'static str {
            "libplain"
        }
        fn config_list(&self) -> Vec<Config> {
            vec![self.config.clone()]
        }
        fn cflags(&self, _cx: &Session, _c: &Config) -> Result<Vec<String>> {
            Ok(vec!["-DPLAIN".to_string()])
        }
        fn build_config(&self, cx: &Session, c: &Config) -> Result<()> {
            build_config(self, cx, c)
        }
    }

    impl CMakeBuilder for Plain {
        fn src_dir(&self, cx: &Session) -> PathBuf {
            cx.paths.external_dir().join("plain")
        }
    }

    #[test]
    fn test_suffixed() {
        assert_eq!(
            suffixed(Path::new("/out/lib/libxml2-linux"), "-install"),
            PathBuf::from("/out/lib/libxml2-linux-install")
        );
    }

    #[test]
    fn test_android_defines() {
        let cx = session_at(Path::new("/android"));
        let b = Plain {
            config: Config::android(AndroidTarget::new(Arch::Aarch64)),
        };
        let c = b.config.clone();
        let defines = b.cmake_defines(&cx, &c).unwrap();
        assert_eq!(defines["ANDROID"], "1");
        assert_eq!(defines["CMAKE_SYSTEM_NAME"], "Android");
        assert_eq!(defines["CMAKE_SYSTEM_PROCESSOR"], "aarch64");
        assert_eq!(
            defines["CMAKE_SYSROOT"],
            "/android/out/sysroots/ndk/arm64"
        );
        assert!(defines["CMAKE_C_FLAGS"].contains("-DPLAIN"));
        assert!(defines["CMAKE_CXX_FLAGS"].ends_with("--sysroot=/android/out/sysroots/ndk/arm64"));
        assert_eq!(
            defines["CMAKE_INSTALL_PREFIX"],
            "/android/out/lib/libplain-aarch64-ndk-cxx-install"
        );
        assert!(defines["CMAKE_LINKER"].ends_with("/bin/ld.lld"));
    }

    #[test]
    fn test_host_defines() {
        let cx = session_at(Path::new("/android"));
        let b = Plain {
            config: Config::linux(false),
        };
        let defines = b.cmake_defines(&cx, &b.config).unwrap();
        assert!(!defines.contains_key("CMAKE_SYSTEM_NAME"));
        assert!(!defines.contains_key("ANDROID"));
        assert_eq!(defines["CMAKE_BUILD_TYPE"], "Release");
        assert!(defines["CMAKE_EXE_LINKER_FLAGS"].contains("-L/android/prebuilts/clang/host/linux-x86/"));

        let mingw = Plain {
            config: Config::mingw(false),
        };
        let defines = mingw.cmake_defines(&cx, &mingw.config).unwrap();
        assert_eq!(defines["CMAKE_SYSTEM_NAME"], "Windows");
        assert!(defines["CMAKE_RC_FLAGS"].starts_with("-I /android/prebuilts/gcc/linux-x86/host/"));
    }

    #[test]
    fn test_msvc_uses_clang_cl() {
        let cx = session_at(Path::new("/android"));
        let b = Plain {
            config: Config::new(Target::Msvc {
                sdk: PathBuf::from("/sdk"),
            }),
        };
        let defines = b.cmake_defines(&cx, &b.config).unwrap();
        assert!(defines["CMAKE_C_COMPILER"].ends_with("/bin/clang-cl"));
        assert!(defines["CMAKE_LINKER"].ends_with("/bin/lld-link"));
        assert_eq!(defines["CMAKE_MSVC_RUNTIME_LIBRARY"], "MultiThreaded");
    }

    #[test]
    fn test_cmake_command_shape() {
        let cx = session_at(Path::new("/android"));
        let b = Plain {
            config: Config::linux(false),
        };
        let cmd = cmake_command(&b, &cx, &b.config).unwrap();
        assert!(cmd[0].ends_with("/bin/cmake"));
        assert_eq!(cmd[1..3], ["-G".to_string(), "Ninja".to_string()]);
        assert_eq!(cmd.last().unwrap(), "/android/external/plain");
        assert!(cmd.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
    }

    #[test]
    fn test_rm_cmake_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/CMakeFiles/x")).unwrap();
        fs::write(dir.path().join("CMakeCache.txt"), "").unwrap();
        fs::write(dir.path().join("sub/CMakeCache.txt"), "").unwrap();
        fs::write(dir.path().join("sub/build.ninja"), "").unwrap();

        rm_cmake_cache(dir.path()).unwrap();
        assert!(!dir.path().join("CMakeCache.txt").exists());
        assert!(!dir.path().join("sub/CMakeFiles").exists());
        assert!(dir.path().join("sub/build.ninja").exists());
    }
}
