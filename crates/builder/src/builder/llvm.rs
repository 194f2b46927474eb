//! LLVM-specific CMake layers.
//!
//! - base: settings shared by the whole project and single runtime builds
//! - runtime: a single runtime library installed into the output toolchain
//! - project: the llvm tree itself (stage1, stage2, the Windows toolchain)

use super::cmake::{self, define, suffixed, CMakeBuilder};
use super::lib_info::{primary_link_library, LibInfo};
use super::output_resource_dir;
use crate::config::{join_flags, path_str, Config, Defines, Env};
use crate::constants::{BUG_REPORT_URL, CLANG_REPOSITORY, MAC_MIN_VERSION};
use crate::fs_util::{copy_tree, remove_file_if_exists, symlink};
use crate::hosts::{Arch, Host};
use crate::process::check_call;
use crate::session::Session;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const PYTHON_IGNORES: &[&str] = &["*.pyc", "__pycache__", "Android.bp", ".git", ".gitignore"];

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// The llvm source tree.
pub fn llvm_src_dir(cx: &Session) -> PathBuf {
    cx.paths.llvm_path().join("llvm")
}

/// Base layer: assertions, version strings, linker and prebuilt python.
pub fn base_defines<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<Defines> {
    let mut defines = cmake::base_defines(b, cx, c)?;

    define(&mut defines, "LLVM_ENABLE_ASSERTIONS", on_off(b.enable_assertions()));
    // Don't depend on libtinfo.
    define(&mut defines, "LLVM_ENABLE_TERMINFO", "OFF");
    define(&mut defines, "LLVM_ENABLE_THREADS", "ON");
    if let Some(patch_level) = cx.android_version.patch_level() {
        define(&mut defines, "LLVM_VERSION_PATCH", patch_level);
    }
    define(&mut defines, "LLVM_VERSION_SUFFIX", "");
    define(&mut defines, "CLANG_REPOSITORY_STRING", CLANG_REPOSITORY);
    define(&mut defines, "BUG_REPORT_URL", BUG_REPORT_URL);
    // Keeps CMake from checking the libstdc++ version.
    define(&mut defines, "LLVM_ENABLE_LIBCXX", "ON");
    define(
        &mut defines,
        "LLVM_USE_LINKER",
        if c.os().is_darwin() { "ld" } else { "lld" },
    );

    // Tests need a recent python; always use the prebuilt one.
    let os = c.os();
    if !matches!(os, Host::Android | Host::Baremetal) {
        let lib = path_str(&cx.paths.python_lib(os)?);
        let include = path_str(&cx.paths.python_include_dir(os)?);
        define(&mut defines, "Python3_LIBRARY", lib.clone());
        define(&mut defines, "Python3_LIBRARIES", lib);
        define(&mut defines, "Python3_INCLUDE_DIR", include.clone());
        define(&mut defines, "Python3_INCLUDE_DIRS", include);
    }
    define(
        &mut defines,
        "Python3_EXECUTABLE",
        path_str(&cx.paths.python_executable(cx.paths.build_host)?),
    );
    Ok(defines)
}

/// Runtime layer install dir: `runtimes_ndk_cxx/<arch>` for the NDK, the
/// output resource dir otherwise.
pub fn runtime_install_dir(cx: &Session, c: &Config) -> Result<PathBuf> {
    let arch = c.arch().value();
    if c.os().is_android() && !c.is_platform() {
        return Ok(cx.output_toolchain()?.path.join("runtimes_ndk_cxx").join(arch));
    }
    Ok(output_resource_dir(cx, c)?.join(arch))
}

pub fn runtime_defines<B: CMakeBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<Defines> {
    let mut defines = base_defines(b, cx, c)?;
    define(
        &mut defines,
        "LLVM_CONFIG_PATH",
        path_str(&b.toolchain(cx).path.join("bin/llvm-config")),
    );
    if let Some(api_level) = c.api_level() {
        // Checked when enabling TSAN; normally set by the NDK toolchain file.
        define(&mut defines, "ANDROID_PLATFORM_LEVEL", api_level.to_string());
    }
    Ok(defines)
}

/// Options shared by every build of the llvm tree.
#[derive(Debug, Clone, Default)]
pub struct LlvmOptions {
    pub build_name: String,
    /// Annotations added to the clang vendor string.
    pub build_tags: Vec<String>,
    pub svn_revision: String,
    pub enable_assertions: bool,
    pub enable_mlgo: bool,
    pub use_sccache: bool,
    pub build_32bit_runtimes: bool,
    pub build_lldb: bool,
    pub swig_executable: Option<PathBuf>,
}

/// Libraries the llvm tree links against, built beforehand.
#[derive(Clone, Copy, Default)]
pub struct LlvmDeps<'a> {
    pub libzstd: Option<&'a dyn LibInfo>,
    pub libxml2: Option<&'a dyn LibInfo>,
    pub liblzma: Option<&'a dyn LibInfo>,
    pub libedit: Option<&'a dyn LibInfo>,
    pub libncurses: Option<&'a dyn LibInfo>,
}

impl<'a> LlvmDeps<'a> {
    /// Libraries shipped with the toolchain, in install order.
    fn shipped(&self) -> impl Iterator<Item = &'a dyn LibInfo> {
        [self.liblzma, self.libedit, self.libxml2, self.libncurses]
            .into_iter()
            .flatten()
    }
}

pub trait LlvmProject: CMakeBuilder {
    fn options(&self) -> &LlvmOptions;

    fn deps(&self) -> LlvmDeps<'_>;

    fn llvm_projects(&self) -> BTreeSet<&'static str>;

    fn llvm_runtime_projects(&self, c: &Config) -> BTreeSet<&'static str>;

    fn llvm_targets(&self, c: &Config) -> BTreeSet<&'static str>;
}

/// `out/<name>`
pub fn project_output_dir(cx: &Session, name: &str) -> PathBuf {
    cx.paths.out_dir.join(name)
}

/// `out/<name>-install`
pub fn project_install_dir(cx: &Session, name: &str) -> PathBuf {
    suffixed(&project_output_dir(cx, name), "-install")
}

fn join_sorted(items: &BTreeSet<&str>) -> String {
    items.iter().copied().collect::<Vec<_>>().join(";")
}

/// `Android (<build name>, <tag, >...based on <revision>)`
pub fn clang_vendor(options: &LlvmOptions) -> String {
    let tags: String = options.build_tags.iter().map(|tag| format!("{tag}, ")).collect();
    format!(
        "Android ({}, {tags}based on {})",
        options.build_name, options.svn_revision
    )
}

/// Host runtimes built along with a Linux toolchain.
pub fn runtime_configs<B: LlvmProject + ?Sized>(b: &B, c: &Config) -> Vec<Config> {
    if !c.os().is_linux() {
        return Vec::new();
    }
    let mut configs = vec![c.clone()];
    if b.options().build_32bit_runtimes {
        if c.is_musl() {
            configs.push(Config::linux_musl_host(Arch::I386));
        } else {
            configs.push(Config::linux(true));
        }
    }
    configs
}

fn set_lldb_flags(deps: LlvmDeps<'_>, options: &LlvmOptions, cx: &Session, c: &Config, defines: &mut Defines) -> Result<()> {
    if c.os().is_darwin() {
        // debugserver is only used in testing.
        define(defines, "LLDB_USE_SYSTEM_DEBUGSERVER", "ON");
    }
    define(defines, "LLDB_ENABLE_LUA", "OFF");

    if let Some(swig) = &options.swig_executable {
        define(defines, "SWIG_EXECUTABLE", path_str(swig));
        define(defines, "LLDB_ENABLE_PYTHON", "ON");
        define(defines, "LLDB_EMBED_PYTHON_HOME", "OFF");
    } else {
        define(defines, "LLDB_ENABLE_PYTHON", "OFF");
    }

    if let Some(liblzma) = deps.liblzma {
        define(defines, "LLDB_ENABLE_LZMA", "ON");
        define(defines, "LIBLZMA_INCLUDE_DIR", path_str(&liblzma.include_dir(cx)));
        define(defines, "LIBLZMA_LIBRARY", path_str(&primary_link_library(liblzma, cx)?));
    } else {
        define(defines, "LLDB_ENABLE_LZMA", "OFF");
    }

    if let Some(libedit) = deps.libedit {
        define(defines, "LLDB_ENABLE_LIBEDIT", "ON");
        define(defines, "LibEdit_INCLUDE_DIRS", path_str(&libedit.include_dir(cx)));
        define(defines, "LibEdit_LIBRARIES", path_str(&primary_link_library(libedit, cx)?));
    } else {
        define(defines, "LLDB_ENABLE_LIBEDIT", "OFF");
    }

    define(defines, "LLDB_ENABLE_LIBXML2", on_off(deps.libxml2.is_some()));

    if let Some(libncurses) = deps.libncurses {
        let include = libncurses.include_dir(cx);
        define(defines, "LLDB_ENABLE_CURSES", "ON");
        define(
            defines,
            "CURSES_INCLUDE_DIRS",
            format!("{};{}", include.display(), include.join("ncurses").display()),
        );
        let curses_libs = libncurses
            .link_libraries(cx)?
            .iter()
            .map(|lib| path_str(lib))
            .collect::<Vec<_>>()
            .join(";");
        define(defines, "CURSES_LIBRARIES", curses_libs.clone());
        define(defines, "PANEL_LIBRARIES", curses_libs);
    } else {
        define(defines, "LLDB_ENABLE_CURSES", "OFF");
    }

    if let Some(libzstd) = deps.libzstd {
        let libs = libzstd.link_libraries(cx)?;
        let (Some(shared), Some(static_lib)) = (libs.first(), libs.get(1)) else {
            anyhow::bail!("libzstd needs both a shared and a static library");
        };
        define(defines, "LLVM_ENABLE_ZSTD", "FORCE_ON");
        define(defines, "LLVM_USE_STATIC_ZSTD", "ON");
        define(defines, "zstd_LIBRARY", path_str(shared));
        define(defines, "zstd_STATIC_LIBRARY", path_str(static_lib));
        define(defines, "zstd_INCLUDE_DIR", path_str(&libzstd.include_dir(cx)));
    } else {
        define(defines, "LLVM_ENABLE_ZSTD", "OFF");
    }

    define(defines, "LLDB_INCLUDE_TESTS", "OFF");
    Ok(())
}

/// Per-triple `RUNTIMES_<triple>_*` settings for host runtimes on Linux.
fn set_runtime_flags<B: LlvmProject + ?Sized>(
    b: &B,
    cx: &Session,
    c: &Config,
    defines: &mut Defines,
) -> Result<()> {
    let runtime_configs = runtime_configs(b, c);
    let triples: Vec<String> = runtime_configs.iter().map(Config::llvm_triple).collect();
    let triples = triples.join(";");
    define(defines, "LLVM_BUILTIN_TARGETS", triples.clone());
    define(defines, "LLVM_RUNTIME_TARGETS", triples.clone());

    // With per-target runtime dirs, clang no longer links the glibc builtins
    // when targeting musl.
    if b.options().build_32bit_runtimes && !c.is_musl() {
        define(
            defines,
            "LLVM_BUILTIN_TARGETS",
            format!("{triples};x86_64-unknown-linux-musl;i686-unknown-linux-musl"),
        );
    }

    let passthrough = ["CMAKE_POSITION_INDEPENDENT_CODE", "LLVM_ENABLE_LIBCXX"];
    let paths = &cx.paths;
    for runtime in &runtime_configs {
        let triple = runtime.llvm_triple();
        let mut cflags = runtime.cflags(paths);
        cflags.extend(b.cflags(cx, c)?);
        let mut cxxflags = runtime.cxxflags(paths);
        cxxflags.extend(b.cxxflags(cx, c)?);
        let mut ldflags = runtime.ldflags(paths);
        ldflags.extend(b.ldflags(cx, c)?);

        let sysroot = runtime.sysroot(paths);
        if let Some(sysroot) = &sysroot {
            cflags.push(format!("--sysroot={}", sysroot.display()));
        }
        let cflags = join_flags(&cflags);
        let cxxflags = join_flags(&cxxflags);
        let ldflags = join_flags(&ldflags);

        let key = |name: &str| format!("RUNTIMES_{triple}_{name}");
        if let Some(sysroot) = &sysroot {
            define(defines, &key("CMAKE_SYSROOT"), path_str(sysroot));
        }
        define(defines, &key("CMAKE_C_FLAGS"), cflags);
        define(defines, &key("CMAKE_CXX_FLAGS"), cxxflags.clone());
        define(defines, &key("CMAKE_EXE_LINKER_FLAGS"), ldflags.clone());
        define(defines, &key("CMAKE_SHARED_LINKER_FLAGS"), ldflags.clone());
        define(defines, &key("CMAKE_MODULE_LINKER_FLAGS"), ldflags.clone());

        // clang emits builtin calls when building compiler-rt for musl.
        if runtime.is_musl() && runtime.arch() == Arch::I386 {
            define(defines, &key("COMPILER_RT_USE_BUILTINS_LIBRARY"), "ON");
        }
        for arg in passthrough {
            if let Some(value) = defines.get(arg).cloned() {
                define(defines, &key(arg), value);
            }
        }
        // Don't depend on the host libatomic.
        define(defines, &key("LIBCXX_HAS_ATOMIC_LIB"), "NO");
        // libc++.so is a symlink rather than a linker script, with libc++abi
        // linked in statically.
        define(defines, &key("LIBCXX_ENABLE_ABI_LINKER_SCRIPT"), "OFF");
        define(defines, &key("LIBCXX_ENABLE_STATIC_ABI_LIBRARY"), "ON");
        define(defines, &key("LIBCXX_TEST_COMPILER_FLAGS"), cxxflags);
        define(defines, &key("LIBCXX_TEST_LINKER_FLAGS"), ldflags);
        // Keep libclang_rt.*_cxx.a independent of libc++abi.
        define(defines, &key("SANITIZER_ALLOW_CXXABI"), "OFF");
    }
    Ok(())
}

/// Project layer defines on top of [`base_defines`].
pub fn project_defines<B: LlvmProject + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<Defines> {
    let mut defines = base_defines(b, cx, c)?;
    let options = b.options();
    let deps = b.deps();
    let os = c.os();

    if options.use_sccache {
        define(&mut defines, "CMAKE_C_COMPILER_LAUNCHER", "sccache");
        define(&mut defines, "CMAKE_CXX_COMPILER_LAUNCHER", "sccache");
        define(
            &mut defines,
            "LLVM_PARALLEL_COMPILE_JOBS",
            (num_cpus::get() * 10).to_string(),
        );
    }

    define(&mut defines, "LLVM_ENABLE_PROJECTS", join_sorted(&b.llvm_projects()));
    define(
        &mut defines,
        "LLVM_ENABLE_RUNTIMES",
        join_sorted(&b.llvm_runtime_projects(c)),
    );
    define(&mut defines, "LLVM_TARGETS_TO_BUILD", join_sorted(&b.llvm_targets(c)));
    if os.is_darwin() || os.is_linux() {
        define(&mut defines, "LLVM_BUILD_LLVM_DYLIB", "ON");
    } else if c.is_msvc() {
        define(&mut defines, "LLVM_BUILD_LLVM_C_DYLIB", "OFF");
    }

    define(&mut defines, "CLANG_VENDOR", clang_vendor(options));
    define(&mut defines, "LLVM_BUILD_RUNTIME", "ON");
    define(&mut defines, "LLVM_INCLUDE_GO_TESTS", "OFF");

    if os.is_darwin() {
        define(&mut defines, "HAVE_LIBCOMPRESSION", "1");
        define(&mut defines, "HAVE_FUTIMENS", "1");
        // Ad-hoc signing, mandatory for arm64 Darwin.
        define(&mut defines, "LLVM_CODESIGNING_IDENTITY", "-");
    }

    // Used by lld and lldb.
    if let Some(libxml2) = deps.libxml2 {
        define(&mut defines, "LIBXML2_INCLUDE_DIR", path_str(&libxml2.include_dir(cx)));
        define(&mut defines, "LIBXML2_LIBRARY", path_str(&primary_link_library(libxml2, cx)?));
    }

    if options.build_lldb {
        set_lldb_flags(deps, options, cx, c, &mut defines)?;
    }

    define(&mut defines, "CLANG_DEFAULT_LINKER", "lld");
    define(&mut defines, "CLANG_DEFAULT_OBJCOPY", "llvm-objcopy");

    if os.is_darwin() {
        define(&mut defines, "COMPILER_RT_ENABLE_IOS", "OFF");
        define(&mut defines, "COMPILER_RT_ENABLE_TVOS", "OFF");
        define(&mut defines, "COMPILER_RT_ENABLE_WATCHOS", "OFF");
        let mut runtimes_cmake_args = vec![
            format!("-DCMAKE_OSX_DEPLOYMENT_TARGET={MAC_MIN_VERSION}"),
            "-DCMAKE_OSX_ARCHITECTURES=arm64|x86_64".to_string(),
        ];
        runtimes_cmake_args.sort();
        define(&mut defines, "RUNTIMES_CMAKE_ARGS", runtimes_cmake_args.join(";"));
    }

    if os.is_linux() {
        set_runtime_flags(b, cx, c, &mut defines)?;
    }

    if options.enable_mlgo {
        let tensorflow = cx
            .orig_env
            .get("TENSORFLOW_INSTALL")
            .context("TENSORFLOW_INSTALL must be set for MLGO builds")?;
        define(&mut defines, "TENSORFLOW_AOT_PATH", tensorflow.clone());
        for (key, model) in [
            ("LLVM_INLINER_MODEL_PATH", "inlining-Oz-99f0063-v1.1"),
            ("LLVM_RAEVICT_MODEL_PATH", "regalloc-evict-e67430c-v1.0"),
        ] {
            let path = cx
                .paths
                .mlgo_model(model)
                .with_context(|| format!("MLGO model {model} not found"))?;
            define(&mut defines, key, path_str(&path));
        }
    }
    Ok(defines)
}

/// Copies the libraries (and, given `bin_dir`, tools) of the dependencies.
pub fn install_lib_deps<B: LlvmProject + ?Sized>(
    b: &B,
    cx: &Session,
    c: &Config,
    lib_dir: &Path,
    bin_dir: Option<&Path>,
) -> Result<()> {
    for lib in b.deps().shipped() {
        for lib_file in lib.install_libraries(cx)? {
            copy_into(&lib_file, lib_dir)?;
        }
        for link in lib.symlinks(cx) {
            let dest = lib_dir.join(link.file_name().unwrap_or_default());
            remove_file_if_exists(&dest)?;
            let target = fs::read_link(&link)
                .with_context(|| format!("Failed to read link {}", link.display()))?;
            symlink(&target, &dest)?;
        }
        if let Some(bin_dir) = bin_dir {
            for tool in lib.install_tools(cx) {
                copy_into(&tool, bin_dir)?;
            }
        }
    }

    if c.is_musl() {
        if let Some(sysroot) = c.sysroot(&cx.paths) {
            fs::copy(sysroot.join("lib/libc_musl.so"), lib_dir.join("libc_musl.so"))
                .context("Failed to copy libc_musl.so")?;
        }
    }
    Ok(())
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let dest = dir.join(file.file_name().unwrap_or_default());
    fs::copy(file, &dest)
        .with_context(|| format!("Failed to copy {} to {}", file.display(), dir.display()))?;
    Ok(())
}

/// Just-built tools run during the build and need their libraries next to
/// them (Linux only).
pub fn setup_build_dir<B: LlvmProject + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    if !c.os().is_linux() {
        return Ok(());
    }
    let output_dir = b.output_dir(cx, c);
    let lib_dir = output_dir.join("lib");
    let bin_dir = output_dir.join("bin");
    fs::create_dir_all(&lib_dir)?;
    fs::create_dir_all(&bin_dir)?;
    install_lib_deps(b, cx, c, &lib_dir, Some(&bin_dir))
}

/// Ships dependency libraries, and prebuilt python when lldb uses it.
pub fn setup_install_dir<B: LlvmProject + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    let install_dir = b.install_dir(cx, c)?;
    if b.options().swig_executable.is_some() {
        let python_src = cx.paths.python_dir(c.os())?;
        copy_tree(&python_src, &install_dir.join("python3"), true, PYTHON_IGNORES)?;
    }
    let lib_dir = install_dir.join(if c.os().is_windows() { "bin" } else { "lib" });
    fs::create_dir_all(&lib_dir)?;
    install_lib_deps(b, cx, c, &lib_dir, None)
}

pub fn project_build_config<B: LlvmProject + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    setup_build_dir(b, cx, c)?;
    cmake::build_config(b, cx, c)
}

pub fn project_install_config<B: LlvmProject + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    cmake::ninja_install(b, cx, c)?;
    setup_install_dir(b, cx, c)
}

/// [`super::build`], then the sccache statistics.
pub fn build_project<B: LlvmProject>(b: &B, cx: &Session) -> Result<bool> {
    let built = super::build(b, cx)?;
    if b.options().use_sccache {
        check_call(["sccache", "--show-stats"])?;
    }
    Ok(built)
}

pub fn installed_toolchain<B: LlvmProject + ?Sized>(b: &B, cx: &Session) -> Toolchain {
    Toolchain::new(
        project_install_dir(cx, b.name()),
        project_output_dir(cx, b.name()),
    )
}

/// Runs `checks` plus `check-cxx-<triple>` for every host runtime.
pub fn run_tests<B: LlvmProject + ?Sized>(
    b: &B,
    cx: &Session,
    c: &Config,
    label: &str,
    checks: &[&str],
    add_env: Option<&Env>,
) -> Result<()> {
    cx.timer.time(label, || {
        // Test tools like clang-query need libedit, libxml2 etc. in lib/.
        install_lib_deps(b, cx, c, &b.output_dir(cx, c).join("lib"), None)?;
        let mut targets: Vec<String> = checks.iter().map(|t| (*t).to_string()).collect();
        let mut triples: Vec<String> = runtime_configs(b, c).iter().map(Config::llvm_triple).collect();
        triples.sort();
        targets.extend(triples.iter().map(|t| format!("check-cxx-{t}")));
        cmake::ninja(b, cx, c, &targets, add_env)
    })
}
