//! Target configurations.
//!
//! A [`Config`] describes one (os, arch, libc) combination a builder compiles
//! for. Flags, sysroots and CMake defines are layered per target family:
//!
//! - every target except MSVC starts from the shared base layer
//!   (`-ffile-prefix-map`, `-B`/`-L` dirs, lld)
//! - glibc Linux and MinGW add the GCC prebuilt directories
//! - musl Linux extends glibc Linux and then replaces its GCC directories
//! - Android, Darwin, baremetal and MSVC each add their own layer

use crate::constants::MAC_MIN_VERSION;
use crate::hosts::{build_host, Arch, Host};
use crate::paths::Paths;
use crate::toolchain::Toolchain;
use crate::win_sdk;
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variables passed to a child process.
pub type Env = BTreeMap<String, String>;

/// `-D` definitions passed to CMake.
pub type Defines = BTreeMap<String, String>;

const LINUX_GCC: &str = "host/x86_64-linux-glibc2.17-4.8";
const MINGW_GCC: &str = "host/x86_64-w64-mingw32-4.8";
const GCC_VER: &str = "4.8.3";

/// Per-builder flavour of a config (exported symbols, shared vs static, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Default,
    Exported,
    Hidden,
    Shared,
    Static,
}

impl Variant {
    pub fn is_exported(self) -> bool {
        self == Variant::Exported
    }

    pub fn is_shared(self) -> bool {
        self == Variant::Shared
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Default => "default",
            Variant::Exported => "exported",
            Variant::Hidden => "hidden",
            Variant::Shared => "shared",
            Variant::Static => "static",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidTarget {
    pub arch: Arch,
    pub platform: bool,
    pub static_link: bool,
    pub suppress_libcxx_headers: bool,
    pub override_api_level: Option<u32>,
}

impl AndroidTarget {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            platform: false,
            static_link: false,
            suppress_libcxx_headers: false,
            override_api_level: None,
        }
    }

    pub fn api_level(&self) -> u32 {
        if let Some(level) = self.override_api_level {
            return level;
        }
        if self.arch == Arch::Riscv64 {
            return 10000;
        }
        // Platform runtimes may be used by apexes targeting 29.
        if self.static_link || self.platform {
            return 29;
        }
        if matches!(self.arch, Arch::Arm | Arch::I386) {
            19
        } else {
            21
        }
    }

    /// Triple without the API level.
    pub fn base_llvm_triple(&self) -> String {
        format!("{}-linux-android", self.arch.llvm_arch())
    }

    pub fn ndk_arch(&self) -> &'static str {
        match self.arch {
            Arch::Arm => "arm",
            Arch::Aarch64 => "arm64",
            Arch::I386 => "x86",
            Arch::Riscv64 => "riscv64",
            Arch::X86_64 => "x86_64",
        }
    }

    /// Triple naming the NDK sysroot library directory.
    pub fn ndk_sysroot_triple(&self) -> String {
        if self.arch == Arch::Arm {
            "arm-linux-androideabi".to_string()
        } else {
            self.base_llvm_triple()
        }
    }

    /// GCC prebuilt providing binutils for this arch, relative to the gcc root.
    fn gcc_toolchain_path(&self) -> Option<&'static str> {
        match self.arch {
            Arch::Arm => Some("arm/arm-linux-androideabi-4.9/arm-linux-androideabi"),
            Arch::Aarch64 => Some("aarch64/aarch64-linux-android-4.9/aarch64-linux-android"),
            Arch::I386 | Arch::X86_64 => Some("x86/x86_64-linux-android-4.9/x86_64-linux-android"),
            Arch::Riscv64 => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Baremetal { arch: Arch },
    Darwin,
    Linux { is_32_bit: bool },
    LinuxMusl { arch: Arch, is_cross_compiling: bool },
    MinGw { is_32_bit: bool },
    Msvc { sdk: PathBuf },
    Android(AndroidTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target: Target,
    pub variant: Variant,
}

impl From<Target> for Config {
    fn from(target: Target) -> Self {
        Config {
            target,
            variant: Variant::Default,
        }
    }
}

impl Config {
    pub fn new(target: Target) -> Self {
        target.into()
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn linux(is_32_bit: bool) -> Self {
        Target::Linux { is_32_bit }.into()
    }

    pub fn linux_musl(arch: Arch) -> Self {
        Target::LinuxMusl {
            arch,
            is_cross_compiling: true,
        }
        .into()
    }

    /// musl config that runs on the build machine.
    pub fn linux_musl_host(arch: Arch) -> Self {
        Target::LinuxMusl {
            arch,
            is_cross_compiling: false,
        }
        .into()
    }

    pub fn mingw(is_32_bit: bool) -> Self {
        Target::MinGw { is_32_bit }.into()
    }

    pub fn android(target: AndroidTarget) -> Self {
        Target::Android(target).into()
    }

    pub fn os(&self) -> Host {
        match self.target {
            Target::Baremetal { .. } => Host::Baremetal,
            Target::Darwin => Host::Darwin,
            Target::Linux { .. } | Target::LinuxMusl { .. } => Host::Linux,
            Target::MinGw { .. } | Target::Msvc { .. } => Host::Windows,
            Target::Android(_) => Host::Android,
        }
    }

    pub fn arch(&self) -> Arch {
        match &self.target {
            Target::Baremetal { arch } | Target::LinuxMusl { arch, .. } => *arch,
            Target::Android(android) => android.arch,
            Target::Linux { is_32_bit: true } | Target::MinGw { is_32_bit: true } => Arch::I386,
            Target::Darwin
            | Target::Linux { is_32_bit: false }
            | Target::MinGw { is_32_bit: false }
            | Target::Msvc { .. } => Arch::X86_64,
        }
    }

    pub fn android_target(&self) -> Option<&AndroidTarget> {
        match &self.target {
            Target::Android(android) => Some(android),
            _ => None,
        }
    }

    pub fn is_platform(&self) -> bool {
        self.android_target().is_some_and(|a| a.platform)
    }

    pub fn is_musl(&self) -> bool {
        matches!(self.target, Target::LinuxMusl { .. })
    }

    pub fn is_msvc(&self) -> bool {
        matches!(self.target, Target::Msvc { .. })
    }

    pub fn is_32_bit(&self) -> bool {
        match self.target {
            Target::Linux { is_32_bit } | Target::MinGw { is_32_bit } => is_32_bit,
            Target::LinuxMusl { arch, .. } => matches!(arch, Arch::Arm | Arch::I386),
            _ => !self.arch().is_64_bit(),
        }
    }

    pub fn is_cross_compiling(&self) -> bool {
        match self.target {
            Target::Darwin | Target::Linux { .. } => false,
            Target::LinuxMusl {
                is_cross_compiling, ..
            } => is_cross_compiling,
            Target::Baremetal { .. }
            | Target::MinGw { .. }
            | Target::Msvc { .. }
            | Target::Android(_) => true,
        }
    }

    /// Whether `-fuse-ld=lld` is passed. MSVC still links with lld-link.
    pub fn use_lld(&self) -> bool {
        !matches!(self.target, Target::Darwin | Target::Msvc { .. })
    }

    pub fn api_level(&self) -> Option<u32> {
        self.android_target().map(AndroidTarget::api_level)
    }

    pub fn llvm_triple(&self) -> String {
        match &self.target {
            Target::Baremetal { .. } => "aarch64-elf".to_string(),
            Target::Darwin => "arm64-apple-darwin".to_string(),
            Target::Linux { is_32_bit: true } => "i386-unknown-linux-gnu".to_string(),
            Target::Linux { is_32_bit: false } => "x86_64-unknown-linux-gnu".to_string(),
            Target::LinuxMusl { arch, .. } => {
                let mut triple = format!("{}-unknown-linux-musl", arch.llvm_arch());
                if *arch == Arch::Arm {
                    triple.push_str("eabihf");
                }
                triple
            }
            Target::MinGw { .. } => "x86_64-pc-windows-gnu".to_string(),
            Target::Msvc { .. } => "x86_64-pc-windows-msvc".to_string(),
            Target::Android(android) => {
                format!("{}{}", android.base_llvm_triple(), android.api_level())
            }
        }
    }

    fn gcc_root(&self, paths: &Paths) -> Option<PathBuf> {
        match self.target {
            Target::Linux { .. } => Some(paths.gcc_root().join(LINUX_GCC)),
            Target::MinGw { .. } => Some(paths.gcc_root().join(MINGW_GCC)),
            _ => None,
        }
    }

    fn gcc_triple(&self) -> &'static str {
        match self.target {
            Target::MinGw { .. } => "x86_64-w64-mingw32",
            _ => "x86_64-linux",
        }
    }

    /// `<gcc root>/<gcc triple>`: binutils, headers and target libraries.
    pub fn gcc_triple_dir(&self, paths: &Paths) -> Option<PathBuf> {
        self.gcc_root(paths).map(|root| root.join(self.gcc_triple()))
    }

    /// GCC's own runtime libraries (libgcc, crtbegin, ...).
    pub fn gcc_lib_dir(&self, paths: &Paths) -> Option<PathBuf> {
        self.gcc_root(paths)
            .map(|root| root.join("lib/gcc").join(self.gcc_triple()).join(GCC_VER))
    }

    pub fn sysroot(&self, paths: &Paths) -> Option<PathBuf> {
        match &self.target {
            Target::Linux { .. } => self.gcc_root(paths).map(|root| root.join("sysroot")),
            Target::LinuxMusl { .. } => Some(
                paths
                    .build_tools_dir()
                    .join("sysroots")
                    .join(self.llvm_triple()),
            ),
            Target::MinGw { .. } => Some(paths.sysroots().join(self.gcc_triple())),
            Target::Android(android) => {
                let platform_or_ndk = if android.platform { "platform" } else { "ndk" };
                Some(paths.sysroots().join(platform_or_ndk).join(android.ndk_arch()))
            }
            Target::Baremetal { .. } | Target::Darwin | Target::Msvc { .. } => None,
        }
    }

    /// Directories passed with `-B` in cflags.
    fn bin_dirs(&self, paths: &Paths) -> Vec<PathBuf> {
        match self.target {
            Target::Linux { .. } | Target::MinGw { .. } => self
                .gcc_root(paths)
                .map(|root| root.join(self.gcc_triple()).join("bin"))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Directories passed with `-B`/`-L` in ldflags.
    fn lib_dirs(&self, paths: &Paths) -> Vec<PathBuf> {
        let Target::Linux { is_32_bit } = self.target else {
            // musl has no gcc; MinGW copies these into its sysroot.
            return Vec::new();
        };
        let Some(root) = self.gcc_root(paths) else {
            return Vec::new();
        };
        let mut gcc_lib_dir = root.join("lib/gcc").join(self.gcc_triple()).join(GCC_VER);
        let builtin_dir = root.join(self.gcc_triple());
        if is_32_bit {
            gcc_lib_dir.push("32");
            vec![gcc_lib_dir, builtin_dir.join("lib32")]
        } else {
            vec![gcc_lib_dir, builtin_dir.join("lib64")]
        }
    }

    pub fn c_compiler(&self, toolchain: &Toolchain) -> PathBuf {
        if self.is_msvc() {
            toolchain.cl()
        } else {
            toolchain.cc()
        }
    }

    pub fn cxx_compiler(&self, toolchain: &Toolchain) -> PathBuf {
        if self.is_msvc() {
            toolchain.cl()
        } else {
            toolchain.cxx()
        }
    }

    pub fn linker(&self, toolchain: &Toolchain) -> Option<PathBuf> {
        if self.is_msvc() {
            Some(toolchain.lld_link())
        } else if self.use_lld() {
            Some(toolchain.lld())
        } else {
            None
        }
    }

    pub fn cflags(&self, paths: &Paths) -> Vec<String> {
        if let Target::Msvc { .. } = self.target {
            return vec![
                "-w".to_string(),
                "-fuse-ld=lld".to_string(),
                format!("--target={}", self.llvm_triple()),
                "-fms-compatibility-version=19.10".to_string(),
                "-D_HAS_EXCEPTIONS=1".to_string(),
                "-D_CRT_STDIO_ISO_WIDE_SPECIFIERS".to_string(),
            ];
        }

        let mut cflags = vec![format!("-ffile-prefix-map={}/=", paths.android_dir.display())];
        cflags.extend(self.bin_dirs(paths).iter().map(|d| format!("-B{}", d.display())));

        match &self.target {
            Target::Baremetal { .. } => cflags.push(format!("--target={}", self.llvm_triple())),
            Target::Darwin => cflags.push("-Werror=unguarded-availability".to_string()),
            Target::Linux { is_32_bit: true } => {
                // gwp_asan uses PRIu64 and friends from inttypes.h.
                cflags.push("-D__STDC_FORMAT_MACROS".to_string());
                cflags.push("-march=i686".to_string());
            }
            Target::LinuxMusl { arch, .. } => {
                cflags.push(format!("--target={}", self.llvm_triple()));
                cflags.push("-D_LIBCPP_HAS_MUSL_LIBC".to_string());
                // Neither clang nor musl pull this in implicitly.
                cflags.push("-include stdc-predef.h".to_string());
                if *arch == Arch::Arm {
                    cflags.push("-march=armv7-a".to_string());
                }
            }
            Target::MinGw { .. } => {
                cflags.push(format!("--target={}", self.llvm_triple()));
                cflags.extend(
                    [
                        "-D_LARGEFILE_SOURCE",
                        "-D_FILE_OFFSET_BITS=64",
                        "-D_WIN32_WINNT=0x0600",
                        "-DWINVER=0x0600",
                        "-D__MSVCRT_VERSION__=0x1400",
                    ]
                    .map(String::from),
                );
            }
            Target::Android(android) => {
                cflags.push(format!("--target={}", self.llvm_triple()));
                if let Some(toolchain_path) = android.gcc_toolchain_path() {
                    let bin = paths.gcc_root().join(toolchain_path).join("bin");
                    cflags.push(format!("-B{}", bin.display()));
                }
                cflags.push("-ffunction-sections".to_string());
                cflags.push("-fdata-sections".to_string());
                match android.arch {
                    Arch::Arm => cflags.push("-march=armv7-a".to_string()),
                    Arch::Aarch64 => cflags.push("-mbranch-protection=standard".to_string()),
                    Arch::Riscv64 => {
                        if let Some(sysroot) = self.sysroot(paths) {
                            cflags.push(format!(
                                "-isystem {}/usr/include/{}",
                                sysroot.display(),
                                android.ndk_sysroot_triple()
                            ));
                        }
                    }
                    Arch::I386 => cflags.push("-m32".to_string()),
                    Arch::X86_64 => {}
                }
            }
            Target::Linux { is_32_bit: false } | Target::Msvc { .. } => {}
        }
        cflags
    }

    pub fn cxxflags(&self, paths: &Paths) -> Vec<String> {
        let mut cxxflags = self.cflags(paths);
        match &self.target {
            Target::LinuxMusl { .. } => {
                // libc++ lets the "working CXX compiler" check pass without libstdc++.
                cxxflags.push("-stdlib=libc++".to_string());
                cxxflags.push("-Wno-unused-command-line-argument".to_string());
            }
            Target::Android(android) if android.platform => {
                // The NDK sysroot carries C++ headers; the platform one does not.
                cxxflags.push("-nostdinc++".to_string());
                if !android.suppress_libcxx_headers {
                    cxxflags.extend(
                        [
                            paths.clang_prebuilt_libcxx_headers(),
                            paths.bionic_headers(),
                            paths.bionic_kernel_headers(),
                        ]
                        .iter()
                        .map(|d| format!("-isystem {}", d.display())),
                    );
                }
            }
            _ => {}
        }
        cxxflags
    }

    pub fn ldflags(&self, paths: &Paths) -> Vec<String> {
        if let Target::Msvc { .. } = self.target {
            return ["/MANIFEST:NO", "/dynamicbase", "/nxcompat", "/highentropyva", "/Brepro"]
                .map(String::from)
                .to_vec();
        }

        let mut ldflags = Vec::new();
        for lib_dir in self.lib_dirs(paths) {
            ldflags.push(format!("-B{}", lib_dir.display()));
            ldflags.push(format!("-L{}", lib_dir.display()));
        }
        if self.use_lld() {
            ldflags.push("-fuse-ld=lld".to_string());
        }

        match &self.target {
            Target::Linux { .. } => ldflags.push("-Wl,--hash-style=both".to_string()),
            Target::LinuxMusl { .. } => {
                ldflags.push("-Wl,--hash-style=both".to_string());
                ldflags.push("-rtlib=compiler-rt".to_string());
                ldflags.push("-Wl,-z,stack-size=2097152".to_string());
            }
            Target::MinGw { .. } => {
                ldflags.extend(
                    [
                        "-Wl,--dynamicbase",
                        "-Wl,--nxcompat",
                        "-Wl,--high-entropy-va",
                        "-Wl,--Xlink=-Brepro",
                    ]
                    .map(String::from),
                );
            }
            Target::Android(android) => {
                ldflags.extend(
                    [
                        "-rtlib=compiler-rt",
                        "-Wl,-z,defs",
                        "-Wl,--gc-sections",
                        "-Wl,--build-id=sha1",
                        "-pie",
                    ]
                    .map(String::from),
                );
                if android.static_link {
                    ldflags.push("-static".to_string());
                }
            }
            Target::Baremetal { .. } | Target::Darwin | Target::Msvc { .. } => {}
        }
        ldflags
    }

    pub fn env(&self, paths: &Paths) -> Result<Env> {
        match &self.target {
            Target::Msvc { sdk } => win_sdk::env_settings(sdk),
            Target::LinuxMusl {
                is_cross_compiling: false,
                ..
            } => {
                let mut env = Env::new();
                if let Some(sysroot) = self.sysroot(paths) {
                    env.insert(
                        "LD_LIBRARY_PATH".to_string(),
                        sysroot.join("lib").display().to_string(),
                    );
                }
                Ok(env)
            }
            _ => Ok(Env::new()),
        }
    }

    /// Suffix of per-config output directories.
    pub fn output_suffix(&self) -> String {
        match &self.target {
            Target::LinuxMusl { .. } => format!("-{}", self.llvm_triple()),
            Target::Android(android) => {
                if android.platform {
                    format!("-{}", android.arch)
                } else {
                    format!("-{}-ndk-cxx", android.arch)
                }
            }
            _ => format!("-{}", self.os()),
        }
    }

    pub fn cmake_defines(&self) -> Defines {
        let mut defines = Defines::new();
        let mut set = |key: &str, value: &str| {
            defines.insert(key.to_string(), value.to_string());
        };
        match &self.target {
            Target::Baremetal { .. } => set("COMPILER_RT_BAREMETAL_BUILD", "ON"),
            Target::LinuxMusl { .. } => {
                set("LIBCXX_USE_COMPILER_RT", "TRUE");
                set("LIBCXXABI_USE_COMPILER_RT", "TRUE");
                set("LIBUNWIND_USE_COMPILER_RT", "TRUE");
                // The sysroot's empty libdl.a/libpthread.a/librt.a get
                // misdetected as real libraries.
                set("LIBCXX_HAS_RT_LIB", "FALSE");
                set("LIBCXX_HAS_PTHREAD_LIB", "FALSE");
                set("LIBCXXABI_HAS_PTHREAD_LIB", "FALSE");
                set("LIBUNWIND_HAS_DL_LIB", "FALSE");
                set("LIBUNWIND_HAS_PTHREAD_LIB", "FALSE");
                set("LLVM_DEFAULT_TARGET_TRIPLE", &self.llvm_triple());
            }
            Target::Msvc { .. } => {
                set("CMAKE_POLICY_DEFAULT_CMP0091", "NEW");
                set("CMAKE_MSVC_RUNTIME_LIBRARY", "MultiThreaded");
            }
            _ => {}
        }
        defines
    }

    /// Darwin-only flags applied by the autoconf and CMake layers.
    pub fn mac_min_version_flag() -> String {
        format!("-mmacosx-version-min={MAC_MIN_VERSION}")
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Baremetal { arch } => write!(f, "baremetal-{arch}"),
            Target::Darwin => f.write_str("darwin"),
            Target::Linux { is_32_bit } | Target::MinGw { is_32_bit } => {
                write!(f, "{}", self.os())?;
                if *is_32_bit {
                    f.write_str("-32")?;
                }
                Ok(())
            }
            Target::LinuxMusl { arch, .. } => write!(f, "linux-musl-{arch}"),
            Target::Msvc { .. } => f.write_str("windows-msvc"),
            Target::Android(android) => write!(
                f,
                "android-{} (platform={}, static={}, {})",
                android.arch, android.platform, android.static_link, self.variant
            ),
        }
    }
}

/// Config for the machine running the build.
pub fn host_config(host: Host, musl: bool) -> Result<Config> {
    Ok(match host {
        Host::Linux if musl => Config::linux_musl_host(Arch::X86_64),
        Host::Linux => Config::linux(false),
        Host::Darwin => Target::Darwin.into(),
        Host::Windows => Config::mingw(false),
        Host::Android | Host::Baremetal => bail!("{host} cannot host a build"),
    })
}

/// 32-bit companion of [`host_config`], used for host runtimes.
pub fn host_32bit_config(host: Host, musl: bool) -> Result<Config> {
    if host.is_darwin() {
        bail!("host_32bit config only needed for Windows or Linux");
    }
    Ok(if musl {
        Config::linux_musl_host(Arch::I386)
    } else if host.is_windows() {
        Config::mingw(true)
    } else {
        Config::linux(true)
    })
}

/// [`host_config`] for the current machine.
pub fn build_host_config(musl: bool) -> Result<Config> {
    host_config(build_host(), musl)
}

#[derive(Debug, Clone, Copy)]
pub struct AndroidOptions {
    pub platform: bool,
    pub static_link: bool,
    pub suppress_libcxx_headers: bool,
    pub variant: Variant,
}

impl Default for AndroidOptions {
    fn default() -> Self {
        Self {
            platform: true,
            static_link: false,
            suppress_libcxx_headers: false,
            variant: Variant::Default,
        }
    }
}

impl AndroidOptions {
    pub fn ndk() -> Self {
        Self {
            platform: false,
            ..Self::default()
        }
    }

    pub fn platform() -> Self {
        Self::default()
    }

    pub fn variant(self, variant: Variant) -> Self {
        Self { variant, ..self }
    }
}

/// Android configs for every arch. riscv64 has no NDK, so it is platform-only.
pub fn android_configs(options: AndroidOptions) -> Vec<Config> {
    let mut arches = vec![Arch::Arm, Arch::Aarch64, Arch::I386, Arch::X86_64];
    if options.platform {
        arches.push(Arch::Riscv64);
    }
    arches
        .into_iter()
        .map(|arch| {
            Config::android(AndroidTarget {
                platform: options.platform,
                static_link: options.static_link,
                suppress_libcxx_headers: options.suppress_libcxx_headers,
                ..AndroidTarget::new(arch)
            })
            .with_variant(options.variant)
        })
        .collect()
}

pub fn android_ndk_tsan_configs() -> Vec<Config> {
    [Arch::Aarch64, Arch::X86_64]
        .into_iter()
        .map(|arch| {
            Config::android(AndroidTarget {
                override_api_level: Some(24),
                ..AndroidTarget::new(arch)
            })
        })
        .collect()
}

/// Joins flags the way they are handed to CMake and configure.
pub fn join_flags(flags: &[String]) -> String {
    flags.join(" ")
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Paths {
        Paths::new(
            PathBuf::from("/android"),
            PathBuf::from("/android/out"),
            PathBuf::from("/android/out/dist"),
            Host::Linux,
        )
        .unwrap()
    }

    fn android(arch: Arch, platform: bool) -> Config {
        Config::android(AndroidTarget {
            platform,
            ..AndroidTarget::new(arch)
        })
    }

    #[test]
    fn test_triples() {
        assert_eq!(Config::linux(false).llvm_triple(), "x86_64-unknown-linux-gnu");
        assert_eq!(Config::linux(true).llvm_triple(), "i386-unknown-linux-gnu");
        assert_eq!(
            Config::linux_musl(Arch::Arm).llvm_triple(),
            "arm-unknown-linux-musleabihf"
        );
        assert_eq!(
            Config::linux_musl(Arch::I386).llvm_triple(),
            "i686-unknown-linux-musl"
        );
        assert_eq!(android(Arch::Arm, false).llvm_triple(), "arm-linux-android19");
        assert_eq!(android(Arch::Aarch64, false).llvm_triple(), "aarch64-linux-android21");
        assert_eq!(android(Arch::Aarch64, true).llvm_triple(), "aarch64-linux-android29");
        assert_eq!(
            android(Arch::Riscv64, true).llvm_triple(),
            "riscv64-linux-android10000"
        );
        let msvc = Config::new(Target::Msvc {
            sdk: PathBuf::from("/sdk"),
        });
        assert_eq!(msvc.llvm_triple(), "x86_64-pc-windows-msvc");
    }

    #[test]
    fn test_api_level_override() {
        let configs = android_ndk_tsan_configs();
        assert_eq!(configs.len(), 2);
        assert!(configs.iter().all(|c| c.api_level() == Some(24)));
        assert_eq!(configs[0].llvm_triple(), "aarch64-linux-android24");
    }

    #[test]
    fn test_android_configs() {
        let platform = android_configs(AndroidOptions::platform());
        assert_eq!(platform.len(), 5);
        assert!(platform.iter().any(|c| c.arch() == Arch::Riscv64));

        let ndk = android_configs(AndroidOptions::ndk().variant(Variant::Shared));
        assert_eq!(ndk.len(), 4);
        assert!(ndk.iter().all(|c| c.variant.is_shared() && !c.is_platform()));
    }

    #[test]
    fn test_android_flags() {
        let paths = paths();
        let arm = android(Arch::Arm, false);
        let cflags = arm.cflags(&paths);
        assert_eq!(cflags[0], "-ffile-prefix-map=/android/=");
        assert!(cflags.contains(&"--target=arm-linux-android19".to_string()));
        assert!(cflags.contains(
            &"-B/android/prebuilts/gcc/linux-x86/arm/arm-linux-androideabi-4.9/arm-linux-androideabi/bin"
                .to_string()
        ));
        assert_eq!(cflags.last().unwrap(), "-march=armv7-a");

        let ldflags = arm.ldflags(&paths);
        assert_eq!(
            ldflags,
            vec![
                "-fuse-ld=lld",
                "-rtlib=compiler-rt",
                "-Wl,-z,defs",
                "-Wl,--gc-sections",
                "-Wl,--build-id=sha1",
                "-pie",
            ]
        );
        assert_eq!(arm.output_suffix(), "-arm-ndk-cxx");
        assert_eq!(
            arm.sysroot(&paths),
            Some(PathBuf::from("/android/out/sysroots/ndk/arm"))
        );

        let riscv = android(Arch::Riscv64, true);
        assert!(riscv.cflags(&paths).contains(
            &"-isystem /android/out/sysroots/platform/riscv64/usr/include/riscv64-linux-android"
                .to_string()
        ));
        assert_eq!(riscv.output_suffix(), "-riscv64");
    }

    #[test]
    fn test_platform_cxxflags() {
        let paths = paths();
        let cxxflags = android(Arch::X86_64, true).cxxflags(&paths);
        assert!(cxxflags.contains(&"-nostdinc++".to_string()));
        assert!(cxxflags.contains(&"-isystem /android/bionic/libc/include".to_string()));

        let suppressed = Config::android(AndroidTarget {
            platform: true,
            suppress_libcxx_headers: true,
            ..AndroidTarget::new(Arch::X86_64)
        });
        let cxxflags = suppressed.cxxflags(&paths);
        assert!(cxxflags.contains(&"-nostdinc++".to_string()));
        assert!(!cxxflags.iter().any(|f| f.starts_with("-isystem")));
    }

    #[test]
    fn test_linux_flags() {
        let paths = paths();
        let linux = Config::linux(false);
        let gcc = "/android/prebuilts/gcc/linux-x86/host/x86_64-linux-glibc2.17-4.8";
        assert_eq!(
            linux.cflags(&paths),
            vec![
                "-ffile-prefix-map=/android/=".to_string(),
                format!("-B{gcc}/x86_64-linux/bin"),
            ]
        );
        assert_eq!(
            linux.ldflags(&paths),
            vec![
                format!("-B{gcc}/lib/gcc/x86_64-linux/4.8.3"),
                format!("-L{gcc}/lib/gcc/x86_64-linux/4.8.3"),
                format!("-B{gcc}/x86_64-linux/lib64"),
                format!("-L{gcc}/x86_64-linux/lib64"),
                "-fuse-ld=lld".to_string(),
                "-Wl,--hash-style=both".to_string(),
            ]
        );
        assert_eq!(linux.sysroot(&paths), Some(PathBuf::from(format!("{gcc}/sysroot"))));
        assert!(!linux.is_cross_compiling());

        let linux32 = Config::linux(true);
        assert!(linux32.cflags(&paths).contains(&"-march=i686".to_string()));
        assert!(linux32
            .ldflags(&paths)
            .contains(&format!("-L{gcc}/lib/gcc/x86_64-linux/4.8.3/32")));
    }

    #[test]
    fn test_musl_host() {
        let paths = paths();
        let musl = host_config(Host::Linux, true).unwrap();
        assert!(musl.is_musl());
        assert!(!musl.is_cross_compiling());
        assert_eq!(musl.output_suffix(), "-x86_64-unknown-linux-musl");
        let env = musl.env(&paths).unwrap();
        assert_eq!(
            env["LD_LIBRARY_PATH"],
            "/android/prebuilts/build-tools/sysroots/x86_64-unknown-linux-musl/lib"
        );
        let defines = musl.cmake_defines();
        assert_eq!(defines["LIBCXX_HAS_PTHREAD_LIB"], "FALSE");
        assert_eq!(defines["LLVM_DEFAULT_TARGET_TRIPLE"], "x86_64-unknown-linux-musl");
        let cxxflags = musl.cxxflags(&paths);
        assert!(cxxflags.contains(&"-stdlib=libc++".to_string()));
        assert!(cxxflags.contains(&"-include stdc-predef.h".to_string()));
    }

    #[test]
    fn test_host_configs() {
        assert_eq!(host_config(Host::Darwin, false).unwrap().to_string(), "darwin");
        assert_eq!(host_config(Host::Windows, false).unwrap().output_suffix(), "-windows");
        assert!(host_32bit_config(Host::Darwin, false).is_err());
        assert_eq!(
            host_32bit_config(Host::Linux, true).unwrap().llvm_triple(),
            "i686-unknown-linux-musl"
        );
        assert!(host_config(Host::Android, false).is_err());
    }

    #[test]
    fn test_msvc_flags() {
        let paths = paths();
        let msvc = Config::new(Target::Msvc {
            sdk: PathBuf::from("/sdk"),
        });
        assert!(msvc.cflags(&paths).contains(&"--target=x86_64-pc-windows-msvc".to_string()));
        assert_eq!(msvc.ldflags(&paths)[0], "/MANIFEST:NO");
        assert!(msvc.is_cross_compiling());
        assert!(!msvc.use_lld());
        assert_eq!(msvc.cmake_defines()["CMAKE_MSVC_RUNTIME_LIBRARY"], "MultiThreaded");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            android(Arch::Aarch64, true)
                .with_variant(Variant::Exported)
                .to_string(),
            "android-aarch64 (platform=true, static=false, exported)"
        );
        assert_eq!(Config::linux_musl(Arch::Arm).to_string(), "linux-musl-arm");
        assert_eq!(Config::mingw(true).to_string(), "windows-32");
    }
}
