//! Build hosts and target architectures.

use anyhow::{anyhow, bail, Result};
use std::fmt;

/// Operating systems a configuration can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Host {
    Darwin,
    Linux,
    Windows,
    Android,
    Baremetal,
}

impl Host {
    pub fn value(self) -> &'static str {
        match self {
            Host::Darwin => "darwin",
            Host::Linux => "linux",
            Host::Windows => "windows",
            Host::Android => "android",
            Host::Baremetal => "baremetal",
        }
    }

    /// `linux` -> `Linux`, as CMake spells `CMAKE_SYSTEM_NAME`.
    pub fn capitalized(self) -> String {
        let value = self.value();
        let mut chars = value.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn is_darwin(self) -> bool {
        self == Host::Darwin
    }

    pub fn is_linux(self) -> bool {
        self == Host::Linux
    }

    pub fn is_windows(self) -> bool {
        self == Host::Windows
    }

    pub fn is_android(self) -> bool {
        self == Host::Android
    }

    /// Prebuilts directory tag, e.g. `linux-x86`.
    pub fn os_tag(self) -> Result<&'static str> {
        match self {
            Host::Darwin => Ok("darwin-x86"),
            Host::Linux => Ok("linux-x86"),
            Host::Windows => Ok("windows-x86"),
            Host::Android | Host::Baremetal => bail!("no prebuilts os tag for {self}"),
        }
    }

    /// Same as [`Host::os_tag`], but Linux prefers the musl prebuilts.
    pub fn os_tag_musl(self) -> Result<&'static str> {
        if self == Host::Linux {
            Ok("linux_musl-x86")
        } else {
            self.os_tag()
        }
    }

    /// Subdirectory of the clang resource `lib/` holding runtimes.
    pub fn crt_dir(self) -> Result<&'static str> {
        match self {
            Host::Android | Host::Linux => Ok("linux"),
            Host::Baremetal => Ok("baremetal"),
            Host::Darwin | Host::Windows => bail!("no runtime directory for {self}"),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Host matching the machine running the build.
pub fn build_host() -> Host {
    if cfg!(target_os = "macos") {
        Host::Darwin
    } else if cfg!(windows) {
        Host::Windows
    } else {
        Host::Linux
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    Arm,
    Aarch64,
    I386,
    X86_64,
    Riscv64,
}

impl Arch {
    pub const ALL: [Arch; 5] = [
        Arch::Arm,
        Arch::Aarch64,
        Arch::I386,
        Arch::X86_64,
        Arch::Riscv64,
    ];

    pub fn value(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Aarch64 => "aarch64",
            Arch::I386 => "i386",
            Arch::X86_64 => "x86_64",
            Arch::Riscv64 => "riscv64",
        }
    }

    /// Architecture component of an LLVM triple.
    pub fn llvm_arch(self) -> &'static str {
        match self {
            Arch::I386 => "i686",
            other => other.value(),
        }
    }

    pub fn is_64_bit(self) -> bool {
        matches!(self, Arch::Aarch64 | Arch::X86_64 | Arch::Riscv64)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl TryFrom<&str> for Arch {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.value() == value)
            .ok_or_else(|| anyhow!("unknown arch: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_tags() {
        assert_eq!(Host::Linux.os_tag().unwrap(), "linux-x86");
        assert_eq!(Host::Linux.os_tag_musl().unwrap(), "linux_musl-x86");
        assert_eq!(Host::Darwin.os_tag_musl().unwrap(), "darwin-x86");
        assert!(Host::Android.os_tag().is_err());
    }

    #[test]
    fn test_crt_dir() {
        assert_eq!(Host::Android.crt_dir().unwrap(), "linux");
        assert_eq!(Host::Baremetal.crt_dir().unwrap(), "baremetal");
        assert!(Host::Windows.crt_dir().is_err());
    }

    #[test]
    fn test_arch_names() {
        assert_eq!(Arch::I386.llvm_arch(), "i686");
        assert_eq!(Arch::Aarch64.llvm_arch(), "aarch64");
        assert_eq!(Arch::try_from("riscv64").unwrap(), Arch::Riscv64);
        assert!(Arch::try_from("mips").is_err());
        assert_eq!(Host::Linux.capitalized(), "Linux");
    }
}
