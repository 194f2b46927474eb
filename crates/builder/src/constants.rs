//! Fixed versions and target sets.

pub const MAC_MIN_VERSION: &str = "10.14";

/// Prebuilt clang used to bootstrap stage1.
pub const CLANG_PREBUILT_VERSION: &str = "clang-r487747";

pub const NDK_VERSION: &str = "r25";

pub const HOST_TARGETS: &[&str] = &["X86"];
pub const DARWIN_HOST_TARGETS: &[&str] = &["AArch64", "X86"];

pub const ANDROID_TARGETS: &[&str] = &["AArch64", "ARM", "BPF", "RISCV", "WebAssembly", "X86"];

pub const CLANG_REPOSITORY: &str = "https://android.googlesource.com/toolchain/llvm-project";
pub const BUG_REPORT_URL: &str = "https://github.com/android-ndk/ndk/issues";
pub const UPSTREAM_LLVM_URL: &str = "https://github.com/llvm/llvm-project.git";
