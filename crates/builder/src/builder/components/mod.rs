//! Concrete builders.
//!
//! Each module holds one builder (or a small family sharing a source tree).
//! Builders that need nothing from the caller are unit structs; the rest
//! hold their options and references to the libraries they link.

pub mod builtins;
pub mod compiler_rt;
pub mod libcxx;
pub mod libomp;
pub mod libraries;
pub mod libunwind;
pub mod lldb_server;
pub mod musl_runtime;
pub mod sanitizer_mapfile;
pub mod stage1;
pub mod stage2;
pub mod sysroots;
pub mod windows;
