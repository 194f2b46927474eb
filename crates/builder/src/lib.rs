//! # Android LLVM toolchain builder
//!
//! Builds a multi-stage clang/LLVM toolchain for Android: a stage1 compiler
//! built with the checked-in prebuilt, a stage2 compiler built with stage1,
//! device runtimes built with stage2, an optional Windows cross toolchain, and
//! finally a packaged, stripped distribution.
//!
//! ## Layout
//!
//! - [`hosts`], [`config`] - operating systems, architectures and target configs
//! - [`paths`], [`toolchain`], [`settings`] - where things live
//! - [`builder`] - the builder framework and every concrete builder
//! - [`orchestration`] - the end-to-end build flow
//! - [`package`] - turning an install tree into a distributable toolchain

pub mod android_version;
pub mod builder;
pub mod config;
pub mod constants;
pub mod doctor;
pub mod fs_util;
pub mod hosts;
pub mod mapfile;
pub mod orchestration;
pub mod package;
pub mod paths;
pub mod process;
pub mod profiles;
pub mod session;
pub mod settings;
pub mod source;
pub mod timer;
pub mod toolchain;
pub mod version;
pub mod win_sdk;
