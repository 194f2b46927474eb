//! # build-toolchain
//!
//! Builds the Android clang/LLVM toolchain.
//!
//! ## Usage
//!
//! ```bash
//! build-toolchain build                 # stage1, stage2, runtimes, Windows, package
//! build-toolchain build --no-build windows,lldb --skip-tests
//! build-toolchain build --build stage2 --skip-source-setup
//! build-toolchain build -sp             # build only, same as --skip-package
//! build-toolchain doctor                # check tools and prebuilts
//! build-toolchain configs               # print the target configs
//! ```
//!
//! Paths come from `toolchain-builder.toml`, overridden by `OUT_DIR` and
//! `DIST_DIR`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use toolchain_builder::config::{
    android_configs, android_ndk_tsan_configs, host_32bit_config, host_config, AndroidOptions, Config,
};
use toolchain_builder::hosts::build_host;
use toolchain_builder::orchestration::{self, BuildArgs};
use toolchain_builder::paths::Paths;
use toolchain_builder::settings::Settings;
use toolchain_builder::{doctor, hosts};

#[derive(Parser)]
#[command(name = "build-toolchain", about = "Android LLVM toolchain builder")]
struct Cli {
    /// Debug logging, including every command run
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and package the toolchain
    Build(BuildArgs),
    /// Check that the tools and prebuilts the build needs are present
    Doctor,
    /// Print the target configs for this host
    Configs,
}

fn print_configs(title: &str, configs: &[Config]) {
    println!("=== {title} ===");
    for config in configs {
        println!("  {:<36} {:<10} {}", config.llvm_triple(), config.os().value(), config.output_suffix());
    }
}

fn configs(host: hosts::Host) -> Result<()> {
    let mut host_configs = vec![host_config(host, false)?];
    if host.is_linux() {
        host_configs.push(host_32bit_config(host, false)?);
        host_configs.push(host_config(host, true)?);
        host_configs.push(host_32bit_config(host, true)?);
        host_configs.push(Config::mingw(false));
    }
    print_configs("Host", &host_configs);
    print_configs("Android NDK", &android_configs(AndroidOptions::ndk()));
    print_configs("Android platform", &android_configs(AndroidOptions::platform()));
    print_configs("Android NDK tsan", &android_ndk_tsan_configs());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(orchestration::expand_short_flags(std::env::args()));
    let settings = Settings::load()?;

    let log_level = if cli.verbose || settings.build.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder().filter_level(log_level).init();

    match cli.command {
        Command::Build(args) => orchestration::run(&args, &settings)?,
        Command::Doctor => {
            let paths = Paths::new(
                settings.android_dir.clone(),
                settings.out_dir(),
                settings.dist_dir(),
                build_host(),
            )?;
            doctor::run(&paths)?;
        }
        Command::Configs => configs(build_host())?,
    }

    Ok(())
}
