//! The end-to-end build: sources, stage1, stage2, runtimes, Windows,
//! tests and packaging.

use crate::android_version::AndroidVersion;
use crate::builder;
use crate::builder::cmake::CMakeBuilder;
use crate::builder::components::builtins::Builtins;
use crate::builder::components::compiler_rt::{CompilerRt, Tsan};
use crate::builder::components::libcxx::LibCxx;
use crate::builder::components::libomp::LibOmp;
use crate::builder::components::libraries::{LibEdit, LibNcurses, LibXml2, Swig, Xz, Zstd};
use crate::builder::components::libunwind::LibUnwind;
use crate::builder::components::lldb_server::LldbServer;
use crate::builder::components::musl_runtime::MuslHostRuntime;
use crate::builder::components::sanitizer_mapfile::SanitizerMapFile;
use crate::builder::components::stage1::Stage1;
use crate::builder::components::stage2::Stage2;
use crate::builder::components::sysroots::{DeviceSysroots, HostSysroots, PlatformLibcxxAbi};
use crate::builder::components::windows::WindowsToolchain;
use crate::builder::lib_info::LibInfo;
use crate::builder::llvm::{self, LlvmDeps, LlvmOptions};
use crate::config::{host_32bit_config, host_config, Config, Target};
use crate::fs_util::remove_dir_if_exists;
use crate::hosts::{build_host, Host};
use crate::package::{self, links, PackageOptions};
use crate::paths::Paths;
use crate::profiles::{self, Profiles};
use crate::session::Session;
use crate::settings::Settings;
use crate::source;
use crate::toolchain::Toolchain;
use crate::win_sdk::WinSdk;
use anyhow::{Context, Result};
use clap::{ArgGroup, Args, ValueEnum};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

/// Parts of the build `--no-build` can leave out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Component {
    #[value(name = "linux")]
    Linux,
    #[value(name = "windows")]
    Windows,
    #[value(name = "lldb")]
    Lldb,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("lto_mode").args(["lto", "no_lto"])))]
#[command(group(ArgGroup::new("bolt_mode").args(["bolt", "no_bolt", "bolt_instrument"])))]
#[command(group(ArgGroup::new("pgo_mode").args(["pgo", "no_pgo"])))]
#[command(group(ArgGroup::new("musl_mode").args(["musl", "no_musl"])))]
#[command(group(ArgGroup::new("build_or_package").args(["skip_build", "skip_package"])))]
pub struct BuildArgs {
    /// Release name for the package (defaults to the settings file)
    #[arg(long)]
    pub build_name: Option<String>,

    /// Enable assertions (only affects stage2)
    #[arg(long)]
    pub enable_assertions: bool,

    /// Enable LTO (only affects stage2). Increases build time.
    #[arg(long)]
    pub lto: bool,

    #[arg(long)]
    pub no_lto: bool,

    /// Enable BOLT optimization (only affects stage2)
    #[arg(long)]
    pub bolt: bool,

    #[arg(long)]
    pub no_bolt: bool,

    /// Enable BOLT instrumentation (only affects stage2)
    #[arg(long)]
    pub bolt_instrument: bool,

    /// Enable PGO (only affects stage2)
    #[arg(long)]
    pub pgo: bool,

    #[arg(long)]
    pub no_pgo: bool,

    /// Build debuggable clang and LLVM tools (only affects stage2)
    #[arg(long)]
    pub debug: bool,

    /// Build LLVM tools with PGO instrumentation
    #[arg(long)]
    pub build_instrumented: bool,

    /// Skip the build, and only do the packaging step
    #[arg(long, visible_alias = "sb")]
    pub skip_build: bool,

    /// Skip the packaging, and only do the build step
    #[arg(long, visible_alias = "sp")]
    pub skip_package: bool,

    /// Reuse out/llvm-project as is
    #[arg(long)]
    pub skip_source_setup: bool,

    /// Build a vanilla upstream tree
    #[arg(long)]
    pub skip_apply_patches: bool,

    /// Create a tar archive of the toolchains
    #[arg(long)]
    pub create_tar: bool,

    /// Don't strip binaries and libraries
    #[arg(long)]
    pub no_strip: bool,

    /// Run tests in stage1, with clang-tools-extra
    #[arg(long, overrides_with = "no_run_tests_stage1")]
    pub run_tests_stage1: bool,

    #[arg(long, overrides_with = "run_tests_stage1")]
    pub no_run_tests_stage1: bool,

    /// Skip clang/llvm check tests after stage1 and stage2
    #[arg(long)]
    pub skip_tests: bool,

    /// Builders to build; every other builder is skipped
    #[arg(long, num_args = 1.., conflicts_with = "skip")]
    pub build: Vec<String>,

    /// Builders to skip
    #[arg(long, num_args = 1..)]
    pub skip: Vec<String>,

    /// Skip stage1 and use the prebuilt instead
    #[arg(long)]
    pub single_stage: bool,

    /// Build with MLGO support
    #[arg(long)]
    pub mlgo: bool,

    /// Skip the runtime libraries
    #[arg(long)]
    pub skip_runtimes: bool,

    /// Components or platforms not to build
    #[arg(long, value_enum, value_delimiter = ',')]
    pub no_build: Vec<Component>,

    /// Build TOT LLVM
    #[arg(long)]
    pub build_llvm_next: bool,

    /// Fetch this upstream revision instead of toolchain/llvm-project
    #[arg(long)]
    pub llvm_rev: Option<String>,

    /// Windows SDK to use instead of MinGW
    #[arg(long)]
    pub windows_sdk: Option<PathBuf>,

    /// Build against musl libc
    #[arg(long)]
    pub musl: bool,

    #[arg(long)]
    pub no_musl: bool,

    /// Use sccache (development builds only)
    #[arg(long)]
    pub sccache: bool,
}

/// Steps derived from [`BuildArgs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub bolt: bool,
    pub bolt_instrument: bool,
    pub runtimes: bool,
    pub package: bool,
    pub strip: bool,
    pub strip_host_package: bool,
    pub build_lldb: bool,
    pub need_host: bool,
    pub need_windows: bool,
    pub instrumented: bool,
}

impl BuildArgs {
    fn skips(&self, component: Component) -> bool {
        self.no_build.contains(&component)
    }

    pub fn plan(&self, host: Host) -> Plan {
        let optimizable = !self.debug && !self.build_instrumented;
        let strip = !self.no_strip;
        Plan {
            bolt: self.bolt && optimizable,
            bolt_instrument: self.bolt_instrument && optimizable,
            runtimes: !self.skip_runtimes,
            package: !self.skip_package,
            strip,
            strip_host_package: strip && !self.debug && !self.build_llvm_next,
            build_lldb: !self.skips(Component::Lldb),
            need_host: host.is_darwin() || !self.skips(Component::Linux),
            need_windows: host.is_linux() && !self.skips(Component::Windows),
            instrumented: host.is_linux() && self.build_instrumented,
        }
    }
}

fn configure_registry(cx: &mut Session, args: &BuildArgs) {
    let registry = &mut cx.registry;
    if args.skip_build {
        registry.add_filter(|_| false);
    } else if !args.skip.is_empty() {
        registry.add_skips(args.skip.iter().cloned());
    } else if !args.build.is_empty() {
        registry.add_builds(args.build.iter().cloned());
    }
    if args.single_stage {
        registry.add_skips(["stage1"]);
    }
}

/// Device runtimes, built with and installed into the output toolchain.
fn build_runtimes(cx: &Session, build_lldb_server: bool, host: &Config, host_32bit: &Config) -> Result<()> {
    builder::build(&DeviceSysroots, cx)?;
    builder::build(&Builtins, cx)?;
    builder::build(&LibUnwind { enable_assertions: false }, cx)?;
    builder::build(&PlatformLibcxxAbi, cx)?;
    builder::build(&CompilerRt, cx)?;
    builder::build(&Tsan, cx)?;
    if cx.paths.build_host.is_linux() {
        links::add_lib_links(&cx.paths.out_dir, "stage2", host)?;
        links::add_lib_links(&cx.paths.out_dir, "stage2", host_32bit)?;
        links::add_header_links(&cx.paths.out_dir, "stage2", host)?;
        builder::build(&MuslHostRuntime { enable_assertions: false }, cx)?;
    }
    builder::build(&LibOmp, cx)?;
    if build_lldb_server {
        builder::build(&LldbServer, cx)?;
    }
    builder::build(&SanitizerMapFile, cx)?;
    Ok(())
}

fn llvm_options(cx: &Session, build_name: &str, args: &BuildArgs, build_lldb: bool) -> LlvmOptions {
    LlvmOptions {
        build_name: build_name.to_string(),
        svn_revision: cx.android_version.svn_revision().to_string(),
        enable_mlgo: args.mlgo,
        build_lldb,
        ..LlvmOptions::default()
    }
}

/// sccache is only used for stage1.
fn stage1_options(cx: &Session, args: &BuildArgs, build_lldb: bool) -> LlvmOptions {
    LlvmOptions {
        use_sccache: args.sccache,
        ..llvm_options(cx, "stage1", args, build_lldb)
    }
}

fn stage2_options(
    cx: &Session,
    build_name: &str,
    args: &BuildArgs,
    build_lldb: bool,
    profiles: &Profiles,
    swig_executable: Option<PathBuf>,
) -> LlvmOptions {
    LlvmOptions {
        build_tags: stage2_tags(profiles, args.build_llvm_next),
        enable_assertions: args.enable_assertions,
        build_32bit_runtimes: cx.paths.build_host.is_linux(),
        swig_executable,
        ..llvm_options(cx, build_name, args, build_lldb)
    }
}

/// Version string annotations for stage2.
pub fn stage2_tags(profiles: &Profiles, llvm_next: bool) -> Vec<String> {
    let mut tags = Vec::new();
    if profiles.pgo.is_none() {
        tags.push("NO PGO PROFILE".to_string());
    }
    if profiles.clang_bolt.is_none() {
        tags.push("NO BOLT PROFILE".to_string());
    }
    if llvm_next {
        tags.push("ANDROID_LLVM_NEXT".to_string());
    }
    tags
}

/// Libraries of one platform linked into an llvm build.
struct PlatformLibs {
    zstd: Zstd,
    libxml2: LibXml2,
    xz: Xz,
    libncurses: LibNcurses,
}

impl PlatformLibs {
    fn new(config: &Config) -> Self {
        Self {
            zstd: Zstd { config: config.clone() },
            libxml2: LibXml2 { config: config.clone() },
            xz: Xz { config: config.clone() },
            libncurses: LibNcurses { config: config.clone() },
        }
    }
}

fn lldb_dep<'a>(build_lldb: bool, lib: &'a dyn LibInfo) -> Option<&'a dyn LibInfo> {
    build_lldb.then_some(lib)
}

/// Runs the whole build. `build_times.txt` is written to the dist dir even
/// when a step fails.
pub fn run(args: &BuildArgs, settings: &Settings) -> Result<()> {
    let host = build_host();
    let paths = Paths::new(
        settings.android_dir.clone(),
        settings.out_dir(),
        settings.dist_dir(),
        host,
    )?;
    let mut cx = Session::new(paths, AndroidVersion::new(args.build_llvm_next));
    configure_registry(&mut cx, args);

    let result = run_steps(&mut cx, args, settings);
    finish(&cx, result)
}

fn write_build_times(cx: &Session) -> Result<()> {
    let dist_dir = &cx.paths.dist_dir;
    fs::create_dir_all(dist_dir)
        .with_context(|| format!("Failed to create {}", dist_dir.display()))?;
    cx.timer.report_to_file(&dist_dir.join("build_times.txt"))
}

/// Reports the step times, then hands back the build's own result.
fn finish(cx: &Session, result: Result<()>) -> Result<()> {
    if let Err(err) = write_build_times(cx) {
        warn!("Failed to write build times: {err:#}");
    }
    result
}

/// Rewrites the single-dash `-sb` and `-sp` spellings of the skip flags,
/// which clap would read as bundled short flags.
pub fn expand_short_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| match arg.as_str() {
            "-sb" => "--skip-build".to_string(),
            "-sp" => "--skip-package".to_string(),
            _ => arg,
        })
        .collect()
}

fn run_steps(cx: &mut Session, args: &BuildArgs, settings: &Settings) -> Result<()> {
    let host = cx.paths.build_host;
    let plan = args.plan(host);
    let musl = args.musl && !args.no_musl;
    let build_name = args.build_name.as_deref().unwrap_or(&settings.build.build_name);
    let host_cfg = host_config(host, musl)?;

    info!(
        "do_build={} do_stage1={} do_stage2={} do_runtimes={} do_package={} need_windows={} lto={} bolt={} musl={}",
        !args.skip_build,
        cx.registry.should_build("stage1"),
        cx.registry.should_build("stage2"),
        plan.runtimes,
        plan.package,
        plan.need_windows,
        args.lto,
        args.bolt,
        musl
    );

    if !args.skip_source_setup {
        println!("=== Setting up sources ===");
        source::setup_sources(cx, args.llvm_rev.as_deref(), args.skip_apply_patches)?;
    }

    println!("=== Stage 1 ===");
    let stage1 = Stage1 {
        build_android_targets: args.debug || plan.instrumented,
        build_extra_tools: args.run_tests_stage1,
        ..Stage1::new(host_cfg.clone(), stage1_options(cx, args, plan.build_lldb))
    };
    llvm::build_project(&stage1, cx)?;
    if host.is_linux() && !args.single_stage {
        links::add_header_links(&cx.paths.out_dir, "stage1", &host_cfg)?;
    }
    if !args.skip_tests && args.run_tests_stage1 {
        stage1.test(cx)?;
    }
    let stage1_toolchain = llvm::installed_toolchain(&stage1, cx);
    if !args.single_stage {
        cx.set_default_toolchain(stage1_toolchain.clone());
    }

    // Needed by host and Windows lldb.
    let swig = Swig { config: host_cfg.clone() };
    if plan.build_lldb {
        builder::build(&swig, cx)?;
    }
    let swig_executable = plan.build_lldb.then(|| swig.executable(cx));

    let host_libs = PlatformLibs::new(&host_cfg);
    let libedit = LibEdit {
        config: host_cfg.clone(),
        libncurses: &host_libs.libncurses,
    };
    let mut stage2 = None;
    if plan.need_host {
        println!("=== Stage 2 ===");
        let profiles = if args.pgo {
            profiles::extract_profiles(cx)?
        } else {
            Profiles::default()
        };

        builder::build(&host_libs.zstd, cx)?;
        builder::build(&host_libs.libxml2, cx)?;
        if plan.build_lldb {
            builder::build(&host_libs.xz, cx)?;
            builder::build(&host_libs.libncurses, cx)?;
            builder::build(&libedit, cx)?;
        }

        let options = stage2_options(
            cx,
            build_name,
            args,
            plan.build_lldb,
            &profiles,
            swig_executable.clone(),
        );
        let built = Stage2 {
            deps: LlvmDeps {
                libzstd: Some(&host_libs.zstd),
                libxml2: Some(&host_libs.libxml2),
                liblzma: lldb_dep(plan.build_lldb, &host_libs.xz),
                libedit: lldb_dep(plan.build_lldb, &libedit),
                libncurses: lldb_dep(plan.build_lldb, &host_libs.libncurses),
            },
            debug_build: args.debug,
            build_instrumented: plan.instrumented,
            bolt_optimize: args.bolt,
            bolt_instrument: args.bolt_instrument,
            profdata_file: profiles.pgo.clone(),
            lto: args.lto,
            ..Stage2::new(host_cfg.clone(), options)
        };
        llvm::build_project(&built, cx)?;

        let installed = llvm::installed_toolchain(&built, cx);
        if let Some(fdata) = profiles.clang_bolt.as_ref().filter(|_| plan.bolt) {
            profiles::bolt_optimize(&installed, fdata)?;
        }
        if !(built.build_instrumented || built.debug_build) {
            cx.set_default_toolchain(installed.clone());
        }
        cx.set_output_toolchain(installed);

        if host.is_linux() && plan.runtimes {
            println!("=== Runtimes ===");
            build_runtimes(cx, plan.build_lldb, &host_cfg, &host_32bit_config(host, musl)?)?;
        }
        stage2 = Some(built);
    }

    let win_libs;
    let mut windows = None;
    if plan.need_windows {
        println!("=== Windows toolchain ===");
        // Host sysroots are only set up for Windows.
        builder::build(&HostSysroots, cx)?;
        if let Some(sdk) = &args.windows_sdk {
            cx.win_sdk = Some(WinSdk::open(sdk)?);
        }
        let win_config = match &cx.win_sdk {
            Some(sdk) => Config::new(Target::Msvc { sdk: sdk.path.clone() }),
            None => Config::mingw(false),
        };
        win_libs = PlatformLibs::new(&win_config);
        windows = Some(build_llvm_for_windows(
            cx,
            win_config,
            &win_libs,
            &stage1_toolchain,
            llvm_options(cx, build_name, args, plan.build_lldb),
            args.enable_assertions,
            swig_executable,
        )?);
    }

    // Darwin stage2 tests are disabled.
    let need_tests = !args.skip_tests
        && plan.need_host
        && cx.registry.should_build("stage2")
        && !args.build_instrumented;
    if let Some(stage2) = stage2.as_ref().filter(|_| need_tests && !host.is_darwin()) {
        stage2.test(cx)?;
    }

    // Last build step, so nothing else records BOLT profiles.
    if let Some(stage2) = stage2.as_ref().filter(|_| plan.bolt_instrument) {
        profiles::bolt_instrument(cx, &llvm::installed_toolchain(stage2, cx))?;
    }

    if !plan.package {
        return Ok(());
    }
    if let Some(stage2) = &stage2 {
        package::package_toolchain(
            stage2,
            cx,
            &BTreeSet::new(),
            PackageOptions {
                strip: plan.strip_host_package,
                create_tar: args.create_tar,
                llvm_next: args.build_llvm_next,
            },
        )?;
    }
    if let Some((win, lldb_bins)) = &windows {
        package::package_toolchain(
            win,
            cx,
            lldb_bins,
            PackageOptions {
                strip: plan.strip,
                create_tar: args.create_tar,
                llvm_next: false,
            },
        )?;
    }
    Ok(())
}

/// Builds the Windows dependencies and toolchain. Returns the builder and
/// the extra binaries its package must keep.
fn build_llvm_for_windows<'a>(
    cx: &Session,
    config: Config,
    libs: &'a PlatformLibs,
    stage1: &'a Toolchain,
    options: LlvmOptions,
    enable_assertions: bool,
    swig_executable: Option<PathBuf>,
) -> Result<(WindowsToolchain<'a>, BTreeSet<String>)> {
    let build_lldb = options.build_lldb;
    let mut win = WindowsToolchain {
        config: config.clone(),
        options: LlvmOptions {
            enable_assertions,
            enable_mlgo: false,
            use_sccache: false,
            swig_executable: swig_executable.filter(|_| build_lldb),
            ..options
        },
        deps: LlvmDeps::default(),
        toolchain: stage1,
    };
    remove_dir_if_exists(&win.install_dir(cx, &config)?)?;

    if !cx.win_sdk_enabled() {
        // Clang links the libc++ built here.
        builder::build(
            &LibCxx {
                config: config.clone(),
                enable_assertions,
            },
            cx,
        )?;
    }

    builder::build(&libs.zstd, cx)?;
    win.deps.libzstd = Some(&libs.zstd);

    let mut lldb_bins = BTreeSet::new();
    builder::build(&libs.libxml2, cx)?;
    win.deps.libxml2 = Some(&libs.libxml2);
    for lib in libs.libxml2.install_libraries(cx)? {
        if let Some(name) = lib.file_name() {
            lldb_bins.insert(name.to_string_lossy().into_owned());
        }
    }

    if build_lldb {
        builder::build(&libs.xz, cx)?;
        win.deps.liblzma = Some(&libs.xz);
        lldb_bins.insert("liblldb.dll".to_string());
    }

    llvm::build_project(&win, cx)?;
    Ok((win, lldb_bins))
}
