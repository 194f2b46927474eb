//! Turning an installed stage into a distributable toolchain.
//!
//! - `links` - compatibility links for the old runtime layout
//! - `normalize` - host library renaming to SONAMEs
//! - `wrappers` - the compiler wrapper in front of clang

pub mod links;
pub mod normalize;
pub mod wrappers;

use crate::builder::llvm::{self, LlvmProject};
use crate::config::{host_32bit_config, Config};
use crate::fs_util::{copy_file, copy_tree, list_dir, remove_dir_if_exists, remove_file_if_exists, symlink};
use crate::hosts::Host;
use crate::process::{arg, check_call};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const LICENSE_PROJECTS: &[&str] = &[
    "llvm",
    "compiler-rt",
    "libcxx",
    "libcxxabi",
    "openmp",
    "clang",
    "clang-tools-extra",
    "lld",
];

const BUILD_BAZEL: &str = r#"package(default_visibility = ["//visibility:public"])

filegroup(
    name = "binaries",
    srcs = glob([
        "bin/*",
        "lib/*",
    ]),
)

filegroup(
    name = "includes",
    srcs = glob([
        "lib/clang/*/include/**",
    ]),
)
"#;

#[derive(Debug, Clone, Copy)]
pub struct PackageOptions {
    pub strip: bool,
    pub create_tar: bool,
    pub llvm_next: bool,
}

fn exe_ext(host: Host) -> &'static str {
    if host.is_windows() {
        ".exe"
    } else {
        ""
    }
}

fn script_ext(host: Host) -> &'static str {
    if host.is_windows() {
        ".cmd"
    } else {
        ".sh"
    }
}

/// Binaries kept in `bin/`, on top of `extra`.
pub fn necessary_bin_files(host: Host, major: &str, build_lldb: bool, extra: &BTreeSet<String>) -> BTreeSet<String> {
    let ext = exe_ext(host);
    let clang_major = format!("clang-{major}");
    let mut bins: BTreeSet<String> = [
        "clang", "clang++", &clang_major, "clang-check", "clang-cl", "clang-format", "clang-tidy",
        "clangd", "dsymutil", "ld.lld", "ld64.lld", "lld", "lld-link", "llvm-addr2line", "llvm-ar",
        "llvm-as", "llvm-bolt", "llvm-cfi-verify", "llvm-config", "llvm-cov", "llvm-cxxfilt",
        "llvm-dis", "llvm-dwarfdump", "llvm-dwp", "llvm-ifs", "llvm-lib", "llvm-link", "llvm-lipo",
        "llvm-modextract", "llvm-ml", "llvm-nm", "llvm-objcopy", "llvm-objdump", "llvm-profdata",
        "llvm-ranlib", "llvm-rc", "llvm-readelf", "llvm-readobj", "llvm-size", "llvm-strings",
        "llvm-strip", "llvm-symbolizer", "llvm-windres", "merge-fdata", "sancov", "sanstats",
        "scan-build", "scan-view",
    ]
    .iter()
    .map(|name| format!("{name}{ext}"))
    .collect();
    // No extension.
    bins.insert("git-clang-format".to_string());
    bins.extend(extra.iter().cloned());

    if build_lldb {
        bins.insert(format!("lldb-argdumper{ext}"));
        bins.insert(format!("lldb{ext}"));
        bins.insert(format!("lldb{}", script_ext(host)));
    }

    if host.is_windows() {
        for name in [clang_major.as_str(), "clangd", "llvm-bolt", "merge-fdata", "scan-build", "scan-view"] {
            bins.remove(&format!("{name}{ext}"));
        }
    }
    bins
}

/// Binaries that must not be stripped.
fn script_bins(host: Host) -> BTreeSet<String> {
    [
        "git-clang-format".to_string(),
        format!("lldb{}", script_ext(host)),
        // Linked with relocations; strip would fail.
        format!("merge-fdata{}", exe_ext(host)),
        "scan-build".to_string(),
        "scan-view".to_string(),
    ]
    .into_iter()
    .collect()
}

/// Deletes binaries outside `necessary` and strips the rest.
fn prune_bins(
    bin_dir: &Path,
    necessary: &BTreeSet<String>,
    strip_cmd: Option<&Path>,
    host: Host,
    major: &str,
) -> Result<()> {
    let scripts = script_bins(host);
    let clang_major = format!("clang-{major}{}", exe_ext(host));
    for binary in list_dir(bin_dir)? {
        if !binary.is_file() {
            continue;
        }
        let name = binary.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if !necessary.contains(&name) {
            fs::remove_file(&binary).with_context(|| format!("Failed to remove {}", binary.display()))?;
            continue;
        }
        if binary.is_symlink() || scripts.contains(&name) {
            continue;
        }
        if let Some(strip) = strip_cmd {
            // Keep globals plugins may use.
            if host.is_darwin() && name == clang_major {
                check_call([arg(strip), "-S".to_string(), "-x".to_string(), arg(&binary)])?;
            } else {
                check_call([arg(strip), arg(&binary)])?;
            }
        }
    }
    Ok(())
}

/// Removes `*.a` in `lib_dir` except `keep`.
pub fn remove_static_libraries(lib_dir: &Path, keep: &BTreeSet<String>) -> Result<()> {
    for lib in list_dir(lib_dir)? {
        let name = lib.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if name.ends_with(".a") && !keep.contains(&name) {
            fs::remove_file(&lib).with_context(|| format!("Failed to remove {}", lib.display()))?;
        }
    }
    Ok(())
}

fn install_winpthreads(cx: &Session, bin_dir: &Path, lib_dir: &Path) -> Result<()> {
    let name = "libwinpthread-1.dll";
    let src = cx.paths.mingw_root().join("bin").join(name);
    copy_file(&src, &lib_dir.join(name))?;
    copy_file(&src, &bin_dir.join(name))
}

/// MODULE_LICENSE_* from the scripts dir, and every project's LICENSE.*
/// concatenated into NOTICE.
fn install_license_files(cx: &Session, install_dir: &Path) -> Result<()> {
    for license in list_dir(&cx.paths.scripts_dir())? {
        let name = license.file_name().unwrap_or_default().to_string_lossy().into_owned();
        if name.starts_with("MODULE_LICENSE_") {
            copy_file(&license, &install_dir.join(&name))?;
        }
    }

    let mut notices = Vec::new();
    for project in LICENSE_PROJECTS {
        for license in list_dir(&cx.paths.llvm_path().join(project))? {
            let name = license.file_name().unwrap_or_default().to_string_lossy().into_owned();
            if name.starts_with("LICENSE.") {
                notices.push(
                    fs::read_to_string(&license)
                        .with_context(|| format!("Failed to read {}", license.display()))?,
                );
            }
        }
    }
    let notice = install_dir.join("NOTICE");
    fs::write(&notice, notices.join("\n")).with_context(|| format!("Failed to write {}", notice.display()))
}

pub fn android_version_txt(long_version: &str, svn_revision: &str) -> String {
    format!(
        "{long_version}\nbased on {svn_revision}\n\
         for additional information on LLVM revision and cherry-picks, see clang_source_info.md"
    )
}

/// `toolchain/llvm_android` revision pinned by the first `manifest_*.xml`.
pub fn scripts_sha(dist_dir: &Path) -> Result<String> {
    let manifest = list_dir(dist_dir)?.into_iter().find(|p| {
        let name = p.file_name().unwrap_or_default().to_string_lossy();
        name.starts_with("manifest_") && name.ends_with(".xml")
    });
    let Some(manifest) = manifest else {
        return Ok("refs/heads/master".to_string());
    };
    let text = fs::read_to_string(&manifest)
        .with_context(|| format!("Failed to read {}", manifest.display()))?;
    let re = Regex::new(r#"name="toolchain/llvm_android" revision="([^"]*)" /"#)?;
    let caps = re
        .captures(&text)
        .with_context(|| format!("No toolchain/llvm_android project in {}", manifest.display()))?;
    Ok(caps[1].to_string())
}

fn install_source_info(cx: &Session, install_dir: &Path) -> Result<()> {
    let info_file = cx.paths.out_dir.join("clang_source_info.md");
    if !info_file.exists() {
        warn!("{} missing, not packaged", info_file.display());
        return Ok(());
    }
    let text = fs::read_to_string(&info_file)
        .with_context(|| format!("Failed to read {}", info_file.display()))?;
    let text = text.replace("{{scripts_sha}}", &scripts_sha(&cx.paths.dist_dir)?);
    fs::write(&info_file, text).with_context(|| format!("Failed to write {}", info_file.display()))?;
    copy_file(&info_file, &install_dir.join("clang_source_info.md"))
}

/// Inputs for remote execution, relative to `bin/`.
pub fn remote_toolchain_inputs(major: &str, libxml2_version: Option<&str>) -> String {
    let mut inputs: Vec<String> = [
        "clang",
        "clang++",
        "clang.real",
        "clang++.real",
        "clang-tidy",
        "clang-tidy.real",
        "../lib/libc++.so.1",
        "lld",
        "ld64.lld",
        "ld.lld",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();
    inputs.push(format!("../lib/clang/{major}/share"));
    inputs.push(format!("../lib/clang/{major}/lib/linux"));
    inputs.push(format!("../lib/clang/{major}/include"));
    if let Some(version) = libxml2_version {
        inputs.push(format!("../lib/libxml2.so.{version}"));
    }
    let mut out = inputs.join("\n");
    out.push('\n');
    out
}

/// Where host libc++ lives in a Linux package.
fn libcxx_dir(lib_dir: &Path) -> PathBuf {
    ["x86_64-unknown-linux-gnu", "x86_64-unknown-linux-musl"]
        .iter()
        .map(|triple| lib_dir.join(triple))
        .find(|dir| dir.exists())
        .unwrap_or_else(|| lib_dir.to_path_buf())
}

/// Copies the install dir of `b` to `out/install/<os>/clang-<build name>`,
/// trims it to what ships, and optionally tars it into the dist dir.
pub fn package_toolchain<B: LlvmProject + ?Sized>(
    b: &B,
    cx: &Session,
    extra_bins: &BTreeSet<String>,
    opts: PackageOptions,
) -> Result<()> {
    let host_config: Config = b
        .config_list()
        .into_iter()
        .next()
        .context("Nothing to package without a config")?;
    let host = host_config.os();
    let installed = llvm::installed_toolchain(b, cx);
    let version = installed.version()?.clone();
    let major = version.major_version().to_string();
    let options = b.options();

    let package_name = format!("clang-{}", options.build_name);
    let install_dir = cx.paths.package_install_path(host, &package_name)?;
    let install_host_dir = install_dir
        .parent()
        .context("Package dir has no parent")?
        .to_path_buf();
    println!("=== Packaging {package_name} for {host} ===");

    remove_dir_if_exists(&install_host_dir)?;
    copy_tree(&installed.path, &install_dir, true, &[])?;

    let bin_dir = install_dir.join("bin");
    let lib_dir = install_dir.join("lib");
    let necessary_bins = necessary_bin_files(host, &major, options.build_lldb, extra_bins);
    let strip_cmd = cx.toolchain().strip();
    prune_bins(
        &bin_dir,
        &necessary_bins,
        opts.strip.then_some(strip_cmd.as_path()),
        host,
        &major,
    )?;

    // TODO: drop once nothing uses lib/clang/<long version>.
    symlink(Path::new(&major), &lib_dir.join("clang").join(version.long_version()))?;

    for bin in &necessary_bins {
        if !bin_dir.join(bin).is_file() {
            bail!("Did not find {bin} in {}", bin_dir.display());
        }
    }

    let win_sdk = host.is_windows() && cx.win_sdk_enabled();
    let mut necessary_libs = BTreeSet::new();
    if !win_sdk {
        necessary_libs.insert("libc++.a".to_string());
        necessary_libs.insert("libc++abi.a".to_string());
    }
    if host.is_windows() && !win_sdk {
        necessary_libs.insert("libwinpthread-1.dll".to_string());
        install_winpthreads(cx, &bin_dir, &lib_dir)?;
    }
    remove_static_libraries(&lib_dir, &necessary_libs)?;

    if host.is_linux() {
        wrappers::install_wrappers(cx, &install_dir, opts.llvm_next)?;
    }
    if !host.is_windows() {
        normalize::normalize_host_libs(&install_dir, &version, &host_config)?;
        if host.is_linux() {
            let config_32 = host_32bit_config(host, host_config.is_musl())?;
            normalize::normalize_host_libs(&install_dir, &version, &config_32)?;
        }
    }

    for lib in &necessary_libs {
        let prefix = if !host.is_windows() && lib.starts_with("libc++") {
            libcxx_dir(&lib_dir)
        } else {
            lib_dir.clone()
        };
        if !prefix.join(lib).is_file() {
            bail!("Did not find {lib} in {}", lib_dir.display());
        }
    }

    let libc_include = cx.paths.bionic_headers();
    let header_dir = lib_dir.join("clang").join(&major).join("include");
    copy_file(&libc_include.join("stdatomic.h"), &header_dir.join("stdatomic.h"))?;
    copy_file(
        &libc_include.join("bits/stdatomic.h"),
        &header_dir.join("bits/stdatomic.h"),
    )?;

    install_license_files(cx, &install_dir)?;
    let version_file = install_dir.join("AndroidVersion.txt");
    fs::write(
        &version_file,
        android_version_txt(&version.long_version(), cx.android_version.svn_revision()),
    )
    .with_context(|| format!("Failed to write {}", version_file.display()))?;
    install_source_info(cx, &install_dir)?;

    // Avoids auto-filed bugs about yaml.load_all.
    remove_file_if_exists(&install_dir.join("share/opt-viewer/optrecord.py"))?;

    if host.is_linux() {
        fs::write(install_dir.join("BUILD.bazel"), BUILD_BAZEL)?;
        let libxml2_version = match b.deps().libxml2 {
            Some(libxml2) => Some(libxml2.lib_version(cx)?),
            None => None,
        };
        fs::write(
            bin_dir.join("remote_toolchain_inputs"),
            remote_toolchain_inputs(&major, libxml2_version.as_deref()),
        )?;
    }

    if opts.create_tar {
        let tag = if host_config.is_musl() {
            host.os_tag_musl()?
        } else {
            host.os_tag()?
        };
        let tarball = cx.paths.dist_dir.join(format!("{package_name}-{tag}.tar.bz2"));
        info!("Packaging {}", tarball.display());
        fs::create_dir_all(&cx.paths.dist_dir)?;
        check_call([
            "tar".to_string(),
            "-cjC".to_string(),
            arg(&install_host_dir),
            "-f".to_string(),
            arg(&tarball),
            package_name,
        ])?;
    }
    Ok(())
}
