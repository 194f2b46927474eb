//! `configure && make` builds.

use super::cmake::{lib_output_dir, suffixed};
use super::Builder;
use crate::config::{join_flags, Config};
use crate::constants::MAC_MIN_VERSION;
use crate::fs_util::{find_files, remove_dir_if_exists, touch};
use crate::process::{arg, check_output, create_script, Cmd};
use crate::session::Session;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub trait AutoconfBuilder: Builder {
    fn src_dir(&self, cx: &Session) -> PathBuf;

    fn output_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        lib_output_dir(cx, self.name(), c)
    }

    fn install_dir(&self, cx: &Session, c: &Config) -> PathBuf {
        suffixed(&self.output_dir(cx, c), "-install")
    }

    /// Arguments to `configure` after `--prefix`.
    fn config_flags(&self, _cx: &Session, _c: &Config) -> Vec<String> {
        Vec::new()
    }

    fn remove_install_dir(&self) -> bool {
        true
    }

    fn install_config(&self, cx: &Session, c: &Config) -> Result<()> {
        make_install(self, cx, c)
    }
}

fn mac_sdk_path() -> Result<PathBuf> {
    let out = check_output(["xcrun", "--show-sdk-path"])?;
    Ok(PathBuf::from(out.trim()))
}

/// Flags every autoconf build adds on top of the config's.
pub fn cflags(cx: &Session, c: &Config) -> Result<Vec<String>> {
    let mut cflags = vec![
        "-fPIC".to_string(),
        "-Wno-unused-command-line-argument".to_string(),
    ];
    if let Some(sysroot) = c.sysroot(&cx.paths) {
        cflags.push(format!("--sysroot={}", sysroot.display()));
    }
    if c.os().is_darwin() {
        let sdk_path = mac_sdk_path()?;
        cflags.push(Config::mac_min_version_flag());
        cflags.push(format!("-DMACOSX_DEPLOYMENT_TARGET={MAC_MIN_VERSION}"));
        cflags.push(format!("-isysroot{}", sdk_path.display()));
        cflags.push(format!("-Wl,-syslibroot,{}", sdk_path.display()));
    }
    Ok(cflags)
}

pub fn cxxflags(mut cflags: Vec<String>) -> Vec<String> {
    cflags.push("-stdlib=libc++".to_string());
    cflags
}

/// Touches the generated autotools files so make doesn't try to rerun
/// autoreconf.
pub fn touch_autoconf_files(src_dir: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = ["aclocal.m4", "configure", "Makefile.am"]
        .iter()
        .map(|name| src_dir.join(name))
        .collect();
    files.extend(find_files(src_dir, "*.in"));
    for file in files.iter().filter(|f| f.is_file()) {
        touch(file)?;
    }
    Ok(())
}

pub fn build_config<B: AutoconfBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    let output_dir = b.output_dir(cx, c);
    let install_dir = b.install_dir(cx, c);
    if b.remove_install_dir() {
        remove_dir_if_exists(&install_dir)?;
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let src_dir = b.src_dir(cx);
    touch_autoconf_files(&src_dir)?;

    // Flags go through files to avoid escaping issues.
    let paths = &cx.paths;
    let mut cflags = c.cflags(paths);
    cflags.extend(b.cflags(cx, c)?);
    let mut cxxflags = c.cxxflags(paths);
    cxxflags.extend(b.cxxflags(cx, c)?);
    let mut ldflags = c.ldflags(paths);
    ldflags.extend(b.ldflags(cx, c)?);
    cflags.extend(ldflags.iter().cloned());
    cxxflags.extend(ldflags);

    let cflags_file = output_dir.join("cflags");
    let cxxflags_file = output_dir.join("cxxflags");
    fs::write(&cflags_file, join_flags(&cflags))?;
    fs::write(&cxxflags_file, join_flags(&cxxflags))?;

    let toolchain = b.toolchain(cx);
    let mut env = b.env(cx, c)?;
    // configure's pre-checks ignore CFLAGS, so the flags ride along with CC.
    env.insert(
        "CC".to_string(),
        format!("{} @{}", c.c_compiler(toolchain).display(), cflags_file.display()),
    );
    env.insert(
        "CXX".to_string(),
        format!("{} @{}", c.cxx_compiler(toolchain).display(), cxxflags_file.display()),
    );
    // Universal binaries. Kept out of the flag files since `clang -E` rejects
    // multiple -arch flags.
    if c.os().is_darwin() {
        let universal = "-arch arm64 -arch x86_64".to_string();
        env.insert("CFLAGS".to_string(), universal.clone());
        env.insert("CXXFLAGS".to_string(), universal);
    }

    let mut config_cmd = vec![
        arg(src_dir.join("configure")),
        format!("--prefix={}", install_dir.display()),
    ];
    config_cmd.extend(b.config_flags(cx, c));
    create_script(&output_dir.join("config_invocation.sh"), &config_cmd, &env, &cx.orig_env)?;
    Cmd::new(config_cmd).cwd(&output_dir).env(env).run()?;

    Cmd::new([arg(paths.make_bin_path()), format!("-j{}", num_cpus::get())])
        .cwd(&output_dir)
        .env(b.env(cx, c)?)
        .run()?;

    b.install_config(cx, c)
}

pub fn make_install<B: AutoconfBuilder + ?Sized>(b: &B, cx: &Session, c: &Config) -> Result<()> {
    Cmd::new([arg(cx.paths.make_bin_path()), "install".to_string()])
        .cwd(b.output_dir(cx, c))
        .env(b.env(cx, c)?)
        .run()
}
