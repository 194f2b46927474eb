//! PGO and BOLT profiles, and the llvm-bolt passes over the installed clang.

use crate::process::{arg, check_call};
use crate::session::Session;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Optimization profiles found in the prebuilts. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profiles {
    pub pgo: Option<PathBuf>,
    pub clang_bolt: Option<PathBuf>,
}

fn untar(tarball: &Path, dest: &Path) -> Result<()> {
    check_call(["tar".to_string(), "-jxC".to_string(), arg(dest), "-f".to_string(), arg(tarball)])
}

/// Unpacks the PGO profile and then the BOLT profile into the out dir.
///
/// The BOLT profile is only looked at when the PGO profile is present.
pub fn extract_profiles(cx: &Session) -> Result<Profiles> {
    let out_dir = &cx.paths.out_dir;
    let version = cx.android_version;

    let Some(pgo_tar) = cx.paths.pgo_profdata_tar(version)? else {
        return Ok(Profiles::default());
    };
    untar(&pgo_tar, out_dir)?;
    let profdata = out_dir.join(cx.paths.pgo_profdata_filename(version)?);
    if !profdata.exists() {
        info!("PGO profdata missing");
        return Ok(Profiles::default());
    }

    let mut profiles = Profiles {
        pgo: Some(profdata),
        clang_bolt: None,
    };
    let Some(bolt_tar) = cx.paths.bolt_fdata_tar(version)? else {
        return Ok(profiles);
    };
    untar(&bolt_tar, out_dir)?;
    let fdata = out_dir.join("clang.fdata");
    if fdata.exists() {
        profiles.clang_bolt = Some(fdata);
    } else {
        info!("Clang BOLT profile missing");
    }
    Ok(profiles)
}

/// `bin/clang-<major>` and its `.orig` backup.
fn clang_binaries(installed: &Toolchain) -> Result<(PathBuf, PathBuf)> {
    let major = installed.version()?.major_version().to_string();
    let bin_dir = installed.path.join("bin");
    Ok((
        bin_dir.join(format!("clang-{major}")),
        bin_dir.join(format!("clang-{major}.orig")),
    ))
}

fn move_aside(clang: &Path, orig: &Path) -> Result<()> {
    fs::rename(clang, orig)
        .with_context(|| format!("Failed to move {} to {}", clang.display(), orig.display()))
}

pub fn bolt_optimize_args(llvm_bolt: &Path, fdata: &Path, clang: &Path, orig: &Path) -> Vec<String> {
    vec![
        arg(llvm_bolt),
        format!("-data={}", fdata.display()),
        "-o".to_string(),
        arg(clang),
        "-reorder-blocks=ext-tsp".to_string(),
        "-reorder-functions=hfsort+".to_string(),
        "-split-functions".to_string(),
        "-split-all-cold".to_string(),
        "-dyno-stats".to_string(),
        "-icf=1".to_string(),
        "--use-gnu-stack".to_string(),
        arg(orig),
    ]
}

/// Rewrites the installed clang with the BOLT profile.
pub fn bolt_optimize(installed: &Toolchain, clang_fdata: &Path) -> Result<()> {
    let (clang, orig) = clang_binaries(installed)?;
    move_aside(&clang, &orig)?;
    let llvm_bolt = installed.path.join("bin/llvm-bolt");
    check_call(bolt_optimize_args(&llvm_bolt, clang_fdata, &clang, &orig))
}

/// Replaces the installed clang with a BOLT-instrumented one writing its
/// profiles below `out/bolt_collection/clang`.
pub fn bolt_instrument(cx: &Session, installed: &Toolchain) -> Result<()> {
    let (clang, orig) = clang_binaries(installed)?;
    let collection = cx.paths.out_dir.join("bolt_collection/clang/clang");
    move_aside(&clang, &orig)?;
    check_call([
        arg(installed.path.join("bin/llvm-bolt")),
        "-instrument".to_string(),
        format!("--instrumentation-file={}", collection.display()),
        "--instrumentation-file-append-pid".to_string(),
        "-o".to_string(),
        arg(&clang),
        arg(&orig),
    ])?;
    // The instrumented binary doesn't create its output directory.
    fs::create_dir_all(&collection)
        .with_context(|| format!("Failed to create {}", collection.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session_at;

    #[test]
    fn test_no_profiles_without_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let cx = session_at(dir.path());
        assert_eq!(extract_profiles(&cx).unwrap(), Profiles::default());
    }

    #[test]
    fn test_clang_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let version_dir = dir.path().join("include/clang/Basic");
        fs::create_dir_all(&version_dir).unwrap();
        fs::write(
            version_dir.join("Version.inc"),
            "#define CLANG_VERSION 17.0.2\n\
             #define CLANG_VERSION_MAJOR 17\n\
             #define CLANG_VERSION_MINOR 0\n\
             #define CLANG_VERSION_PATCHLEVEL 2\n",
        )
        .unwrap();
        let installed = Toolchain::new(dir.path(), dir.path().join("build"));
        let (clang, orig) = clang_binaries(&installed).unwrap();
        assert_eq!(clang, dir.path().join("bin/clang-17"));
        assert_eq!(orig, dir.path().join("bin/clang-17.orig"));

        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(&clang, "elf").unwrap();
        move_aside(&clang, &orig).unwrap();
        assert!(!clang.exists());
        assert_eq!(fs::read_to_string(&orig).unwrap(), "elf");
    }

    #[test]
    fn test_bolt_optimize_args() {
        let args = bolt_optimize_args(
            Path::new("/tc/bin/llvm-bolt"),
            Path::new("/out/clang.fdata"),
            Path::new("/tc/bin/clang-17"),
            Path::new("/tc/bin/clang-17.orig"),
        );
        assert_eq!(args[1], "-data=/out/clang.fdata");
        assert_eq!(args[3], "/tc/bin/clang-17");
        assert_eq!(args.last().unwrap(), "/tc/bin/clang-17.orig");
    }
}
