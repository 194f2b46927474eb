//! Compiler wrapper installation for the Linux package.

use crate::fs_util::{copy_file, remove_file_if_exists, symlink};
use crate::process::{arg, Cmd};
use crate::session::Session;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Builds the Go compiler wrapper from toolchain-utils.
pub fn build_wrapper(cx: &Session, llvm_next: bool) -> Result<PathBuf> {
    let paths = &cx.paths;
    let wrapper = paths.out_dir.join("llvm_android_wrapper");
    let build_script = paths.toolchain_utils_dir().join("compiler_wrapper/build.py");

    let mut env = cx.orig_env.clone();
    let go_bin = paths.go_bin_path().display().to_string();
    let path = match cx.orig_env.get("PATH") {
        Some(path) => format!("{go_bin}:{path}"),
        None => go_bin,
    };
    env.insert("PATH".to_string(), path);
    env.insert("GOROOT".to_string(), paths.go_root().display().to_string());

    Cmd::new([arg(paths.python_executable(paths.build_host)?), arg(&build_script)])
        .arg("--config=android")
        .arg("--use_ccache=false")
        .arg(format!("--use_llvm_next={llvm_next}"))
        .arg(format!("--output_file={}", wrapper.display()))
        .env(env)
        .run()?;
    Ok(wrapper)
}

fn rename_once(from: &Path, to: &Path) -> Result<()> {
    if !to.exists() {
        fs::rename(from, to)
            .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    }
    Ok(())
}

/// Puts `wrapper` in front of clang, clang++ and clang-tidy.
///
/// The real binaries become `*.real`. A package built from a prebuilt that
/// already has them is left as is. clang-cl points at `clang.real`.
pub fn install_wrapper_files(bin_dir: &Path, wrapper: &Path, scripts_dir: &Path) -> Result<()> {
    let clang = bin_dir.join("clang");
    let clangxx = bin_dir.join("clang++");
    let clang_tidy = bin_dir.join("clang-tidy");
    let clangxx_real = bin_dir.join("clang++.real");

    rename_once(&clang, &bin_dir.join("clang.real"))?;
    rename_once(&clang_tidy, &bin_dir.join("clang-tidy.real"))?;
    for stale in [&clang, &clangxx, &clang_tidy, &clangxx_real] {
        remove_file_if_exists(stale)?;
    }
    symlink(Path::new("clang.real"), &clangxx_real)?;

    for dest in [&clang, &clangxx, &clang_tidy] {
        copy_file(wrapper, dest)?;
    }
    for script in ["bisect_driver.py", "clang-tidy.sh"] {
        copy_file(&scripts_dir.join(script), &bin_dir.join(script))?;
    }

    let clang_cl = bin_dir.join("clang-cl");
    fs::remove_file(&clang_cl).with_context(|| format!("Failed to remove {}", clang_cl.display()))?;
    symlink(Path::new("clang.real"), &clang_cl)
}

pub fn install_wrappers(cx: &Session, install_dir: &Path, llvm_next: bool) -> Result<()> {
    let wrapper = build_wrapper(cx, llvm_next)?;
    install_wrapper_files(&install_dir.join("bin"), &wrapper, &cx.paths.scripts_dir())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_install_wrapper_files() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(&scripts).unwrap();
        fs::write(bin.join("clang"), "clang").unwrap();
        symlink(Path::new("clang"), &bin.join("clang++")).unwrap();
        symlink(Path::new("clang"), &bin.join("clang-cl")).unwrap();
        fs::write(bin.join("clang-tidy"), "tidy").unwrap();
        fs::write(scripts.join("bisect_driver.py"), "").unwrap();
        fs::write(scripts.join("clang-tidy.sh"), "").unwrap();
        let wrapper = dir.path().join("wrapper");
        fs::write(&wrapper, "wrapper").unwrap();

        install_wrapper_files(&bin, &wrapper, &scripts).unwrap();

        assert_eq!(fs::read_to_string(bin.join("clang.real")).unwrap(), "clang");
        assert_eq!(fs::read_to_string(bin.join("clang-tidy.real")).unwrap(), "tidy");
        for name in ["clang", "clang++", "clang-tidy"] {
            assert_eq!(fs::read_to_string(bin.join(name)).unwrap(), "wrapper");
        }
        assert_eq!(fs::read_link(bin.join("clang++.real")).unwrap(), Path::new("clang.real"));
        assert_eq!(fs::read_link(bin.join("clang-cl")).unwrap(), Path::new("clang.real"));
        assert!(bin.join("bisect_driver.py").exists());
    }
}
