//! Compatibility links inside an installed stage for the old runtime layout.

use crate::config::Config;
use crate::fs_util::{list_dir, remove_file_if_exists, symlink};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

fn stage_install_dir(out_dir: &Path, stage: &str) -> PathBuf {
    out_dir.join(format!("{stage}-install"))
}

/// `include/c++/v1/__config_site` -> the triple-specific copy.
pub fn add_header_links(out_dir: &Path, stage: &str, host_config: &Config) -> Result<()> {
    let triple = host_config.llvm_triple();
    let dst = stage_install_dir(out_dir, stage).join("include/c++/v1/__config_site");
    remove_file_if_exists(&dst)?;
    symlink(
        Path::new(&format!("../../{triple}/c++/v1/__config_site")),
        &dst,
    )
}

/// Old-style runtime name: `libclang_rt.asan.so` -> `libclang_rt.asan-x86_64.so`.
/// `.a.syms` counts as one suffix.
pub fn legacy_runtime_name(file_name: &str, arch: &str) -> String {
    let (stem, suffix) = match file_name.rsplit_once('.') {
        Some((stem, "syms")) => match stem.rsplit_once('.') {
            Some((inner, ext)) => (inner, format!(".{ext}.syms")),
            None => (stem, ".syms".to_string()),
        },
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (file_name, String::new()),
    };
    format!("{stem}-{arch}{suffix}")
}

/// Links `lib/clang/*/lib/linux/<name>-<arch>.*` to the per-triple runtimes,
/// and on 64-bit Linux `lib/*` to `lib/<triple>/*`.
pub fn add_lib_links(out_dir: &Path, stage: &str, host_config: &Config) -> Result<()> {
    let triple = host_config.llvm_triple();
    let arch = triple.split('-').next().unwrap_or_default().to_string();
    let lib_dir = stage_install_dir(out_dir, stage).join("lib");

    for version_dir in list_dir(&lib_dir.join("clang"))? {
        let runtime_dir = version_dir.join("lib").join(&triple);
        let runtimes: Vec<PathBuf> = list_dir(&runtime_dir)?
            .into_iter()
            .filter(|f| f.file_name().is_some_and(|n| n.to_string_lossy().contains('.')))
            .collect();
        if runtimes.is_empty() {
            continue;
        }
        let linux_dir = version_dir.join("lib/linux");
        fs::create_dir_all(&linux_dir)?;
        for runtime in runtimes {
            let file_name = runtime.file_name().unwrap_or_default().to_string_lossy().into_owned();
            let dst = linux_dir.join(legacy_runtime_name(&file_name, &arch));
            remove_file_if_exists(&dst)?;
            symlink(Path::new(&format!("../{triple}/{file_name}")), &dst)?;
        }
    }

    if host_config.os().is_linux() && !host_config.is_32_bit() {
        for file in list_dir(&lib_dir.join(&triple))? {
            let file_name = file.file_name().unwrap_or_default().to_string_lossy().into_owned();
            let dst = lib_dir.join(&file_name);
            remove_file_if_exists(&dst)?;
            symlink(Path::new(&format!("{triple}/{file_name}")), &dst)?;
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_runtime_name() {
        assert_eq!(
            legacy_runtime_name("libclang_rt.asan.so", "x86_64"),
            "libclang_rt.asan-x86_64.so"
        );
        assert_eq!(
            legacy_runtime_name("libclang_rt.asan.a.syms", "i386"),
            "libclang_rt.asan-i386.a.syms"
        );
        assert_eq!(
            legacy_runtime_name("clang_rt.crtbegin.o", "x86_64"),
            "clang_rt.crtbegin-x86_64.o"
        );
    }

    #[test]
    fn test_add_lib_links() {
        let out = tempfile::tempdir().unwrap();
        let lib = out.path().join("stage2-install/lib");
        let runtimes = lib.join("clang/17/lib/x86_64-unknown-linux-gnu");
        fs::create_dir_all(&runtimes).unwrap();
        fs::write(runtimes.join("libclang_rt.asan.a.syms"), "").unwrap();
        let host_libs = lib.join("x86_64-unknown-linux-gnu");
        fs::create_dir_all(&host_libs).unwrap();
        fs::write(host_libs.join("libc++.so.1"), "").unwrap();

        let host = Config::linux(false);
        add_lib_links(out.path(), "stage2", &host).unwrap();
        // Re-running replaces the links.
        add_lib_links(out.path(), "stage2", &host).unwrap();

        assert_eq!(
            fs::read_link(lib.join("clang/17/lib/linux/libclang_rt.asan-x86_64.a.syms")).unwrap(),
            PathBuf::from("../x86_64-unknown-linux-gnu/libclang_rt.asan.a.syms")
        );
        assert_eq!(
            fs::read_link(lib.join("libc++.so.1")).unwrap(),
            PathBuf::from("x86_64-unknown-linux-gnu/libc++.so.1")
        );
    }

    #[test]
    fn test_add_header_links() {
        let out = tempfile::tempdir().unwrap();
        let v1 = out.path().join("stage1-install/include/c++/v1");
        fs::create_dir_all(&v1).unwrap();
        fs::write(v1.join("__config_site"), "stale").unwrap();

        add_header_links(out.path(), "stage1", &Config::linux(false)).unwrap();
        assert_eq!(
            fs::read_link(v1.join("__config_site")).unwrap(),
            PathBuf::from("../../x86_64-unknown-linux-gnu/c++/v1/__config_site")
        );
    }
}
