//! Host library normalisation: one file per library, named after its SONAME.

use crate::config::Config;
use crate::fs_util::list_dir;
use crate::hosts::Host;
use crate::version::ClangVersion;
use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// (library, file name pattern with `{version}`)
fn host_libs(host: Host) -> &'static [(&'static str, &'static str)] {
    if host.is_linux() {
        &[
            ("libLLVM", "libLLVM-{version}.so"),
            ("libclang", "libclang.so.{version}"),
            ("libclang-cpp", "libclang-cpp.so.{version}"),
            ("libc++", "libc++.so.{version}"),
            ("libc++abi", "libc++abi.so.{version}"),
        ]
    } else {
        &[
            ("libc++", "libc++.{version}.dylib"),
            ("libc++abi", "libc++abi.{version}.dylib"),
        ]
    }
}

/// (full version, SONAME version) of `lib`.
fn lib_versions(lib: &str, version: &ClangVersion) -> (String, String) {
    let major = version.major_version().to_string();
    if lib == "libclang-cpp" {
        (major.clone(), major)
    } else if lib.starts_with("libc++") {
        ("1.0".to_string(), "1".to_string())
    } else {
        (version.long_version(), major)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}

/// The single `libclang.so.NN` in `dir`.
fn libclang_soname_version(dir: &Path) -> Result<String> {
    let candidates: Vec<String> = list_dir(dir)?
        .iter()
        .map(|p| file_name(p))
        .filter_map(|name| {
            let version = name.strip_prefix("libclang.so.")?;
            (version.len() == 2 && version.bytes().all(|b| b.is_ascii_digit()))
                .then(|| version.to_string())
        })
        .collect();
    match candidates.as_slice() {
        [version] => Ok(version.clone()),
        _ => bail!("{} versions of libclang.so found, 1 expected", candidates.len()),
    }
}

/// Renames each host library to its SONAME and deletes its other names.
///
/// `libLLVM` and `libclang-cpp` keep their real file. `libc++.so` (or
/// `.dylib`) stays for later builds using this toolchain as a prebuilt.
pub fn normalize_host_libs(install_dir: &Path, version: &ClangVersion, host_config: &Config) -> Result<()> {
    let host = host_config.os();
    let no_llvm_libs = host.is_linux() && host_config.is_32_bit();
    let lib_dir = install_dir.join("lib");
    let libcxx_name = if host.is_linux() { "libc++.so" } else { "libc++.dylib" };

    for &(lib, pattern) in host_libs(host) {
        let prefix: PathBuf = if pattern.starts_with("libc++") {
            let triple_dir = lib_dir.join(host_config.llvm_triple());
            if triple_dir.exists() {
                triple_dir
            } else {
                lib_dir.clone()
            }
        } else if no_llvm_libs {
            continue;
        } else {
            lib_dir.clone()
        };

        let (full_version, major) = lib_versions(lib, version);
        let soname_version = if lib == "libclang" {
            libclang_soname_version(&prefix)?
        } else {
            major
        };

        let mut soname_name = pattern.replace("{version}", &soname_version);
        if lib == "libclang" {
            soname_name.truncate(soname_name.len().saturating_sub(3));
        }
        let soname_lib = prefix.join(&soname_name);
        let real_lib = prefix.join(pattern.replace("{version}", &full_version));

        let preserved = matches!(lib, "libLLVM" | "libclang-cpp");
        if !preserved && real_lib.exists() {
            if !real_lib.is_file() {
                bail!("{} must be a regular file", real_lib.display());
            }
            if !soname_lib.is_symlink() {
                bail!("{} must be a symlink", soname_lib.display());
            }
            fs::rename(&real_lib, &soname_lib)?;
        }

        let dotted = format!("{lib}.");
        let dashed = format!("{lib}-");
        for path in list_dir(&prefix)? {
            let name = file_name(&path);
            let stale = name != libcxx_name
                && !name.starts_with("libclang-cpp")
                && !name.ends_with(".a")
                && (name.starts_with(&dotted) || name.starts_with(&dashed));
            if stale && path != soname_lib {
                fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs_util::symlink;

    fn version() -> ClangVersion {
        ClangVersion {
            major: "17".to_string(),
            minor: "0".to_string(),
            patch: "2".to_string(),
        }
    }

    fn file(dir: &Path, name: &str) {
        fs::write(dir.join(name), name).unwrap();
    }

    fn link(dir: &Path, name: &str, target: &str) {
        symlink(Path::new(target), &dir.join(name)).unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        list_dir(dir).unwrap().iter().map(|p| file_name(p)).collect()
    }

    #[test]
    fn test_normalize_linux() {
        let install = tempfile::tempdir().unwrap();
        let lib = install.path().join("lib");
        let triple = lib.join("x86_64-unknown-linux-gnu");
        fs::create_dir_all(&triple).unwrap();

        file(&lib, "libLLVM-17.so");
        link(&lib, "libLLVM.so", "libLLVM-17.so");
        file(&lib, "libclang.so.17.0.2");
        link(&lib, "libclang.so.13", "libclang.so.17.0.2");
        link(&lib, "libclang.so", "libclang.so.13");
        file(&lib, "libclang-cpp.so.17");
        link(&lib, "libclang-cpp.so", "libclang-cpp.so.17");

        file(&triple, "libc++.so.1.0");
        link(&triple, "libc++.so.1", "libc++.so.1.0");
        link(&triple, "libc++.so", "libc++.so.1");
        file(&triple, "libc++.a");
        file(&triple, "libc++abi.so.1.0");
        link(&triple, "libc++abi.so.1", "libc++abi.so.1.0");
        link(&triple, "libc++abi.so", "libc++abi.so.1");

        normalize_host_libs(install.path(), &version(), &Config::linux(false)).unwrap();

        assert_eq!(
            names(&triple),
            vec!["libc++.a", "libc++.so", "libc++.so.1", "libc++abi.so.1"]
        );
        assert_eq!(fs::read_to_string(triple.join("libc++.so.1")).unwrap(), "libc++.so.1.0");
        assert!(!triple.join("libc++.so.1").is_symlink());

        assert_eq!(
            names(&lib)
                .into_iter()
                .filter(|n| n.starts_with("lib"))
                .collect::<Vec<_>>(),
            vec!["libLLVM-17.so", "libclang-cpp.so", "libclang-cpp.so.17", "libclang.so"]
        );
        assert_eq!(fs::read_to_string(lib.join("libclang.so")).unwrap(), "libclang.so.17.0.2");
    }

    #[test]
    fn test_normalize_32bit_skips_llvm_libs() {
        let install = tempfile::tempdir().unwrap();
        let lib = install.path().join("lib");
        let triple = lib.join("i386-unknown-linux-gnu");
        fs::create_dir_all(&triple).unwrap();
        file(&lib, "libLLVM-17.0.2.so");
        file(&triple, "libc++.so.1.0");
        link(&triple, "libc++.so.1", "libc++.so.1.0");

        let config = Config::linux(true);
        assert_eq!(config.llvm_triple(), "i386-unknown-linux-gnu");
        normalize_host_libs(install.path(), &version(), &config).unwrap();
        assert!(lib.join("libLLVM-17.0.2.so").exists());
        assert_eq!(names(&triple), vec!["libc++.so.1"]);
    }

    #[test]
    fn test_libclang_soname_must_be_unique() {
        let dir = tempfile::tempdir().unwrap();
        file(dir.path(), "libclang.so.13");
        file(dir.path(), "libclang.so.14");
        assert!(libclang_soname_version(dir.path()).is_err());
    }
}
