//! Filesystem helpers shared by builders and packaging.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Creates a symlink at `link` pointing to `target`.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "Failed to symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}

#[cfg(not(unix))]
pub fn symlink(target: &Path, link: &Path) -> Result<()> {
    anyhow::bail!(
        "symlinks are not supported on this host: {} -> {}",
        link.display(),
        target.display()
    )
}

/// Replaces whatever is at `link` with a symlink to `target`.
pub fn force_symlink(target: &Path, link: &Path) -> Result<()> {
    if link.is_symlink() || link.is_file() {
        fs::remove_file(link)?;
    }
    symlink(target, link)
}

pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    Ok(())
}

pub fn remove_file_if_exists(file: &Path) -> Result<()> {
    if file.is_symlink() || file.exists() {
        fs::remove_file(file).with_context(|| format!("Failed to remove {}", file.display()))?;
    }
    Ok(())
}

/// Bumps the mtime of `path`, creating it if needed.
pub fn touch(path: &Path) -> Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to touch {}", path.display()))?;
    file.set_modified(std::time::SystemTime::now())
        .with_context(|| format!("Failed to touch {}", path.display()))
}

/// Copies a file, creating the parent directory of `dst`.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} -> {}", src.display(), dst.display()))?;
    Ok(())
}

/// Whether the file name of `path` matches a simple glob
/// (`*` wildcards only, e.g. `*.pyc`).
pub fn matches_glob(name: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return name == pattern;
    }
    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = name.strip_prefix(first) else {
        return false;
    };
    let last = rest.len() - 1;
    for (i, part) in rest.iter().enumerate() {
        if i == last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// Recursively copies `src` into `dst`. Entries whose file name matches one
/// of `ignore` are skipped together with their contents. With `symlinks`,
/// links are recreated instead of followed.
pub fn copy_tree(src: &Path, dst: &Path, symlinks: bool, ignore: &[&str]) -> Result<()> {
    let walker = WalkDir::new(src)
        .follow_links(!symlinks)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let name = e.file_name().to_string_lossy();
                !ignore.iter().any(|p| matches_glob(&name, p))
            }
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            remove_file_if_exists(&target)?;
            symlink(&link, &target)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            remove_file_if_exists(&target)?;
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Entries directly inside `dir`, sorted. A missing `dir` is empty.
pub fn list_dir(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

/// All regular files and links below `dir` whose name matches `pattern`.
pub fn find_files(dir: &Path, pattern: &str) -> Vec<std::path::PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .filter(|e| matches_glob(&e.file_name().to_string_lossy(), pattern))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
