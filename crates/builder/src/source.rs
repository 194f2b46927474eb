//! llvm-project source setup: copy or clone, patch, swap into place.

use crate::constants::UPSTREAM_LLVM_URL;
use crate::fs_util::{copy_tree, remove_dir_if_exists};
use crate::process::{arg, Cmd};
use crate::session::Session;
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const SCRIPTS_URL: &str = "https://android.googlesource.com/toolchain/llvm_android";

/// Half-open `[from, until)` range of svn revisions a patch applies to.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct VersionRange {
    #[serde(default)]
    pub from: Option<u64>,
    #[serde(default)]
    pub until: Option<u64>,
}

impl VersionRange {
    pub fn contains(&self, revision: u64) -> bool {
        let after_start = self.from.map_or(true, |from| from <= revision);
        let before_end = self.until.map_or(true, |until| revision < until);
        after_start && before_end
    }
}

/// One entry of `PATCHES.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchItem {
    pub rel_patch_path: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub version_range: VersionRange,
}

impl PatchItem {
    /// Patches without a platform list apply everywhere.
    pub fn applies_to(&self, revision: u64) -> bool {
        let for_android = self.platforms.is_empty() || self.platforms.iter().any(|p| p == "android");
        for_android && self.version_range.contains(revision)
    }
}

pub fn patches_dir(cx: &Session) -> PathBuf {
    cx.paths.scripts_dir().join("patches")
}

pub fn load_patches(json_file: &Path) -> Result<Vec<PatchItem>> {
    let text = fs::read_to_string(json_file)
        .with_context(|| format!("Failed to read {}", json_file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", json_file.display()))
}

/// Patches for `revision`, in file order.
pub fn applicable_patches(patches: &[PatchItem], revision: u64) -> Vec<&PatchItem> {
    patches.iter().filter(|p| p.applies_to(revision)).collect()
}

/// Markdown listing the base revision and every applied patch. Patch links
/// keep a `{{scripts_sha}}` placeholder filled in at packaging time.
pub fn source_info(base_revision: &str, applied: &[&PatchItem]) -> String {
    let upstream = UPSTREAM_LLVM_URL.trim_end_matches(".git");
    let mut info = format!(
        "# Clang source information\n\n\
         Base revision: [{base_revision}]({upstream}/commits/{base_revision})\n"
    );
    if !applied.is_empty() {
        info.push_str("\nApplied patches:\n\n");
        for patch in applied {
            info.push_str(&format!(
                "- [{path}]({SCRIPTS_URL}/+/{{{{scripts_sha}}}}/patches/{path})\n",
                path = patch.rel_patch_path
            ));
        }
    }
    info
}

/// Applies the patches for the current revision and returns them.
fn apply_patches(cx: &Session, source_dir: &Path) -> Result<Vec<PatchItem>> {
    let dir = patches_dir(cx);
    let patches = load_patches(&dir.join("PATCHES.json"))?;
    let revision = cx.android_version.svn_revision_number()?;
    let applicable: Vec<PatchItem> = applicable_patches(&patches, revision)
        .into_iter()
        .cloned()
        .collect();
    info!("Applying {} of {} patches for r{revision}", applicable.len(), patches.len());
    for patch in &applicable {
        Cmd::new(["patch", "-p1", "-i"])
            .arg(arg(dir.join(&patch.rel_patch_path)))
            .cwd(source_dir)
            .run()
            .with_context(|| format!("Failed to apply {}", patch.rel_patch_path))?;
    }
    Ok(applicable)
}

/// Prepares `out/llvm-project`.
///
/// The tree is assembled in `llvm-project.tmp` and only replaces the
/// previous one once it has been fully patched.
pub fn setup_sources(cx: &Session, llvm_rev: Option<&str>, skip_apply_patches: bool) -> Result<()> {
    let dest = cx.paths.llvm_path();
    let tmp = cx.paths.out_dir.join("llvm-project.tmp");
    remove_dir_if_exists(&tmp)?;
    fs::create_dir_all(&cx.paths.out_dir)
        .with_context(|| format!("Failed to create {}", cx.paths.out_dir.display()))?;

    if let Some(rev) = llvm_rev {
        println!("Cloning {UPSTREAM_LLVM_URL} @ {rev}...");
        Cmd::new(["git", "clone", UPSTREAM_LLVM_URL])
            .arg(arg(&tmp))
            .run()?;
        Cmd::new(["git", "checkout", rev]).cwd(&tmp).run()?;
    } else {
        let src = cx.paths.toolchain_llvm_path();
        println!("Copying {}...", src.display());
        copy_tree(&src, &tmp, true, &[".git"])?;
    }

    let applied = if skip_apply_patches {
        Vec::new()
    } else {
        apply_patches(cx, &tmp)?
    };
    let base_revision = llvm_rev.unwrap_or(cx.android_version.git_sha());
    let info_file = cx.paths.out_dir.join("clang_source_info.md");
    fs::write(&info_file, source_info(base_revision, &applied.iter().collect::<Vec<_>>()))
        .with_context(|| format!("Failed to write {}", info_file.display()))?;

    remove_dir_if_exists(&dest)?;
    fs::rename(&tmp, &dest)
        .with_context(|| format!("Failed to move {} to {}", tmp.display(), dest.display()))?;
    info!("Sources ready at {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCHES: &str = r#"[
        {
            "metadata": {"title": "fix a"},
            "platforms": ["android", "chromiumos"],
            "rel_patch_path": "cherry/aaaa.patch",
            "version_range": {"from": 480000, "until": 490000}
        },
        {
            "metadata": {"title": "local"},
            "platforms": ["android"],
            "rel_patch_path": "local.patch",
            "version_range": {"from": 400000, "until": null}
        },
        {
            "platforms": ["chromiumos"],
            "rel_patch_path": "cherry/bbbb.patch",
            "version_range": {"from": 480000}
        },
        {
            "rel_patch_path": "cherry/cccc.patch",
            "version_range": {"until": 487747}
        }
    ]"#;

    #[test]
    fn test_version_range_is_half_open() {
        let range = VersionRange {
            from: Some(10),
            until: Some(20),
        };
        assert!(!range.contains(9));
        assert!(range.contains(10));
        assert!(range.contains(19));
        assert!(!range.contains(20));
        assert!(VersionRange::default().contains(0));
    }

    #[test]
    fn test_applicable_patches() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("PATCHES.json");
        fs::write(&json, PATCHES).unwrap();
        let patches = load_patches(&json).unwrap();
        assert_eq!(patches.len(), 4);

        let names: Vec<&str> = applicable_patches(&patches, 487_747)
            .iter()
            .map(|p| p.rel_patch_path.as_str())
            .collect();
        assert_eq!(names, vec!["cherry/aaaa.patch", "local.patch"]);
    }

    #[test]
    fn test_source_info() {
        let patch = PatchItem {
            rel_patch_path: "cherry/aaaa.patch".to_string(),
            platforms: vec![],
            version_range: VersionRange::default(),
        };
        let info = source_info("deadbeef", &[&patch]);
        assert!(info.contains("Base revision: [deadbeef]("));
        assert!(info.contains("/+/{{scripts_sha}}/patches/cherry/aaaa.patch)"));

        let bare = source_info("deadbeef", &[]);
        assert!(!bare.contains("Applied patches"));
    }

    #[test]
    fn test_load_patches_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("PATCHES.json");
        fs::write(&json, "{").unwrap();
        let err = load_patches(&json).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
