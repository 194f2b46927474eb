//! Revision of llvm-project this toolchain is built from.

use anyhow::{Context, Result};
use regex::Regex;

const PATCH_LEVEL: &str = "0";
const SVN_REVISION: &str = "r487747";
const GIT_SHA: &str = "c4c5e79dd4b4c78eee7cffd9b0d7394b5bedcf12";

const SVN_REVISION_NEXT: &str = "r99999999";
const GIT_SHA_NEXT: &str = "refs/for/master";

/// Selected once from the command line and passed around by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AndroidVersion {
    pub llvm_next: bool,
}

impl AndroidVersion {
    pub fn new(llvm_next: bool) -> Self {
        Self { llvm_next }
    }

    pub fn svn_revision(self) -> &'static str {
        if self.llvm_next {
            SVN_REVISION_NEXT
        } else {
            SVN_REVISION
        }
    }

    pub fn git_sha(self) -> &'static str {
        if self.llvm_next {
            GIT_SHA_NEXT
        } else {
            GIT_SHA
        }
    }

    pub fn patch_level(self) -> Option<&'static str> {
        if self.llvm_next {
            None
        } else {
            Some(PATCH_LEVEL)
        }
    }

    /// Numeric part of the revision: `r383902b1` -> `383902`.
    pub fn svn_revision_number(self) -> Result<u64> {
        parse_svn_revision_number(self.svn_revision())
    }
}

fn parse_svn_revision_number(revision: &str) -> Result<u64> {
    let re = Regex::new(r"^r(\d+)([a-z]\d*)?$")?;
    let caps = re
        .captures(revision)
        .with_context(|| format!("Invalid svn revision: {revision}"))?;
    caps[1]
        .parse()
        .with_context(|| format!("Invalid svn revision: {revision}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_version() {
        let version = AndroidVersion::default();
        assert_eq!(version.svn_revision(), "r487747");
        assert_eq!(version.patch_level(), Some("0"));
        assert_eq!(version.svn_revision_number().unwrap(), 487_747);
    }

    #[test]
    fn test_llvm_next() {
        let version = AndroidVersion::new(true);
        assert_eq!(version.svn_revision(), "r99999999");
        assert_eq!(version.git_sha(), "refs/for/master");
        assert_eq!(version.patch_level(), None);
    }

    #[test]
    fn test_revision_suffixes() {
        assert_eq!(parse_svn_revision_number("r383902b1").unwrap(), 383_902);
        assert_eq!(parse_svn_revision_number("r383902b").unwrap(), 383_902);
        assert!(parse_svn_revision_number("383902").is_err());
        assert!(parse_svn_revision_number("r38x3902").is_err());
    }
}
