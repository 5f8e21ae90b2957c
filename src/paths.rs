//! Discovery of manifest and lock files: `Berksfile`/`Berksfile.lock` or
//! `Policyfile.rb`/`Policyfile.lock.json`, searched from a starting
//! directory upward, mirroring the teacher's `find_gemfile`/`find_lockfile`
//! priority chain.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Berksfile,
    Policyfile,
}

#[derive(Debug, Clone)]
pub struct ManifestPaths {
    pub kind: ManifestKind,
    pub manifest: PathBuf,
    pub lockfile: PathBuf,
}

const BERKSFILE_NAMES: &[&str] = &["Berksfile"];
const POLICYFILE_NAMES: &[&str] = &["Policyfile.rb"];

/// Search `start` and its ancestors for a manifest file, preferring a
/// `Berksfile` over a `Policyfile.rb` at the same directory level.
#[must_use]
pub fn find_manifest(start: &Path) -> Option<ManifestPaths> {
    for dir in start.ancestors() {
        for name in BERKSFILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(ManifestPaths {
                    kind: ManifestKind::Berksfile,
                    lockfile: dir.join("Berksfile.lock"),
                    manifest: candidate,
                });
            }
        }
        for name in POLICYFILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(ManifestPaths {
                    kind: ManifestKind::Policyfile,
                    lockfile: dir.join("Policyfile.lock.json"),
                    manifest: candidate,
                });
            }
        }
    }
    None
}

/// The default cookbook-cache directory under the given cache root.
#[must_use]
pub fn cookbooks_cache_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("cookbooks")
}

/// The default git-checkout cache directory under the given cache root.
#[must_use]
pub fn git_cache_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_berksfile_over_policyfile_in_same_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Berksfile"), "").unwrap();
        std::fs::write(dir.path().join("Policyfile.rb"), "").unwrap();

        let found = find_manifest(dir.path()).unwrap();
        assert_eq!(found.kind, ManifestKind::Berksfile);
        assert_eq!(found.lockfile.file_name().unwrap(), "Berksfile.lock");
    }

    #[test]
    fn finds_policyfile_when_no_berksfile_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Policyfile.rb"), "").unwrap();

        let found = find_manifest(dir.path()).unwrap();
        assert_eq!(found.kind, ManifestKind::Policyfile);
        assert_eq!(found.lockfile.file_name().unwrap(), "Policyfile.lock.json");
    }

    #[test]
    fn searches_ancestor_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Berksfile"), "").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_manifest(&nested).unwrap();
        assert_eq!(found.manifest, dir.path().join("Berksfile"));
    }

    #[test]
    fn returns_none_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_manifest(dir.path()).is_none());
    }
}
