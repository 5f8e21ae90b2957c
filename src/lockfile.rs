//! Lock file: dual-serialized as machine JSON (keyed by source URL) and a
//! Ruby-compatible text format with a `GRAPH` section, mirroring the
//! teacher's hand-rolled Gemfile.lock writer/parser.

use crate::resolver::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const LOCKFILE_REVISION: u32 = 7;

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("lockfile I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lockfile JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lockfile revision {found} is incompatible with {LOCKFILE_REVISION}")]
    RevisionMismatch { found: u32 },

    #[error("malformed Ruby-format lockfile at line {line}: {message}")]
    MalformedText { line: usize, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedCookbook {
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LockedSource {
    #[serde(default)]
    pub cookbooks: BTreeMap<String, LockedCookbook>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub revision: u32,
    #[serde(with = "rfc3339_unix_seconds")]
    pub generated_at: u64,
    pub sources: BTreeMap<String, LockedSource>,
}

/// Serializes a unix-seconds timestamp as an RFC3339 string on the wire,
/// per the lock file JSON schema, while keeping plain `u64` arithmetic
/// (`is_outdated`, test fixtures) everywhere else in this module.
mod rfc3339_unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        let datetime = DateTime::<Utc>::from_timestamp(i64::try_from(*value).unwrap_or(0), 0)
            .unwrap_or_default();
        serializer.serialize_str(&datetime.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        let datetime = DateTime::parse_from_rfc3339(&text).map_err(serde::de::Error::custom)?;
        Ok(u64::try_from(datetime.timestamp()).unwrap_or(0))
    }
}

impl LockFile {
    #[must_use]
    pub fn from_resolution(resolution: &Resolution, generated_at: u64) -> Self {
        let mut sources: BTreeMap<String, LockedSource> = BTreeMap::new();

        for cookbook in resolution.cookbooks.values() {
            let source_key = cookbook.source_location.label();
            let entry = sources.entry(source_key).or_default();
            entry.cookbooks.insert(
                cookbook.name.clone(),
                LockedCookbook {
                    version: cookbook.version.to_string(),
                    dependencies: cookbook
                        .dependencies
                        .iter()
                        .map(|(name, version)| (name.clone(), version.to_string()))
                        .collect(),
                    checksum: None,
                },
            );
        }

        Self {
            revision: LOCKFILE_REVISION,
            generated_at,
            sources,
        }
    }

    /// # Errors
    ///
    /// Returns [`LockfileError::Json`] if serialization fails or
    /// [`LockfileError::Io`] if the atomic write fails.
    pub fn save_json(&self, path: &Path) -> Result<(), LockfileError> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`LockfileError::Io`] on read failure, [`LockfileError::Json`]
    /// on malformed JSON, or [`LockfileError::RevisionMismatch`] if the
    /// on-disk revision doesn't match [`LOCKFILE_REVISION`].
    pub fn load_json(path: &Path) -> Result<Self, LockfileError> {
        let bytes = std::fs::read(path)?;
        let lockfile: Self = serde_json::from_slice(&bytes)?;
        if lockfile.revision != LOCKFILE_REVISION {
            return Err(LockfileError::RevisionMismatch {
                found: lockfile.revision,
            });
        }
        Ok(lockfile)
    }

    /// Render the Ruby-compatible text format: a top-level dependency list
    /// followed by a `GRAPH` section listing every locked cookbook and its
    /// dependencies, sorted for byte-stable output across repeat runs with
    /// unchanged inputs.
    #[must_use]
    pub fn to_ruby_text(&self) -> String {
        let mut out = String::new();
        out.push_str("GRAPH\n");
        for source in self.sources.values() {
            for (name, locked) in &source.cookbooks {
                out.push_str(&format!("  {name} ({})\n", locked.version));
                for (dep_name, dep_version) in &locked.dependencies {
                    out.push_str(&format!("    {dep_name} ({dep_version})\n"));
                }
            }
        }

        out.push_str("\nDEPENDENCIES\n");
        let mut names: Vec<&String> = self
            .sources
            .values()
            .flat_map(|s| s.cookbooks.keys())
            .collect();
        names.sort();
        names.dedup();
        for name in names {
            out.push_str(&format!("  {name}\n"));
        }

        out
    }

    /// Parse the Ruby-compatible text format back into locked cookbooks,
    /// grouped under a single synthetic source since the text format
    /// doesn't preserve per-cookbook source URLs.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError::MalformedText`] on a line that doesn't fit
    /// the `GRAPH`/`DEPENDENCIES` section grammar.
    pub fn parse_ruby_text(text: &str) -> Result<BTreeMap<String, LockedCookbook>, LockfileError> {
        let mut cookbooks = BTreeMap::new();
        let mut in_graph = false;
        let mut current_name: Option<String> = None;

        for (i, raw_line) in text.lines().enumerate() {
            let line_no = i + 1;
            if raw_line.trim() == "GRAPH" {
                in_graph = true;
                continue;
            }
            if raw_line.trim() == "DEPENDENCIES" {
                in_graph = false;
                continue;
            }
            if !in_graph || raw_line.trim().is_empty() {
                continue;
            }

            let indent = raw_line.len() - raw_line.trim_start().len();
            let trimmed = raw_line.trim();
            let Some(open) = trimmed.find('(') else {
                return Err(LockfileError::MalformedText {
                    line: line_no,
                    message: format!("expected a '(version)' suffix in '{trimmed}'"),
                });
            };
            let Some(close) = trimmed.find(')') else {
                return Err(LockfileError::MalformedText {
                    line: line_no,
                    message: format!("unterminated version in '{trimmed}'"),
                });
            };
            let name = trimmed.get(..open).unwrap_or("").trim().to_string();
            let version = trimmed.get(open + 1..close).unwrap_or("").to_string();

            if indent <= 2 {
                cookbooks.insert(
                    name.clone(),
                    LockedCookbook {
                        version,
                        dependencies: BTreeMap::new(),
                        checksum: None,
                    },
                );
                current_name = Some(name);
            } else if let Some(parent) = &current_name {
                if let Some(entry) = cookbooks.get_mut(parent) {
                    entry.dependencies.insert(name, version);
                }
            }
        }

        Ok(cookbooks)
    }

    /// True if `manifest_mtime` is newer than when this lock was
    /// generated, meaning the lock may be stale.
    #[must_use]
    pub fn is_outdated(&self, manifest_mtime: u64) -> bool {
        manifest_mtime > self.generated_at
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), LockfileError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lockfile() -> LockFile {
        let mut sources = BTreeMap::new();
        let mut cookbooks = BTreeMap::new();
        cookbooks.insert(
            "nginx".to_string(),
            LockedCookbook {
                version: "2.7.6".to_string(),
                dependencies: BTreeMap::from([("apt".to_string(), "1.0.0".to_string())]),
                checksum: None,
            },
        );
        sources.insert(
            "https://supermarket.chef.io".to_string(),
            LockedSource { cookbooks },
        );
        LockFile {
            revision: LOCKFILE_REVISION,
            generated_at: 1_700_000_000,
            sources,
        }
    }

    #[test]
    fn json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Berksfile.lock");
        let lockfile = sample_lockfile();
        lockfile.save_json(&path).unwrap();
        let loaded = LockFile::load_json(&path).unwrap();
        assert_eq!(loaded.revision, lockfile.revision);
        assert_eq!(
            loaded.sources["https://supermarket.chef.io"].cookbooks["nginx"].version,
            "2.7.6"
        );
    }

    #[test]
    fn revision_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Berksfile.lock");
        let mut lockfile = sample_lockfile();
        lockfile.revision = 99;
        lockfile.save_json(&path).unwrap();
        let err = LockFile::load_json(&path).unwrap_err();
        assert!(matches!(err, LockfileError::RevisionMismatch { found: 99 }));
    }

    #[test]
    fn ruby_text_round_trips_graph_section() {
        let lockfile = sample_lockfile();
        let text = lockfile.to_ruby_text();
        let parsed = LockFile::parse_ruby_text(&text).unwrap();
        assert_eq!(parsed["nginx"].version, "2.7.6");
        assert_eq!(parsed["nginx"].dependencies["apt"], "1.0.0");
    }

    #[test]
    fn repeat_save_is_byte_identical() {
        let lockfile = sample_lockfile();
        assert_eq!(lockfile.to_ruby_text(), lockfile.to_ruby_text());
    }

    #[test]
    fn outdated_when_manifest_newer() {
        let lockfile = sample_lockfile();
        assert!(lockfile.is_outdated(lockfile.generated_at + 1));
        assert!(!lockfile.is_outdated(lockfile.generated_at));
    }
}
