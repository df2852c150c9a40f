//! File enumeration and content identity.
//!
//! Walks the root once per run, applies the ignore filter, hashes file
//! bytes with SHA-256 and classifies each file by kind. Content hash, not
//! mtime, is the cache invalidation key: mtime goes stale across checkouts
//! and restores while content does not.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::ignore::IgnoreFilter;
use crate::parser::SourceLanguage;
use crate::report::Finding;

const MAX_WALK_DEPTH: usize = 32;

/// Manifest grammars the dependency analyzer understands. A closed set;
/// adding a format means adding a parser variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFormat {
    PackageJson,
    RequirementsTxt,
    PyprojectToml,
    CargoToml,
}

impl ManifestFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "package.json" => Some(Self::PackageJson),
            "requirements.txt" => Some(Self::RequirementsTxt),
            "pyproject.toml" => Some(Self::PyprojectToml),
            "Cargo.toml" => Some(Self::CargoToml),
            _ => None,
        }
    }
}

impl std::fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PackageJson => "package.json",
            Self::RequirementsTxt => "requirements.txt",
            Self::PyprojectToml => "pyproject.toml",
            Self::CargoToml => "Cargo.toml",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Source(SourceLanguage),
    Manifest(ManifestFormat),
    Other,
}

/// One enumerated file. Immutable for the duration of a run; a new scan
/// produces new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the scan root, forward slashes.
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    /// Hex SHA-256 of the file bytes.
    pub hash: String,
    pub mtime: i64,
    pub size: u64,
    pub kind: FileKind,
}

impl SourceFile {
    pub fn language(&self) -> Option<SourceLanguage> {
        match self.kind {
            FileKind::Source(lang) => Some(lang),
            _ => None,
        }
    }
}

/// Result of one enumeration pass. `complete` is false when the walk was
/// cancelled before covering the tree.
#[derive(Debug)]
pub struct ScanOutcome {
    pub files: Vec<SourceFile>,
    pub findings: Vec<Finding>,
    pub complete: bool,
}

pub struct FileIndex;

impl FileIndex {
    /// Enumerate the tree under `root`. Unreadable files become recoverable
    /// findings; an unreadable root is fatal. `cancel` is polled between
    /// files; on cancellation the outcome is marked incomplete.
    pub fn scan(
        root: &Path,
        filter: &IgnoreFilter,
        max_file_bytes: u64,
        cancel: &dyn Fn() -> bool,
    ) -> Result<ScanOutcome, EngineError> {
        if !root.is_dir() {
            return Err(EngineError::Fatal(format!(
                "root {} is not a readable directory",
                root.display()
            )));
        }

        let mut outcome = ScanOutcome {
            files: Vec::new(),
            findings: Vec::new(),
            complete: true,
        };
        Self::walk(root, root, filter, max_file_bytes, cancel, 0, &mut outcome);

        // Deterministic ordering regardless of directory iteration order.
        outcome.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(outcome)
    }

    fn walk(
        root: &Path,
        dir: &Path,
        filter: &IgnoreFilter,
        max_file_bytes: u64,
        cancel: &dyn Fn() -> bool,
        depth: usize,
        outcome: &mut ScanOutcome,
    ) {
        if depth > MAX_WALK_DEPTH {
            return;
        }
        if cancel() {
            outcome.complete = false;
            return;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                let err = EngineError::Io {
                    path: dir.to_path_buf(),
                    message: e.to_string(),
                };
                if let Some(f) = err.into_finding() {
                    outcome.findings.push(f);
                }
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        for path in paths {
            if cancel() {
                outcome.complete = false;
                return;
            }
            if filter.is_ignored(&path) {
                continue;
            }
            if path.is_dir() {
                Self::walk(root, &path, filter, max_file_bytes, cancel, depth + 1, outcome);
                continue;
            }
            match Self::index_file(root, &path, max_file_bytes) {
                Ok(Some(file)) => outcome.files.push(file),
                Ok(None) => {}
                Err(err) => {
                    if let Some(f) = err.into_finding() {
                        outcome.findings.push(f);
                    }
                }
            }
        }
    }

    fn index_file(
        root: &Path,
        path: &Path,
        max_file_bytes: u64,
    ) -> Result<Option<SourceFile>, EngineError> {
        let metadata = fs::metadata(path).map_err(|e| EngineError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if metadata.len() == 0 || metadata.len() > max_file_bytes {
            tracing::debug!(path = %path.display(), size = metadata.len(), "skipping by size");
            return Ok(None);
        }

        let kind = classify(path);
        if kind == FileKind::Other {
            return Ok(None);
        }

        let bytes = fs::read(path).map_err(|e| EngineError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let hash = format!("{:x}", Sha256::digest(&bytes));

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_path_buf();

        Ok(Some(SourceFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            hash,
            mtime,
            size: metadata.len(),
            kind,
        }))
    }
}

fn classify(path: &Path) -> FileKind {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(format) = ManifestFormat::from_file_name(name) {
            return FileKind::Manifest(format);
        }
    }
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(lang) = SourceLanguage::from_extension(ext) {
            return FileKind::Source(lang);
        }
    }
    FileKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_cancel() -> bool {
        false
    }

    #[test]
    fn scan_orders_by_relative_path_and_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/util.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let filter = IgnoreFilter::new(dir.path(), None);
        let outcome = FileIndex::scan(dir.path(), &filter, 10_000_000, &never_cancel).unwrap();

        assert!(outcome.complete);
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.files[0].relative_path, PathBuf::from("app.py"));
        // Identical content hashes identically regardless of path.
        assert_eq!(outcome.files[0].hash, outcome.files[1].hash);
        assert_eq!(outcome.files[0].hash.len(), 64);
    }

    #[test]
    fn manifests_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let filter = IgnoreFilter::new(dir.path(), None);
        let outcome = FileIndex::scan(dir.path(), &filter, 10_000_000, &never_cancel).unwrap();

        let kinds: Vec<FileKind> = outcome.files.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&FileKind::Manifest(ManifestFormat::PackageJson)));
        assert!(kinds.contains(&FileKind::Manifest(ManifestFormat::CargoToml)));
        // notes.txt is neither source nor manifest.
        assert_eq!(outcome.files.len(), 2);
    }

    #[test]
    fn missing_root_is_fatal() {
        let filter = IgnoreFilter::new(Path::new("/nonexistent-root-xyz"), None);
        let err = FileIndex::scan(
            Path::new("/nonexistent-root-xyz"),
            &filter,
            10_000_000,
            &never_cancel,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn cancellation_marks_outcome_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();

        let filter = IgnoreFilter::new(dir.path(), None);
        let outcome = FileIndex::scan(dir.path(), &filter, 10_000_000, &|| true).unwrap();
        assert!(!outcome.complete);
        assert!(outcome.files.is_empty());
    }
}
