use globset::GlobSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Deterministic ignore patterns: built-ins plus the project's own
/// `.gitignore`. Global and parent gitignores are intentionally not read so
/// two machines scanning the same tree agree on the file set.
#[derive(Debug, Clone)]
pub struct Patterns {
    pub root: PathBuf,
    pub entries: HashSet<String>,
}

// Directories and files that are never project source: vendored
// environments, caches, VCS metadata, build outputs, binary artifacts.
const BUILTIN: &[&str] = &[
    // Build outputs
    "target/",
    "build/",
    "dist/",
    "out/",
    "_build/",
    "coverage/",
    ".next/",
    ".output/",
    // Package managers / vendored environments
    "node_modules/",
    ".venv/",
    "venv/",
    ".cargo/",
    "vendor/",
    "site-packages/",
    // VCS
    ".git/",
    ".svn/",
    ".hg/",
    // Editor artefacts
    ".vscode/",
    ".idea/",
    "*.swp",
    "*~",
    ".DS_Store",
    // Caches and temp
    "__pycache__/",
    ".pytest_cache/",
    ".mypy_cache/",
    ".repohealth-cache/",
    "tmp/",
    "*.tmp",
    "*.log",
    "*.bak",
    // Binary blobs
    "*.pyc",
    "*.pyo",
    "*.o",
    "*.so",
    "*.dylib",
    "*.dll",
    "*.exe",
    "*.class",
    "*.wasm",
    "*.min.js",
];

impl Patterns {
    pub fn load(root: &Path) -> Self {
        let mut entries = HashSet::new();
        for p in BUILTIN {
            entries.insert((*p).to_string());
        }

        let gitignore_path = root.join(".gitignore");
        if gitignore_path.exists() {
            match std::fs::read_to_string(&gitignore_path) {
                Ok(content) => {
                    for line in content.lines() {
                        let line = line.trim();
                        if !line.is_empty() && !line.starts_with('#') && !line.starts_with('!') {
                            entries.insert(line.to_string());
                        }
                    }
                }
                Err(_) => {
                    tracing::warn!(path = %gitignore_path.display(), "cannot read .gitignore");
                }
            }
        }

        Self {
            root: root.to_path_buf(),
            entries,
        }
    }
}

/// Combined ignore filter: built-in/.gitignore patterns plus the run's
/// configured exclude globs.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: PathBuf,
    patterns: Patterns,
    globset: Option<GlobSet>,
}

impl IgnoreFilter {
    pub fn new(root: &Path, exclude_globs: Option<GlobSet>) -> Self {
        Self {
            root: root.to_path_buf(),
            patterns: Patterns::load(root),
            globset: exclude_globs,
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if let Some(gs) = &self.globset {
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            if gs.is_match(rel) || gs.is_match(path) {
                return true;
            }
        }
        matches(&self.patterns, &self.root, path)
    }
}

fn matches(patterns: &Patterns, root: &Path, path: &Path) -> bool {
    let relative_path = match path.strip_prefix(root) {
        Ok(rel) => rel,
        // Outside the root entirely; never descend.
        Err(_) => return true,
    };
    let path_str = relative_path.to_string_lossy().replace('\\', "/");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    for pattern in &patterns.entries {
        if let Some(dir) = pattern.strip_suffix('/') {
            if path_str == dir
                || path_str.starts_with(&format!("{dir}/"))
                || path_str.contains(&format!("/{dir}/"))
                || path_str.ends_with(&format!("/{dir}"))
            {
                return true;
            }
        } else if pattern.contains('*') {
            if glob_match(&file_name, pattern) || glob_match(&path_str, pattern) {
                return true;
            }
        } else if path_str == *pattern
            || file_name == *pattern
            || path_str.ends_with(&format!("/{pattern}"))
        {
            return true;
        }
    }
    false
}

/// Minimal `*` matcher for gitignore-style entries and root-symbol name
/// patterns; `?` and character classes are not supported.
pub(crate) fn glob_match(text: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return text == pattern;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            if !text[pos..].ends_with(part) {
                return false;
            }
        } else if let Some(found) = text[pos..].find(part) {
            pos += found + part.len();
        } else {
            return false;
        }
    }
    true
}
