use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::time::Duration;

use crate::report::Severity;

/// Which analyzers a run executes. `All` is the default surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerSelection {
    All,
    Only(Vec<String>),
}

impl AnalyzerSelection {
    pub fn enabled(&self, id: &str) -> bool {
        match self {
            AnalyzerSelection::All => true,
            AnalyzerSelection::Only(ids) => ids.iter().any(|x| x == id),
        }
    }
}

/// Engine tunables. Every open-question constant from the design material is
/// a field here rather than a hard-coded value.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub root: PathBuf,
    pub exclude_globs: Vec<String>,
    pub analyzers: AnalyzerSelection,
    pub severity_floor: Severity,
    pub cache_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub strict: bool,

    /// Jaccard overlap of fingerprint sets above which two blocks are
    /// grouped as near-duplicates.
    pub duplicate_similarity: f64,
    /// Blocks with fewer normalized statements are never fingerprinted.
    pub duplicate_min_statements: usize,
    pub complexity_threshold: u32,
    /// Glob-style name patterns treated as dead-code roots.
    pub dead_code_roots: Vec<String>,
    /// Opt-in qualified-name mode for global-state tracking.
    pub qualified_globals: bool,
    /// Bare names shorter than this are suppressed by the global-state
    /// analyzer (known false-positive source).
    pub global_min_name_len: usize,

    pub max_file_bytes: u64,
    pub cache_max_entries: usize,
    pub memory_limit_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            exclude_globs: Vec::new(),
            analyzers: AnalyzerSelection::All,
            severity_floor: Severity::Low,
            cache_dir: None,
            timeout: None,
            strict: false,

            duplicate_similarity: 0.85,
            duplicate_min_statements: 4,
            complexity_threshold: 10,
            dead_code_roots: vec![
                "main".to_string(),
                "__*__".to_string(),
                "test_*".to_string(),
                "Test*".to_string(),
                "setup".to_string(),
            ],
            qualified_globals: false,
            global_min_name_len: 4,

            max_file_bytes: 10_000_000,
            cache_max_entries: 65_536,
            memory_limit_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Layered loading: defaults, then environment variables, then an
    /// optional JSON config file pointed at by `REPOHEALTH_CONFIG_FILE`
    /// (or `.repohealth.json` in the root).
    pub fn load(root: PathBuf) -> Self {
        let mut cfg = EngineConfig {
            root,
            ..EngineConfig::default()
        };
        cfg.apply_env();
        cfg.apply_config_file();
        cfg
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("REPOHEALTH_SIMILARITY") {
            if let Ok(v) = val.parse::<f64>() {
                self.duplicate_similarity = v.clamp(0.1, 1.0);
            }
        }
        if let Ok(val) = std::env::var("REPOHEALTH_MIN_BLOCK") {
            if let Ok(v) = val.parse::<usize>() {
                self.duplicate_min_statements = v.max(2);
            }
        }
        if let Ok(val) = std::env::var("REPOHEALTH_COMPLEXITY_THRESHOLD") {
            if let Ok(v) = val.parse::<u32>() {
                self.complexity_threshold = v.max(2);
            }
        }
        if let Ok(val) = std::env::var("REPOHEALTH_EXCLUDE") {
            let globs: Vec<String> = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            self.exclude_globs.extend(globs);
        }
        if let Ok(val) = std::env::var("REPOHEALTH_MEMORY_LIMIT_MB") {
            if let Ok(v) = val.parse::<u64>() {
                self.memory_limit_bytes = v.saturating_mul(1024 * 1024);
            }
        }
        if let Ok(val) = std::env::var("REPOHEALTH_QUALIFIED_GLOBALS") {
            self.qualified_globals = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    fn apply_config_file(&mut self) {
        let path = std::env::var("REPOHEALTH_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.root.join(".repohealth.json"));
        let Ok(text) = std::fs::read_to_string(&path) else {
            return;
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
            tracing::warn!(path = %path.display(), "ignoring malformed config file");
            return;
        };

        if let Some(v) = json.get("duplicate_similarity").and_then(|v| v.as_f64()) {
            self.duplicate_similarity = v.clamp(0.1, 1.0);
        }
        if let Some(v) = json.get("duplicate_min_statements").and_then(|v| v.as_u64()) {
            self.duplicate_min_statements = (v as usize).max(2);
        }
        if let Some(v) = json.get("complexity_threshold").and_then(|v| v.as_u64()) {
            self.complexity_threshold = (v as u32).max(2);
        }
        if let Some(list) = json.get("exclude_globs").and_then(|v| v.as_array()) {
            for it in list {
                if let Some(s) = it.as_str() {
                    self.exclude_globs.push(s.to_string());
                }
            }
        }
        if let Some(list) = json.get("dead_code_roots").and_then(|v| v.as_array()) {
            let roots: Vec<String> = list
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if !roots.is_empty() {
                self.dead_code_roots = roots;
            }
        }
        if let Some(v) = json.get("qualified_globals").and_then(|v| v.as_bool()) {
            self.qualified_globals = v;
        }
        if let Some(v) = json.get("global_min_name_len").and_then(|v| v.as_u64()) {
            self.global_min_name_len = v as usize;
        }
    }

    /// Build a globset from the configured exclude patterns; invalid globs
    /// are skipped with a warning rather than failing the run.
    pub fn exclude_globset(&self) -> Option<GlobSet> {
        if self.exclude_globs.is_empty() {
            return None;
        }
        let mut builder = GlobSetBuilder::new();
        let mut any = false;
        for pat in &self.exclude_globs {
            match Glob::new(pat) {
                Ok(g) => {
                    builder.add(g);
                    any = true;
                }
                Err(e) => tracing::warn!(pattern = %pat, "invalid exclude glob: {e}"),
            }
        }
        if any {
            builder.build().ok()
        } else {
            None
        }
    }

    /// Resolved cache store directory: explicit setting, or
    /// `<root>/.repohealth-cache`.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.root.join(".repohealth-cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert!(cfg.duplicate_similarity > 0.5);
        assert!(cfg.duplicate_min_statements >= 2);
        assert_eq!(cfg.complexity_threshold, 10);
        assert!(cfg.analyzers.enabled("complexity"));
    }

    #[test]
    fn selection_filters_by_id() {
        let sel = AnalyzerSelection::Only(vec!["duplicates".to_string()]);
        assert!(sel.enabled("duplicates"));
        assert!(!sel.enabled("dead_code"));
    }

    #[test]
    fn exclude_globset_skips_invalid_patterns() {
        let cfg = EngineConfig {
            exclude_globs: vec!["**/vendor/**".to_string(), "[".to_string()],
            ..EngineConfig::default()
        };
        let set = cfg.exclude_globset().expect("one valid glob");
        assert!(set.is_match("a/vendor/b.py"));
        assert!(!set.is_match("a/src/b.py"));
    }
}
