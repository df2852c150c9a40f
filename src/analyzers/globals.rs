//! Cross-file mutable-name usage tracking.
//!
//! A bare name assigned at module scope and used from more than one file
//! is a coupling smell. The default mode intentionally skips qualification
//! (the goal is surfacing coupling, not proving aliasing) and is a known
//! source of false positives for short names, so names below the
//! configured length are suppressed and an opt-in qualified mode narrows
//! matching to uniquely-resolvable definitions.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::{Analyzer, AnalyzerContext};
use crate::error::EngineError;
use crate::parser::SymbolKind;
use crate::report::{Category, Finding, Severity};

pub struct GlobalStateAnalyzer;

const ID: &str = "globals";
const VERSION: u32 = 1;

/// Aggregate usage of one shared name across files.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalUsage {
    pub name: String,
    pub defined_in: PathBuf,
    pub defined_line: usize,
    pub sites: Vec<UsageSite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSite {
    pub file: PathBuf,
    pub line: usize,
    pub is_write: bool,
}

impl Analyzer for GlobalStateAnalyzer {
    fn id(&self) -> &'static str {
        ID
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn finalize(&self, ctx: &AnalyzerContext) -> Result<Vec<Finding>, EngineError> {
        let graph = ctx.graph;
        let min_len = ctx.config.global_min_name_len;

        // Module variables by bare name, with their earliest definition
        // site for the finding anchor.
        let mut module_vars: BTreeMap<&str, (&PathBuf, usize)> = BTreeMap::new();
        for symbol in graph.symbols() {
            if symbol.kind != SymbolKind::ModuleVar {
                continue;
            }
            if symbol.name.len() < min_len {
                continue;
            }
            if ctx.config.qualified_globals && graph.ids_by_name(&symbol.name).len() > 1 {
                // Qualified mode: ambiguous bare names are skipped instead
                // of being lumped together.
                continue;
            }
            let entry = module_vars
                .entry(symbol.name.as_str())
                .or_insert((&symbol.file, symbol.line_start));
            if symbol.file < *entry.0 {
                *entry = (&symbol.file, symbol.line_start);
            }
        }

        let mut usages: BTreeMap<&str, GlobalUsage> = BTreeMap::new();
        for reference in graph.references() {
            let Some(&(defined_in, defined_line)) = module_vars.get(reference.name.as_str())
            else {
                continue;
            };
            let usage = usages
                .entry(reference.name.as_str())
                .or_insert_with(|| GlobalUsage {
                    name: reference.name.clone(),
                    defined_in: defined_in.clone(),
                    defined_line,
                    sites: Vec::new(),
                });
            usage.sites.push(UsageSite {
                file: reference.file.clone(),
                line: reference.line,
                is_write: reference.is_write,
            });
        }

        let mut findings = Vec::new();
        for usage in usages.values() {
            let files: BTreeSet<&PathBuf> = usage.sites.iter().map(|s| &s.file).collect();
            if files.len() < 2 {
                continue;
            }
            let writing_files: BTreeSet<&PathBuf> = usage
                .sites
                .iter()
                .filter(|s| s.is_write)
                .map(|s| &s.file)
                .collect();

            let severity = if writing_files.len() >= 2 {
                Severity::High
            } else {
                Severity::Medium
            };
            let writes = usage.sites.iter().filter(|s| s.is_write).count();
            findings.push(
                Finding::new(
                    Category::GlobalState,
                    severity,
                    usage.defined_in.clone(),
                    format!(
                        "module-level name `{}` is used from {} files ({} writes, {} writing files)",
                        usage.name,
                        files.len(),
                        writes,
                        writing_files.len()
                    ),
                    "centralize the state behind an owner module or pass it explicitly",
                )
                .with_line(usage.defined_line)
                .with_evidence(format!("global:{}", usage.name)),
            );
        }

        tracing::debug!(tracked = usages.len(), flagged = findings.len(), "global-state scan complete");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::OfflineFeed;
    use crate::cache::AnalyzerCache;
    use crate::config::EngineConfig;
    use crate::graph::SymbolGraphBuilder;
    use crate::parser::{parse_source, SourceLanguage};
    use std::collections::HashMap;

    fn run(sources: &[(&str, &str)], config: EngineConfig) -> Vec<Finding> {
        let mut builder = SymbolGraphBuilder::new();
        for (path, src) in sources {
            let module = path.trim_end_matches(".py");
            let parsed = parse_source(module, SourceLanguage::Python, src).unwrap();
            builder.add_file(PathBuf::from(path), parsed);
        }
        let graph = builder.build();
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = AnalyzerCache::open(dir.path(), dir.path(), 10);
        let parsed = HashMap::new();
        let ctx = AnalyzerContext {
            config: &config,
            graph: &graph,
            cache: &cache,
            parsed: &parsed,
            files: &[],
            feed: &OfflineFeed,
        };
        GlobalStateAnalyzer.finalize(&ctx).unwrap()
    }

    #[test]
    fn shared_mutable_name_across_files_is_high() {
        let findings = run(
            &[
                ("state.py", "registry_map = {}\n"),
                ("a.py", "def seed():\n    global registry_map\n    registry_map = {}\n"),
                ("b.py", "def wipe():\n    global registry_map\n    registry_map = {}\n"),
            ],
            EngineConfig::default(),
        );
        let f = findings
            .iter()
            .find(|f| f.message.contains("registry_map"))
            .expect("registry_map flagged");
        assert_eq!(f.severity, Severity::High);
    }

    #[test]
    fn read_only_sharing_is_medium() {
        let findings = run(
            &[
                ("state.py", "settings_table = {}\n"),
                ("a.py", "def read_it():\n    return settings_table\n"),
            ],
            EngineConfig::default(),
        );
        let f = findings
            .iter()
            .find(|f| f.message.contains("settings_table"))
            .expect("settings_table flagged");
        assert_eq!(f.severity, Severity::Medium);
    }

    #[test]
    fn single_file_usage_is_not_flagged() {
        let findings = run(
            &[("state.py", "lonely_value = 1\n\ndef use_it():\n    return lonely_value\n")],
            EngineConfig::default(),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn short_names_are_suppressed() {
        let findings = run(
            &[
                ("state.py", "db = {}\n"),
                ("a.py", "def f():\n    return db\n"),
            ],
            EngineConfig::default(),
        );
        assert!(findings.is_empty());
    }
}
