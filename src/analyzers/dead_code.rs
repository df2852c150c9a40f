//! Dead-code candidates via reachability over the symbol graph.
//!
//! Breadth-first traversal from the configured root set over resolved
//! edges; the graph is static per run, so this is a single reachability
//! computation, not an iterative fixed point. Symbols whose bare name
//! matches any unresolved reference are "possibly referenced" and never
//! flagged; this trades recall for fewer false positives under dynamic
//! dispatch.

use std::collections::{HashSet, VecDeque};

use super::{Analyzer, AnalyzerContext};
use crate::error::EngineError;
use crate::graph::{SymbolGraph, SymbolId};
use crate::ignore::glob_match;
use crate::parser::SymbolKind;
use crate::report::{Category, Finding, Severity};

pub struct DeadCodeAnalyzer;

const ID: &str = "dead_code";
const VERSION: u32 = 1;

/// Names so generic that an unreferenced symbol carrying one is as likely
/// a collision as real dead code.
const COMMON_NAMES: &[&str] = &[
    "data", "value", "result", "config", "run", "main", "get", "set", "update", "init", "item",
    "name", "handle", "process", "load", "save",
];

fn is_test_path(path: &std::path::Path) -> bool {
    let s = path.to_string_lossy().replace('\\', "/");
    s.contains("/tests/")
        || s.starts_with("tests/")
        || s.contains("/test_")
        || s.starts_with("test_")
        || s.contains("_test.")
        || s.contains(".test.")
        || s.contains(".spec.")
}

fn root_set(graph: &SymbolGraph, patterns: &[String]) -> HashSet<SymbolId> {
    let mut roots = HashSet::new();
    for symbol in graph.symbols() {
        let by_name = patterns.iter().any(|p| glob_match(&symbol.name, p));
        if by_name || is_test_path(&symbol.file) {
            roots.insert(symbol.id);
        }
    }
    roots.extend(graph.module_level_targets());
    roots
}

fn reachable_from(graph: &SymbolGraph, roots: &HashSet<SymbolId>) -> HashSet<SymbolId> {
    let mut visited: HashSet<SymbolId> = roots.clone();
    let mut frontier: VecDeque<SymbolId> = roots.iter().copied().collect();

    while let Some(id) = frontier.pop_front() {
        // A live symbol keeps its whole scope chain alive.
        let mut scope = graph.symbol(id).scope;
        while let Some(s) = scope {
            if visited.insert(s) {
                frontier.push_back(s);
            }
            scope = graph.symbol(s).scope;
        }
        for &target in graph.outgoing(id) {
            if visited.insert(target) {
                frontier.push_back(target);
            }
        }
    }
    visited
}

fn confidence_for(name: &str) -> f64 {
    if name.len() < 4 || COMMON_NAMES.contains(&name) {
        0.5
    } else {
        0.9
    }
}

impl Analyzer for DeadCodeAnalyzer {
    fn id(&self) -> &'static str {
        ID
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn finalize(&self, ctx: &AnalyzerContext) -> Result<Vec<Finding>, EngineError> {
        let graph = ctx.graph;
        let roots = root_set(graph, &ctx.config.dead_code_roots);
        let reachable = reachable_from(graph, &roots);

        let mut findings = Vec::new();
        for symbol in graph.symbols() {
            if reachable.contains(&symbol.id) {
                continue;
            }
            if graph.is_name_unresolved_target(&symbol.name) {
                // Possibly referenced through a dynamic lookup.
                continue;
            }
            if is_test_path(&symbol.file) {
                continue;
            }

            let confidence = confidence_for(&symbol.name);
            let severity = if confidence >= 0.6 {
                Severity::Medium
            } else {
                Severity::Low
            };
            let what = match symbol.kind {
                SymbolKind::Function => "function",
                SymbolKind::Class => "type",
                SymbolKind::ModuleVar => "module variable",
                SymbolKind::ImportAlias => "import",
            };
            findings.push(
                Finding::new(
                    Category::DeadCode,
                    severity,
                    symbol.file.clone(),
                    format!(
                        "{what} `{}` has no discoverable reference from any root (confidence {confidence:.1})",
                        symbol.qualified_name
                    ),
                    "remove it, or add it to the dead-code root patterns if it is a public entry point",
                )
                .with_line(symbol.line_start)
                .with_evidence(format!("symbol:{}", symbol.id)),
            );
        }

        tracing::debug!(
            symbols = graph.symbol_count(),
            roots = roots.len(),
            reachable = reachable.len(),
            flagged = findings.len(),
            "dead-code reachability complete"
        );
        Ok(findings)
    }
}
