//! Cross-file symbol graph: definitions, resolved reference edges, and the
//! unresolved-name set that shields dynamic lookups from dead-code flagging.
//!
//! The builder consumes per-file parser output after the parse barrier;
//! the graph is immutable once built.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::parser::{ParsedFile, SourceLanguage, SymbolKind};

pub type SymbolId = u32;

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file: PathBuf,
    pub line_start: usize,
    pub line_end: usize,
    pub scope: Option<SymbolId>,
}

/// A reference edge after graph merge. `from` is the enclosing symbol
/// (None = module-level code, which executes at import time).
#[derive(Debug, Clone)]
pub struct GraphReference {
    pub from: Option<SymbolId>,
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    pub is_write: bool,
}

#[derive(Debug, Default)]
pub struct SymbolGraph {
    symbols: Vec<Symbol>,
    by_bare_name: HashMap<String, Vec<SymbolId>>,
    /// Resolved edges: referencing symbol (or module level) -> target.
    outgoing: HashMap<SymbolId, Vec<SymbolId>>,
    /// Targets referenced from module-level code in any file.
    module_level_targets: HashSet<SymbolId>,
    /// Names referenced anywhere that resolved to no definition. A symbol
    /// whose bare name appears here is "possibly referenced" dynamically.
    unresolved_names: HashSet<String>,
    references: Vec<GraphReference>,
}

impl SymbolGraph {
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn outgoing(&self, id: SymbolId) -> &[SymbolId] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn module_level_targets(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.module_level_targets.iter().copied()
    }

    pub fn is_name_unresolved_target(&self, name: &str) -> bool {
        self.unresolved_names.contains(name)
    }

    pub fn references(&self) -> &[GraphReference] {
        &self.references
    }

    pub fn ids_by_name(&self, name: &str) -> &[SymbolId] {
        self.by_bare_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn symbols_in_file<'a>(&'a self, file: &'a Path) -> impl Iterator<Item = &'a Symbol> {
        self.symbols.iter().filter(move |s| s.file == file)
    }
}

#[derive(Default)]
pub struct SymbolGraphBuilder {
    files: Vec<(PathBuf, ParsedFile)>,
}

impl SymbolGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, relative_path: PathBuf, parsed: ParsedFile) {
        self.files.push((relative_path, parsed));
    }

    /// Merge per-file extractions into one graph. Files are processed in
    /// path order so symbol ids are stable across runs.
    pub fn build(mut self) -> SymbolGraph {
        self.files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut graph = SymbolGraph::default();
        // (file index, raw symbol index) -> global id
        let mut id_map: HashMap<(usize, usize), SymbolId> = HashMap::new();
        // References only resolve to definitions in the same language; a
        // name that matches solely across languages stays unresolved.
        let mut by_lang_name: HashMap<(SourceLanguage, String), Vec<SymbolId>> = HashMap::new();

        for (file_idx, (path, parsed)) in self.files.iter().enumerate() {
            for (raw_idx, raw) in parsed.symbols.iter().enumerate() {
                let id = graph.symbols.len() as SymbolId;
                id_map.insert((file_idx, raw_idx), id);
                graph
                    .by_bare_name
                    .entry(raw.name.clone())
                    .or_default()
                    .push(id);
                by_lang_name
                    .entry((parsed.language, raw.name.clone()))
                    .or_default()
                    .push(id);
                graph.symbols.push(Symbol {
                    id,
                    name: raw.name.clone(),
                    qualified_name: raw.qualified_name.clone(),
                    kind: raw.kind,
                    file: path.clone(),
                    line_start: raw.line_start,
                    line_end: raw.line_end,
                    scope: raw
                        .parent
                        .and_then(|p| id_map.get(&(file_idx, p)).copied()),
                });
            }
        }

        for (file_idx, (path, parsed)) in self.files.iter().enumerate() {
            for reference in &parsed.references {
                let from = reference
                    .from
                    .and_then(|f| id_map.get(&(file_idx, f)).copied());
                graph.references.push(GraphReference {
                    from,
                    name: reference.name.clone(),
                    file: path.clone(),
                    line: reference.line,
                    is_write: reference.is_write,
                });

                match by_lang_name.get(&(parsed.language, reference.name.clone())) {
                    Some(targets) => {
                        // A bare name may resolve to several definitions;
                        // edges go to all candidates (conservative for
                        // reachability).
                        for &target in targets {
                            match from {
                                Some(src) if src != target => {
                                    graph.outgoing.entry(src).or_default().push(target);
                                }
                                None => {
                                    graph.module_level_targets.insert(target);
                                }
                                _ => {}
                            }
                        }
                    }
                    None => {
                        graph.unresolved_names.insert(reference.name.clone());
                    }
                }
            }
        }

        for targets in graph.outgoing.values_mut() {
            targets.sort_unstable();
            targets.dedup();
        }

        tracing::debug!(
            symbols = graph.symbols.len(),
            references = graph.references.len(),
            unresolved = graph.unresolved_names.len(),
            "symbol graph built"
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_source, SourceLanguage};

    fn build_two_file_graph() -> SymbolGraph {
        let a = parse_source(
            "a",
            SourceLanguage::Python,
            "def helper():\n    return 1\n\ndef unused():\n    return 2\n",
        )
        .unwrap();
        let b = parse_source(
            "b",
            SourceLanguage::Python,
            "def main():\n    helper()\n\nmain()\n",
        )
        .unwrap();

        let mut builder = SymbolGraphBuilder::new();
        builder.add_file(PathBuf::from("a.py"), a);
        builder.add_file(PathBuf::from("b.py"), b);
        builder.build()
    }

    #[test]
    fn cross_file_calls_resolve_to_edges() {
        let graph = build_two_file_graph();
        let main_id = graph.ids_by_name("main")[0];
        let helper_id = graph.ids_by_name("helper")[0];
        assert!(graph.outgoing(main_id).contains(&helper_id));
    }

    #[test]
    fn module_level_calls_are_roots() {
        let graph = build_two_file_graph();
        let main_id = graph.ids_by_name("main")[0];
        let targets: Vec<SymbolId> = graph.module_level_targets().collect();
        assert!(targets.contains(&main_id));
    }

    #[test]
    fn unknown_names_are_unresolved() {
        let parsed = parse_source(
            "a",
            SourceLanguage::Python,
            "def f():\n    mystery_call()\n",
        )
        .unwrap();
        let mut builder = SymbolGraphBuilder::new();
        builder.add_file(PathBuf::from("a.py"), parsed);
        let graph = builder.build();
        assert!(graph.is_name_unresolved_target("mystery_call"));
    }

    #[test]
    fn symbol_ids_are_stable_across_insertion_order() {
        let parse = |m: &str, src: &str| parse_source(m, SourceLanguage::Python, src).unwrap();
        let mut fwd = SymbolGraphBuilder::new();
        fwd.add_file(PathBuf::from("a.py"), parse("a", "def x():\n    pass\n"));
        fwd.add_file(PathBuf::from("b.py"), parse("b", "def y():\n    pass\n"));
        let mut rev = SymbolGraphBuilder::new();
        rev.add_file(PathBuf::from("b.py"), parse("b", "def y():\n    pass\n"));
        rev.add_file(PathBuf::from("a.py"), parse("a", "def x():\n    pass\n"));

        let g1 = fwd.build();
        let g2 = rev.build();
        assert_eq!(g1.ids_by_name("x"), g2.ids_by_name("x"));
        assert_eq!(g1.ids_by_name("y"), g2.ids_by_name("y"));
    }
}
