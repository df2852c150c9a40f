//! Shared source parser consumed by every analyzer.
//!
//! One parse per file produces symbol definitions, outgoing references,
//! normalized code blocks and per-function branch counts, so duplicate,
//! dead-code, complexity and global-state analysis never re-traverse the
//! same tree. The result is plain serializable data and is cacheable per
//! content hash.

pub mod languages;

mod extract;
mod rust;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use languages::{LanguageCache, SourceLanguage};

/// Bumped whenever extraction logic changes; part of the cache key so stale
/// parses are invalidated without touching other analyzers' entries.
pub const PARSER_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    ModuleVar,
    ImportAlias,
}

/// A symbol definition as extracted from one file, before graph merge
/// assigns global ids. `parent` indexes into the same file's symbol list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSymbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub line_start: usize,
    pub line_end: usize,
    pub parent: Option<usize>,
}

/// An outgoing reference: a name used at `line`, from inside the symbol at
/// index `from` (None = module level). `is_write` marks assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReference {
    pub name: String,
    pub line: usize,
    pub from: Option<usize>,
    pub is_write: bool,
}

/// A function or method body reduced to normalized statements, the unit of
/// near-duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub owner: String,
    pub line_start: usize,
    pub line_end: usize,
    pub statements: Vec<String>,
}

/// Structural complexity input for one function: branch-introducing
/// constructs found in its body. Cyclomatic score = 1 + branch_count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMetrics {
    pub symbol: usize,
    pub branch_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub language: SourceLanguage,
    pub module: String,
    pub symbols: Vec<RawSymbol>,
    pub references: Vec<RawReference>,
    pub blocks: Vec<CodeBlock>,
    pub functions: Vec<FunctionMetrics>,
}

/// Parse one source file. `module` is the dotted/`::` module name derived
/// from the file's relative path and is used to qualify symbol names.
pub fn parse_source(module: &str, language: SourceLanguage, source: &str) -> Result<ParsedFile> {
    if source.len() > 10_000_000 {
        anyhow::bail!("source too large ({} bytes)", source.len());
    }
    match language {
        SourceLanguage::Rust => rust::parse_rust(module, source),
        _ => extract::parse_tree_sitter(module, language, source),
    }
}

/// Collapse whitespace runs to single spaces and trim. Comment nodes are
/// skipped at extraction time; this only evens out formatting so that
/// reformatted copies of a statement fingerprint identically.
pub fn normalize_statement(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Module name for a path relative to the scan root: separators become the
/// language's scope separator, the extension is dropped.
pub fn module_name(relative_path: &std::path::Path, language: SourceLanguage) -> String {
    let sep = language.scope_separator();
    let mut parts: Vec<String> = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = std::path::Path::new(last.as_str())
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
        {
            *last = stem;
        }
    }
    parts.join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_statement("  x   =\t1  "), "x = 1");
        assert_eq!(normalize_statement("return a+b"), "return a+b");
        assert_eq!(normalize_statement("\n\n"), "");
    }

    #[test]
    fn module_name_uses_language_separator() {
        assert_eq!(
            module_name(Path::new("pkg/util.py"), SourceLanguage::Python),
            "pkg.util"
        );
        assert_eq!(
            module_name(Path::new("src/io/fs.rs"), SourceLanguage::Rust),
            "src::io::fs"
        );
    }

    #[test]
    fn python_function_symbols_and_calls_extracted() {
        let src = "def helper():\n    return 1\n\ndef main():\n    helper()\n";
        let parsed = parse_source("m", SourceLanguage::Python, src).unwrap();

        let names: Vec<&str> = parsed.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"main"));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.name == "helper" && r.from.is_some()));
    }

    #[test]
    fn rust_sources_go_through_syn() {
        let src = "fn a() { b(); }\nfn b() {}\n";
        let parsed = parse_source("m", SourceLanguage::Rust, src).unwrap();
        assert_eq!(
            parsed
                .symbols
                .iter()
                .filter(|s| s.kind == SymbolKind::Function)
                .count(),
            2
        );
        assert!(parsed.references.iter().any(|r| r.name == "b"));
    }
}
