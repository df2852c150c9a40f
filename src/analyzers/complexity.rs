//! Per-function structural complexity scoring.
//!
//! Branch-introducing constructs each add one to a base score of one,
//! approximating cyclomatic complexity by branch-point counting. Raw
//! scores are cached per file; the threshold is applied at read time so a
//! config change does not need a cache invalidation.

use serde::{Deserialize, Serialize};

use super::{Analyzer, AnalyzerContext};
use crate::error::EngineError;
use crate::index::SourceFile;
use crate::report::{Category, Finding, Severity};

pub struct ComplexityAnalyzer;

const ID: &str = "complexity";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FunctionScore {
    function: String,
    line: usize,
    branches: u32,
    score: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedScores {
    functions: Vec<FunctionScore>,
}

impl Analyzer for ComplexityAnalyzer {
    fn id(&self) -> &'static str {
        ID
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn analyze_file(
        &self,
        file: &SourceFile,
        ctx: &AnalyzerContext,
    ) -> Result<Vec<Finding>, EngineError> {
        if file.language().is_none() {
            return Ok(Vec::new());
        }

        let scores = match ctx.cache.lookup_as::<CachedScores>(file, ID, VERSION) {
            Some(cached) => cached,
            None => {
                let Some(parsed) = ctx.parsed.get(&file.relative_path) else {
                    // Parse failure already produced its own finding.
                    return Ok(Vec::new());
                };
                let functions = parsed
                    .functions
                    .iter()
                    .map(|f| {
                        let symbol = &parsed.symbols[f.symbol];
                        FunctionScore {
                            function: symbol.qualified_name.clone(),
                            line: symbol.line_start,
                            branches: f.branch_count,
                            score: 1 + f.branch_count,
                        }
                    })
                    .collect();
                let scores = CachedScores { functions };
                ctx.cache.store_serialized(file, ID, VERSION, &scores);
                scores
            }
        };

        let threshold = ctx.config.complexity_threshold;
        let findings = scores
            .functions
            .iter()
            .filter(|f| f.score > threshold)
            .map(|f| {
                let severity = if f.score >= threshold * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Finding::new(
                    Category::Complexity,
                    severity,
                    file.relative_path.clone(),
                    format!(
                        "function `{}` has cyclomatic complexity {} ({} branch points, threshold {})",
                        f.function, f.score, f.branches, threshold
                    ),
                    "split the function into smaller units or flatten nested branching",
                )
                .with_line(f.line)
                .with_evidence(f.function.clone())
            })
            .collect();
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
    use crate::index::FileKind;
    use crate::parser::{parse_source, SourceLanguage};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn source_file(rel: &str, hash: &str) -> SourceFile {
        SourceFile {
            relative_path: PathBuf::from(rel),
            absolute_path: PathBuf::from(format!("/tmp/{rel}")),
            hash: hash.to_string(),
            mtime: 0,
            size: 1,
            kind: FileKind::Source(SourceLanguage::Python),
        }
    }

    #[test]
    fn three_ifs_score_four_and_stay_under_default_threshold() {
        let src = "def f(x):\n    if x > 0:\n        pass\n    if x > 1:\n        pass\n    if x > 2:\n        pass\n";
        let parsed = parse_source("f", SourceLanguage::Python, src).unwrap();
        assert_eq!(1 + parsed.functions[0].branch_count, 4);

        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = AnalyzerCache::open(dir.path(), dir.path(), 100);
        let mut map = HashMap::new();
        map.insert(PathBuf::from("f.py"), parsed);
        let config = EngineConfig::default();
        let graph = SymbolGraphBuilder::new().build();
        let files = vec![source_file("f.py", "h1")];
        let ctx = AnalyzerContext {
            config: &config,
            graph: &graph,
            cache: &cache,
            parsed: &map,
            files: &files,
            feed: &OfflineFeed,
        };

        let findings = ComplexityAnalyzer.analyze_file(&files[0], &ctx).unwrap();
        assert!(findings.is_empty(), "score 4 is below the default threshold");
    }

    #[test]
    fn threshold_breach_is_flagged_with_scaled_severity() {
        // 12 ifs -> score 13, above threshold 10 but below 20: MEDIUM.
        let mut src = String::from("def f(x):\n");
        for i in 0..12 {
            src.push_str(&format!("    if x > {i}:\n        pass\n"));
        }
        let parsed = parse_source("f", SourceLanguage::Python, &src).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = AnalyzerCache::open(dir.path(), dir.path(), 100);
        let mut map = HashMap::new();
        map.insert(PathBuf::from("f.py"), parsed);
        let config = EngineConfig::default();
        let graph = SymbolGraphBuilder::new().build();
        let files = vec![source_file("f.py", "h2")];
        let ctx = AnalyzerContext {
            config: &config,
            graph: &graph,
            cache: &cache,
            parsed: &map,
            files: &files,
            feed: &OfflineFeed,
        };

        let findings = ComplexityAnalyzer.analyze_file(&files[0], &ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].message.contains("complexity 13"));

        // Second call hits the cache and yields the same findings even
        // with the parse result gone.
        let empty = HashMap::new();
        let ctx2 = AnalyzerContext {
            config: &config,
            graph: &graph,
            cache: &cache,
            parsed: &empty,
            files: &files,
            feed: &OfflineFeed,
        };
        let cached = ComplexityAnalyzer.analyze_file(&files[0], &ctx2).unwrap();
        assert_eq!(cached, findings);
    }
}
