//! Analyzer capability interface.
//!
//! Every analyzer consumes the shared parse results and symbol graph
//! through one trait, so traversal logic lives in `parser`/`graph` and is
//! never duplicated per analyzer. File-local work runs in the worker pool;
//! cross-file work runs in `finalize` after the graph barrier.

pub mod complexity;
pub mod dead_code;
pub mod dependencies;
pub mod duplicates;
pub mod globals;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::cache::AnalyzerCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::SymbolGraph;
use crate::index::SourceFile;
use crate::parser::ParsedFile;
use crate::report::Finding;

pub use dependencies::{OfflineFeed, StaticFeed, VersionFeed};

/// Everything an analyzer may read. Analyzers never touch cache entries
/// directly; `cache` is the lookup/store API and the only mutable state.
pub struct AnalyzerContext<'a> {
    pub config: &'a EngineConfig,
    pub graph: &'a SymbolGraph,
    pub cache: &'a AnalyzerCache,
    /// Parse results by relative path; files that failed to parse are absent.
    pub parsed: &'a HashMap<PathBuf, ParsedFile>,
    pub files: &'a [SourceFile],
    pub feed: &'a dyn VersionFeed,
}

pub trait Analyzer: Sync + Send {
    fn id(&self) -> &'static str;

    /// Bumped whenever analysis logic changes; part of the cache key.
    fn version(&self) -> u32;

    /// Per-file pass, parallel and cache-backed. Default: nothing.
    fn analyze_file(
        &self,
        _file: &SourceFile,
        _ctx: &AnalyzerContext,
    ) -> Result<Vec<Finding>, EngineError> {
        Ok(Vec::new())
    }

    /// Cross-file pass after the symbol graph barrier. Default: nothing.
    fn finalize(&self, _ctx: &AnalyzerContext) -> Result<Vec<Finding>, EngineError> {
        Ok(Vec::new())
    }
}

/// The full analyzer set, in deterministic id order.
pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(complexity::ComplexityAnalyzer),
        Box::new(dead_code::DeadCodeAnalyzer),
        Box::new(dependencies::DependencyAnalyzer),
        Box::new(duplicates::DuplicateDetector),
        Box::new(globals::GlobalStateAnalyzer),
    ]
}
