//! repohealth: a project-health static-analysis engine.
//!
//! Walks a multi-package source tree and produces a structured,
//! severity-ranked inventory of duplicate files and code, dead code,
//! dependency-version conflicts, complexity hotspots and shared
//! global-state usage. Rendering the report is the caller's concern; the
//! engine emits one deterministic, serializable `Report` per run.

/// Analyzer implementations behind the shared `Analyzer` trait
pub mod analyzers;

/// Persistent per-file analysis cache
pub mod cache;

/// Engine configuration and tunables
pub mod config;

/// Run orchestration: scheduling, barriers, cancellation, merge
pub mod engine;

/// Engine error taxonomy
pub mod error;

/// Cross-file symbol graph
pub mod graph;

/// Ignore patterns and exclude-glob handling
pub mod ignore;

/// File enumeration and content identity
pub mod index;

/// Shared source parser (tree-sitter + syn)
pub mod parser;

/// Findings and report assembly
pub mod report;

// Re-export the types most callers need.
pub use analyzers::{Analyzer, OfflineFeed, StaticFeed, VersionFeed};
pub use config::{AnalyzerSelection, EngineConfig};
pub use engine::Orchestrator;
pub use error::EngineError;
pub use report::{Category, Finding, Report, Severity};
