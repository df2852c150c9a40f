//! Orchestrator: schedules analyzers over the scanned tree and merges
//! their findings into one deterministic report.
//!
//! State machine per run: Scanning -> Analyzing -> Merging -> Done | Failed.
//! Per-file and per-analyzer failures become findings and never fail the
//! run; only an unreadable root or an irrecoverable cache aborts. Final
//! report ordering is independent of completion order because the merge
//! step always sorts before emission.

pub mod timings;

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::analyzers::{default_analyzers, Analyzer, AnalyzerContext, OfflineFeed, VersionFeed};
use crate::cache::AnalyzerCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::SymbolGraphBuilder;
use crate::ignore::IgnoreFilter;
use crate::index::{FileIndex, SourceFile};
use crate::parser::{self, ParsedFile, PARSER_VERSION};
use crate::report::{Finding, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Scanning,
    Analyzing,
    Merging,
    Done,
    Failed,
}

/// Deadline plus external interrupt, polled between work units. Once
/// tripped it stays tripped so every worker observes the same decision.
pub struct CancelToken {
    deadline: Option<Instant>,
    interrupt: Option<Arc<AtomicBool>>,
    tripped: AtomicBool,
}

impl CancelToken {
    fn new(config: &EngineConfig, interrupt: Option<Arc<AtomicBool>>) -> Self {
        Self {
            deadline: config.timeout.map(|t| Instant::now() + t),
            interrupt,
            tripped: AtomicBool::new(false),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        if self.tripped.load(Ordering::Relaxed) {
            return true;
        }
        let hit = self
            .deadline
            .map(|d| Instant::now() >= d)
            .unwrap_or(false)
            || self
                .interrupt
                .as_ref()
                .map(|i| i.load(Ordering::Relaxed))
                .unwrap_or(false);
        if hit {
            self.tripped.store(true, Ordering::Relaxed);
        }
        hit
    }
}

#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> Option<u64> {
    None
}

/// Backpressure, not failure: above the limit the cache sheds its working
/// set and new submissions wait for usage to drop.
struct MemoryMonitor {
    limit_bytes: u64,
    shed_done: AtomicBool,
}

impl MemoryMonitor {
    fn new(limit_bytes: u64) -> Self {
        Self {
            limit_bytes,
            shed_done: AtomicBool::new(false),
        }
    }

    fn throttle(&self, cache: &AnalyzerCache) {
        for _ in 0..20 {
            match resident_memory_bytes() {
                Some(resident) if resident > self.limit_bytes => {
                    if !self.shed_done.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            resident,
                            limit = self.limit_bytes,
                            "memory limit exceeded, shedding cache working set"
                        );
                        cache.shed_memory();
                    }
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                _ => return,
            }
        }
    }
}

pub struct Orchestrator {
    config: EngineConfig,
    feed: Box<dyn VersionFeed>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            feed: Box::new(OfflineFeed),
            interrupt: None,
        }
    }

    pub fn with_feed(mut self, feed: Box<dyn VersionFeed>) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Execute one run. Only fatal conditions return `Err`; everything
    /// else is folded into the report, marked partial when truncated.
    pub fn run(&self) -> Result<Report, EngineError> {
        let run_start = Instant::now();
        let cancel = CancelToken::new(&self.config, self.interrupt.clone());
        let monitor = MemoryMonitor::new(self.config.memory_limit_bytes);
        let mut findings: Vec<Finding> = Vec::new();
        let mut partial = false;

        let mut state = RunState::Scanning;
        tracing::info!(root = %self.config.root.display(), ?state, "run started");

        let (cache, cache_degraded) = AnalyzerCache::open(
            &self.config.cache_dir(),
            &self.config.root,
            self.config.cache_max_entries,
        );
        if let Some(err) = cache_degraded {
            tracing::warn!("{err}");
            findings.extend(err.into_finding());
        }

        // Scanning.
        let filter = IgnoreFilter::new(&self.config.root, self.config.exclude_globset());
        let scan_start = Instant::now();
        let outcome = FileIndex::scan(
            &self.config.root,
            &filter,
            self.config.max_file_bytes,
            &|| cancel.is_cancelled(),
        )
        .map_err(|e| {
            tracing::error!(state = ?RunState::Failed, "scan failed: {e}");
            e
        })?;
        timings::record("scan", scan_start.elapsed().as_millis());
        partial |= !outcome.complete;
        findings.extend(outcome.findings);
        let files = outcome.files;
        tracing::info!(files = files.len(), partial, "scan complete");

        // Parse phase; must finish for the whole tree before the
        // cross-file analyzers run (single synchronization barrier).
        state = RunState::Analyzing;
        tracing::debug!(?state, "phase transition");
        monitor.throttle(&cache);
        let parse_results: Vec<(Option<(PathBuf, ParsedFile)>, Option<Finding>, bool)> = files
            .par_iter()
            .map(|file| self.parse_one(file, &cache, &cancel))
            .collect();

        let mut parsed: HashMap<PathBuf, ParsedFile> = HashMap::new();
        for (entry, finding, skipped) in parse_results {
            if let Some((path, parse)) = entry {
                parsed.insert(path, parse);
            }
            findings.extend(finding);
            partial |= skipped;
        }

        let graph_start = Instant::now();
        let mut builder = SymbolGraphBuilder::new();
        for (path, parse) in &parsed {
            builder.add_file(path.clone(), parse.clone());
        }
        let graph = builder.build();
        timings::record("graph", graph_start.elapsed().as_millis());

        let ctx = AnalyzerContext {
            config: &self.config,
            graph: &graph,
            cache: &cache,
            parsed: &parsed,
            files: &files,
            feed: self.feed.as_ref(),
        };
        let analyzers: Vec<Box<dyn Analyzer>> = default_analyzers()
            .into_iter()
            .filter(|a| self.config.analyzers.enabled(a.id()))
            .collect();

        // File-local units in the worker pool.
        monitor.throttle(&cache);
        let local_results: Vec<(Vec<Finding>, bool)> = files
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return (Vec::new(), true);
                }
                let mut batch = Vec::new();
                for analyzer in &analyzers {
                    let unit_start = Instant::now();
                    match analyzer.analyze_file(file, &ctx) {
                        Ok(found) => batch.extend(found),
                        Err(e) if e.is_fatal() => {
                            tracing::error!("{e}");
                        }
                        Err(e) => batch.extend(e.into_finding()),
                    }
                    timings::record(
                        &format!("analyze/{}", analyzer.id()),
                        unit_start.elapsed().as_millis(),
                    );
                }
                (batch, false)
            })
            .collect();
        for (batch, skipped) in local_results {
            findings.extend(batch);
            partial |= skipped;
        }

        // Cross-file phases. A cancelled run skips them: their inputs no
        // longer cover the tree and the report is already marked partial.
        if !cancel.is_cancelled() {
            for analyzer in &analyzers {
                let phase_start = Instant::now();
                match analyzer.finalize(&ctx) {
                    Ok(found) => findings.extend(found),
                    Err(e) if e.is_fatal() => {
                        tracing::error!(state = ?RunState::Failed, "fatal during {}: {e}", analyzer.id());
                        return Err(e);
                    }
                    Err(e) => findings.extend(e.into_finding()),
                }
                timings::record(
                    &format!("finalize/{}", analyzer.id()),
                    phase_start.elapsed().as_millis(),
                );
            }
        } else {
            partial = true;
        }

        // Merging.
        state = RunState::Merging;
        tracing::debug!(?state, "phase transition");
        if let Err(e) = cache.flush() {
            tracing::warn!("cache flush failed: {e}");
            findings.extend(e.into_finding());
        }
        let report = Report::assemble(
            self.config.root.clone(),
            findings,
            self.config.severity_floor,
            partial,
        );

        state = RunState::Done;
        tracing::info!(
            ?state,
            findings = report.findings.len(),
            partial = report.partial,
            elapsed_ms = run_start.elapsed().as_millis() as u64,
            "run complete"
        );
        if timings::enabled() {
            eprintln!("{}", timings::summary());
        }
        Ok(report)
    }

    /// Parse one file with cache backing. Returns the parse (if any), a
    /// finding (if the file failed), and whether the unit was skipped due
    /// to cancellation.
    fn parse_one(
        &self,
        file: &SourceFile,
        cache: &AnalyzerCache,
        cancel: &CancelToken,
    ) -> (Option<(PathBuf, ParsedFile)>, Option<Finding>, bool) {
        let Some(language) = file.language() else {
            return (None, None, false);
        };
        if cancel.is_cancelled() {
            return (None, None, true);
        }

        if let Some(cached) = cache.lookup_as::<ParsedFile>(file, "parser", PARSER_VERSION) {
            return (Some((file.relative_path.clone(), cached)), None, false);
        }

        let source = match std::fs::read_to_string(&file.absolute_path) {
            Ok(s) => s,
            Err(e) => {
                let err = EngineError::Io {
                    path: file.relative_path.clone(),
                    message: e.to_string(),
                };
                return (None, err.into_finding(), false);
            }
        };

        let module = parser::module_name(&file.relative_path, language);
        let parse_start = Instant::now();
        match parser::parse_source(&module, language, &source) {
            Ok(parse) => {
                timings::record("parse", parse_start.elapsed().as_millis());
                cache.store_serialized(file, "parser", PARSER_VERSION, &parse);
                (Some((file.relative_path.clone(), parse)), None, false)
            }
            Err(e) => {
                let err = EngineError::Parse {
                    path: file.relative_path.clone(),
                    message: e.to_string(),
                };
                (None, err.into_finding(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_token_trips_on_deadline() {
        let config = EngineConfig {
            timeout: Some(Duration::from_millis(0)),
            ..EngineConfig::default()
        };
        let token = CancelToken::new(&config, None);
        std::thread::sleep(Duration::from_millis(2));
        assert!(token.is_cancelled());
        // Stays tripped.
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_token_honors_interrupt() {
        let config = EngineConfig::default();
        let flag = Arc::new(AtomicBool::new(false));
        let token = CancelToken::new(&config, Some(flag.clone()));
        assert!(!token.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(token.is_cancelled());
    }
}
