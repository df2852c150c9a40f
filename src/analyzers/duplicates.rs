//! Exact and near-duplicate detection.
//!
//! Pass one groups files by content hash. Pass two fingerprints normalized
//! function blocks with fixed-size statement windows and groups blocks
//! whose fingerprint sets overlap above the configured similarity; groups
//! are closed transitively through a union-find so similarity chains land
//! in one group.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::{Analyzer, AnalyzerContext};
use crate::error::EngineError;
use crate::report::{Category, Finding, Severity};

pub struct DuplicateDetector;

const ID: &str = "duplicates";
const VERSION: u32 = 1;

/// A transitive-closure equivalence class of duplicate locations. The
/// canonical member is the earliest path lexicographically, tie-broken by
/// shortest path.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub members: Vec<DuplicateLocation>,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateLocation {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub owner: Option<String>,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins so grouping is insertion-order independent.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

fn canonical_order(a: &DuplicateLocation, b: &DuplicateLocation) -> std::cmp::Ordering {
    let a_str = a.file.to_string_lossy();
    let b_str = b.file.to_string_lossy();
    a_str
        .cmp(&b_str)
        .then_with(|| a_str.len().cmp(&b_str.len()))
        .then_with(|| a.line.unwrap_or(0).cmp(&b.line.unwrap_or(0)))
}

fn window_fingerprints(statements: &[String], window: usize) -> HashSet<u64> {
    let mut set = HashSet::new();
    if statements.len() < window {
        return set;
    }
    for chunk in statements.windows(window) {
        let mut hasher = Sha256::new();
        for stmt in chunk {
            hasher.update(stmt.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        set.insert(u64::from_be_bytes(prefix));
    }
    set
}

fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

impl Analyzer for DuplicateDetector {
    fn id(&self) -> &'static str {
        ID
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn finalize(&self, ctx: &AnalyzerContext) -> Result<Vec<Finding>, EngineError> {
        let mut findings = Vec::new();

        // Pass 1: exact file duplicates by content hash.
        let mut by_hash: HashMap<&str, Vec<&crate::index::SourceFile>> = HashMap::new();
        for file in ctx.files {
            by_hash.entry(file.hash.as_str()).or_default().push(file);
        }

        let mut exact_files: HashSet<PathBuf> = HashSet::new();
        let mut exact_groups: Vec<(String, DuplicateGroup)> = Vec::new();
        for (hash, group) in by_hash {
            if group.len() < 2 {
                continue;
            }
            let mut members: Vec<DuplicateLocation> = group
                .iter()
                .map(|f| DuplicateLocation {
                    file: f.relative_path.clone(),
                    line: None,
                    owner: None,
                })
                .collect();
            members.sort_by(canonical_order);
            for m in &members {
                exact_files.insert(m.file.clone());
            }
            exact_groups.push((
                hash.to_string(),
                DuplicateGroup {
                    members,
                    similarity: 1.0,
                },
            ));
        }
        exact_groups.sort_by(|a, b| a.1.members[0].file.cmp(&b.1.members[0].file));

        for (hash, group) in &exact_groups {
            let canonical = &group.members[0];
            for member in &group.members[1..] {
                findings.push(
                    Finding::new(
                        Category::Duplicate,
                        Severity::High,
                        member.file.clone(),
                        format!(
                            "file is byte-identical to {} ({} copies)",
                            canonical.file.display(),
                            group.members.len()
                        ),
                        "extract into a shared utility and keep a single copy",
                    )
                    .with_evidence(format!("sha256:{}", &hash[..12.min(hash.len())])),
                );
            }
        }

        // Pass 2: near-duplicate blocks. Blocks inside byte-identical files
        // already matched in pass 1 and are skipped here.
        let window = ctx.config.duplicate_min_statements;
        let mut blocks: Vec<(DuplicateLocation, HashSet<u64>)> = Vec::new();
        let mut paths: Vec<&PathBuf> = ctx.parsed.keys().collect();
        paths.sort();
        for path in paths {
            if exact_files.contains(path.as_path()) {
                continue;
            }
            let parsed = &ctx.parsed[path];
            for block in &parsed.blocks {
                if block.statements.len() < window {
                    continue;
                }
                let prints = window_fingerprints(&block.statements, window);
                if prints.is_empty() {
                    continue;
                }
                blocks.push((
                    DuplicateLocation {
                        file: path.clone(),
                        line: Some(block.line_start),
                        owner: Some(block.owner.clone()),
                    },
                    prints,
                ));
            }
        }

        // Inverted index: window hash -> block indexes sharing it.
        let mut by_window: HashMap<u64, Vec<usize>> = HashMap::new();
        for (idx, (_, prints)) in blocks.iter().enumerate() {
            for &w in prints {
                by_window.entry(w).or_default().push(idx);
            }
        }

        let mut uf = UnionFind::new(blocks.len());
        let mut accepted_pairs: Vec<(usize, f64)> = Vec::new();
        let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
        for candidates in by_window.values() {
            for i in 0..candidates.len() {
                for j in (i + 1)..candidates.len() {
                    let pair = (candidates[i], candidates[j]);
                    if !seen_pairs.insert(pair) {
                        continue;
                    }
                    let sim = jaccard(&blocks[pair.0].1, &blocks[pair.1].1);
                    if sim >= ctx.config.duplicate_similarity {
                        uf.union(pair.0, pair.1);
                        accepted_pairs.push((pair.0, sim));
                    }
                }
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for idx in 0..blocks.len() {
            let root = uf.find(idx);
            groups.entry(root).or_default().push(idx);
        }

        // Group similarity is the weakest accepted link, resolved against
        // the final roots since unions can merge groups after the fact.
        let mut similarity: HashMap<usize, f64> = HashMap::new();
        for (member, sim) in accepted_pairs {
            let root = uf.find(member);
            let entry = similarity.entry(root).or_insert(sim);
            if sim < *entry {
                *entry = sim;
            }
        }

        let mut near_groups: Vec<DuplicateGroup> = Vec::new();
        for (root, indexes) in groups {
            if indexes.len() < 2 {
                continue;
            }
            let mut members: Vec<DuplicateLocation> =
                indexes.iter().map(|&i| blocks[i].0.clone()).collect();
            members.sort_by(canonical_order);
            near_groups.push(DuplicateGroup {
                members,
                similarity: similarity.get(&root).copied().unwrap_or(1.0),
            });
        }
        near_groups.sort_by(|a, b| canonical_order(&a.members[0], &b.members[0]));

        for group in &near_groups {
            let canonical = &group.members[0];
            let canonical_owner = canonical.owner.as_deref().unwrap_or("<block>");
            for member in &group.members[1..] {
                let owner = member.owner.as_deref().unwrap_or("<block>");
                let mut finding = Finding::new(
                    Category::Duplicate,
                    Severity::Medium,
                    member.file.clone(),
                    format!(
                        "block `{}` is a near-duplicate of `{}` in {} (similarity {:.2})",
                        owner,
                        canonical_owner,
                        canonical.file.display(),
                        group.similarity
                    ),
                    "extract into a shared utility",
                )
                .with_evidence(format!(
                    "{}:{}",
                    canonical.file.display(),
                    canonical.line.unwrap_or(0)
                ));
                if let Some(line) = member.line {
                    finding = finding.with_line(line);
                }
                findings.push(finding);
            }
        }

        tracing::debug!(
            exact = exact_groups.len(),
            near = near_groups.len(),
            "duplicate detection complete"
        );
        Ok(findings)
    }
}
