//! Multi-format manifest parsing and version-constraint conflict
//! resolution.
//!
//! Manifest grammars are a closed set of variant parsers behind one
//! `ManifestParser` interface. Constraints normalize to pinned versions or
//! half-open intervals; a conflict exists when two constraints for the
//! same package cannot be satisfied by a single version. The "latest
//! version" feed is an injected collaborator; the engine never owns that
//! data source.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{Analyzer, AnalyzerContext};
use crate::error::EngineError;
use crate::index::{FileKind, ManifestFormat};
use crate::report::{Category, Finding, Severity};

pub struct DependencyAnalyzer;

const ID: &str = "dependencies";
const VERSION: u32 = 1;

/// Pluggable lookup of the latest known version per package.
pub trait VersionFeed: Sync + Send {
    fn latest(&self, package: &str) -> Option<String>;
}

/// Offline default: never reports anything as outdated.
pub struct OfflineFeed;

impl VersionFeed for OfflineFeed {
    fn latest(&self, _package: &str) -> Option<String> {
        None
    }
}

/// Injected map of known latest versions, for callers that bring their own
/// registry data.
pub struct StaticFeed {
    latest: HashMap<String, String>,
}

impl StaticFeed {
    pub fn new(latest: HashMap<String, String>) -> Self {
        Self { latest }
    }
}

impl VersionFeed for StaticFeed {
    fn latest(&self, package: &str) -> Option<String> {
        self.latest.get(package).cloned()
    }
}

/// Numeric version, prerelease/build metadata ignored. Good enough for
/// interval reasoning across heterogeneous manifest grammars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let numeric_end = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len());
        let numeric = &trimmed[..numeric_end];
        if numeric.is_empty() {
            return None;
        }
        let parts: Option<Vec<u64>> = numeric
            .split('.')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>().ok())
            .collect();
        let parts = parts?;
        if parts.is_empty() {
            None
        } else {
            Some(Version { parts })
        }
    }

    fn component(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }

    /// The smallest version above the caret-compatible range: bump the
    /// first non-zero component, zero the rest.
    fn caret_upper(&self) -> Version {
        let mut parts = vec![0; self.parts.len().max(1)];
        for (i, &p) in self.parts.iter().enumerate() {
            if p != 0 || i == self.parts.len() - 1 {
                parts[i] = p + 1;
                parts.truncate(i + 1);
                return Version { parts };
            }
        }
        Version { parts }
    }

    /// Tilde upper bound: bump the second-to-last declared component.
    fn tilde_upper(&self) -> Version {
        let mut parts = self.parts.clone();
        if parts.len() >= 2 {
            let idx = parts.len() - 2;
            parts[idx] += 1;
            parts.truncate(idx + 1);
        } else {
            parts[0] += 1;
        }
        Version { parts }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        write!(f, "{}", joined.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// Normalized constraint form shared by every manifest grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Pinned(Version),
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    Wildcard,
}

impl Constraint {
    fn bounds(&self) -> (Option<Bound>, Option<Bound>) {
        match self {
            Constraint::Pinned(v) => (
                Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
                Some(Bound {
                    version: v.clone(),
                    inclusive: true,
                }),
            ),
            Constraint::Range { lower, upper } => (lower.clone(), upper.clone()),
            Constraint::Wildcard => (None, None),
        }
    }

    /// Joint satisfiability: does some version satisfy both constraints?
    /// Pinned literals must match exactly; intervals must overlap.
    pub fn intersects(&self, other: &Constraint) -> bool {
        if let (Constraint::Pinned(a), Constraint::Pinned(b)) = (self, other) {
            return a == b;
        }
        let (la, ua) = self.bounds();
        let (lb, ub) = other.bounds();

        let lower = max_bound(la, lb);
        let upper = min_bound(ua, ub);
        match (lower, upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                Ordering::Less => true,
                Ordering::Equal => lo.inclusive && hi.inclusive,
                Ordering::Greater => false,
            },
            _ => true,
        }
    }

    /// The version this constraint effectively asks for, used by the
    /// outdated check.
    pub fn implied_version(&self) -> Option<&Version> {
        match self {
            Constraint::Pinned(v) => Some(v),
            Constraint::Range { lower, .. } => lower.as_ref().map(|b| &b.version),
            Constraint::Wildcard => None,
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Pinned(v) => write!(f, "=={v}"),
            Constraint::Range { lower, upper } => {
                let mut parts = Vec::new();
                if let Some(lo) = lower {
                    parts.push(format!(
                        "{}{}",
                        if lo.inclusive { ">=" } else { ">" },
                        lo.version
                    ));
                }
                if let Some(hi) = upper {
                    parts.push(format!(
                        "{}{}",
                        if hi.inclusive { "<=" } else { "<" },
                        hi.version
                    ));
                }
                write!(f, "{}", parts.join(","))
            }
            Constraint::Wildcard => write!(f, "*"),
        }
    }
}

fn max_bound(a: Option<Bound>, b: Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (Some(x), Some(y)) => Some(match x.version.cmp(&y.version) {
            Ordering::Greater => x,
            Ordering::Less => y,
            // Same version: exclusive is the tighter lower bound.
            Ordering::Equal => {
                if x.inclusive {
                    y
                } else {
                    x
                }
            }
        }),
        (x, None) => x,
        (None, y) => y,
    }
}

fn min_bound(a: Option<Bound>, b: Option<Bound>) -> Option<Bound> {
    match (a, b) {
        (Some(x), Some(y)) => Some(match x.version.cmp(&y.version) {
            Ordering::Less => x,
            Ordering::Greater => y,
            Ordering::Equal => {
                if x.inclusive {
                    y
                } else {
                    x
                }
            }
        }),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Parse one raw constraint expression into normalized form. Unknown
/// syntax degrades to Wildcard rather than failing the manifest.
pub fn parse_constraint(raw: &str, format: ManifestFormat) -> Constraint {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" || raw == "latest" {
        return Constraint::Wildcard;
    }

    // Comma-separated parts intersect into one interval.
    if raw.contains(',') {
        let mut lower: Option<Bound> = None;
        let mut upper: Option<Bound> = None;
        for part in raw.split(',') {
            match parse_single(part.trim(), format) {
                Constraint::Pinned(v) => {
                    let b = Bound {
                        version: v,
                        inclusive: true,
                    };
                    lower = max_bound(lower, Some(b.clone()));
                    upper = min_bound(upper, Some(b));
                }
                Constraint::Range { lower: lo, upper: hi } => {
                    lower = max_bound(lower, lo);
                    upper = min_bound(upper, hi);
                }
                Constraint::Wildcard => {}
            }
        }
        return Constraint::Range { lower, upper };
    }

    parse_single(raw, format)
}

fn parse_single(raw: &str, format: ManifestFormat) -> Constraint {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix("==").or_else(|| raw.strip_prefix('=')) {
        return match Version::parse(rest) {
            Some(v) => Constraint::Pinned(v),
            None => Constraint::Wildcard,
        };
    }
    if let Some(rest) = raw.strip_prefix("~=") {
        // PEP 440 compatible release.
        return match Version::parse(rest) {
            Some(v) => Constraint::Range {
                upper: Some(Bound {
                    version: v.tilde_upper(),
                    inclusive: false,
                }),
                lower: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            },
            None => Constraint::Wildcard,
        };
    }
    if let Some(rest) = raw.strip_prefix('^') {
        return match Version::parse(rest) {
            Some(v) => Constraint::Range {
                upper: Some(Bound {
                    version: v.caret_upper(),
                    inclusive: false,
                }),
                lower: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            },
            None => Constraint::Wildcard,
        };
    }
    if let Some(rest) = raw.strip_prefix('~') {
        return match Version::parse(rest) {
            Some(v) => Constraint::Range {
                upper: Some(Bound {
                    version: v.tilde_upper(),
                    inclusive: false,
                }),
                lower: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            },
            None => Constraint::Wildcard,
        };
    }
    if let Some(rest) = raw.strip_prefix(">=") {
        return range_from(Version::parse(rest), true, true);
    }
    if let Some(rest) = raw.strip_prefix("<=") {
        return range_from(Version::parse(rest), false, true);
    }
    if let Some(rest) = raw.strip_prefix('>') {
        return range_from(Version::parse(rest), true, false);
    }
    if let Some(rest) = raw.strip_prefix('<') {
        return range_from(Version::parse(rest), false, false);
    }
    if raw.starts_with("!=") {
        // Exclusions do not constrain the interval; heuristic tool.
        return Constraint::Wildcard;
    }

    // Bare version: cargo applies caret semantics, npm and pip pin.
    match Version::parse(raw) {
        Some(v) => match format {
            ManifestFormat::CargoToml => Constraint::Range {
                upper: Some(Bound {
                    version: v.caret_upper(),
                    inclusive: false,
                }),
                lower: Some(Bound {
                    version: v,
                    inclusive: true,
                }),
            },
            _ => Constraint::Pinned(v),
        },
        None => Constraint::Wildcard,
    }
}

fn range_from(version: Option<Version>, is_lower: bool, inclusive: bool) -> Constraint {
    let Some(v) = version else {
        return Constraint::Wildcard;
    };
    let bound = Some(Bound {
        version: v,
        inclusive,
    });
    if is_lower {
        Constraint::Range {
            lower: bound,
            upper: None,
        }
    } else {
        Constraint::Range {
            lower: None,
            upper: bound,
        }
    }
}

/// One dependency declaration from one manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    pub raw_constraint: String,
    pub constraint: Constraint,
    pub manifest: PathBuf,
    pub format: ManifestFormat,
}

/// Closed set of manifest grammars behind one interface.
trait ManifestParser {
    fn parse(&self, manifest: &Path, content: &str) -> anyhow::Result<Vec<DependencySpec>>;
}

fn parser_for(format: ManifestFormat) -> &'static dyn ManifestParser {
    match format {
        ManifestFormat::PackageJson => &PackageJsonParser,
        ManifestFormat::RequirementsTxt => &RequirementsTxtParser,
        ManifestFormat::PyprojectToml => &PyprojectTomlParser,
        ManifestFormat::CargoToml => &CargoTomlParser,
    }
}

struct PackageJsonParser;

impl ManifestParser for PackageJsonParser {
    fn parse(&self, manifest: &Path, content: &str) -> anyhow::Result<Vec<DependencySpec>> {
        let json: serde_json::Value = serde_json::from_str(content)?;
        let mut specs = Vec::new();
        for section in ["dependencies", "devDependencies"] {
            let Some(deps) = json.get(section).and_then(|d| d.as_object()) else {
                continue;
            };
            for (name, version) in deps {
                let Some(raw) = version.as_str() else { continue };
                specs.push(DependencySpec {
                    name: name.clone(),
                    raw_constraint: raw.to_string(),
                    constraint: parse_constraint(raw, ManifestFormat::PackageJson),
                    manifest: manifest.to_path_buf(),
                    format: ManifestFormat::PackageJson,
                });
            }
        }
        Ok(specs)
    }
}

struct RequirementsTxtParser;

lazy_static::lazy_static! {
    static ref REQUIREMENT_RE: Regex =
        Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(.*)$").unwrap();
}

impl ManifestParser for RequirementsTxtParser {
    fn parse(&self, manifest: &Path, content: &str) -> anyhow::Result<Vec<DependencySpec>> {
        let mut specs = Vec::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with('-') {
                continue;
            }
            let Some(caps) = REQUIREMENT_RE.captures(line) else {
                continue;
            };
            let name = caps[1].to_string();
            let raw = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            specs.push(DependencySpec {
                constraint: parse_constraint(&raw, ManifestFormat::RequirementsTxt),
                name,
                raw_constraint: raw,
                manifest: manifest.to_path_buf(),
                format: ManifestFormat::RequirementsTxt,
            });
        }
        Ok(specs)
    }
}

struct PyprojectTomlParser;

impl ManifestParser for PyprojectTomlParser {
    fn parse(&self, manifest: &Path, content: &str) -> anyhow::Result<Vec<DependencySpec>> {
        let doc: toml::Value = toml::from_str(content)?;
        let mut specs = Vec::new();

        // PEP 621: [project] dependencies = ["name>=1.0", ...]
        if let Some(deps) = doc
            .get("project")
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
        {
            for dep in deps {
                let Some(line) = dep.as_str() else { continue };
                let Some(caps) = REQUIREMENT_RE.captures(line) else {
                    continue;
                };
                let name = caps[1].to_string();
                let raw = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                specs.push(DependencySpec {
                    constraint: parse_constraint(&raw, ManifestFormat::PyprojectToml),
                    name,
                    raw_constraint: raw,
                    manifest: manifest.to_path_buf(),
                    format: ManifestFormat::PyprojectToml,
                });
            }
        }

        // Poetry tables.
        for section in ["dependencies", "dev-dependencies"] {
            let Some(table) = doc
                .get("tool")
                .and_then(|t| t.get("poetry"))
                .and_then(|p| p.get(section))
                .and_then(|d| d.as_table())
            else {
                continue;
            };
            for (name, value) in table {
                if name.eq_ignore_ascii_case("python") {
                    continue;
                }
                let raw = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Table(t) => t
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or("*")
                        .to_string(),
                    _ => continue,
                };
                specs.push(DependencySpec {
                    constraint: parse_constraint(&raw, ManifestFormat::PyprojectToml),
                    name: name.clone(),
                    raw_constraint: raw,
                    manifest: manifest.to_path_buf(),
                    format: ManifestFormat::PyprojectToml,
                });
            }
        }
        Ok(specs)
    }
}

struct CargoTomlParser;

impl ManifestParser for CargoTomlParser {
    fn parse(&self, manifest: &Path, content: &str) -> anyhow::Result<Vec<DependencySpec>> {
        let doc: toml::Value = toml::from_str(content)?;
        let mut specs = Vec::new();
        let mut tables: Vec<&toml::value::Table> = Vec::new();
        for section in ["dependencies", "dev-dependencies", "build-dependencies"] {
            if let Some(t) = doc.get(section).and_then(|d| d.as_table()) {
                tables.push(t);
            }
        }
        if let Some(t) = doc
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(|d| d.as_table())
        {
            tables.push(t);
        }

        for table in tables {
            for (name, value) in table {
                let raw = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Table(t) => match t.get("version").and_then(|v| v.as_str()) {
                        Some(v) => v.to_string(),
                        // Path/git dependencies carry no version constraint.
                        None => continue,
                    },
                    _ => continue,
                };
                specs.push(DependencySpec {
                    constraint: parse_constraint(&raw, ManifestFormat::CargoToml),
                    name: name.clone(),
                    raw_constraint: raw,
                    manifest: manifest.to_path_buf(),
                    format: ManifestFormat::CargoToml,
                });
            }
        }
        Ok(specs)
    }
}

impl Analyzer for DependencyAnalyzer {
    fn id(&self) -> &'static str {
        ID
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn finalize(&self, ctx: &AnalyzerContext) -> Result<Vec<Finding>, EngineError> {
        let mut findings = Vec::new();
        let mut all_specs: Vec<DependencySpec> = Vec::new();

        for file in ctx.files {
            let FileKind::Manifest(format) = file.kind else {
                continue;
            };
            if let Some(cached) = ctx.cache.lookup_as::<Vec<DependencySpec>>(file, ID, VERSION) {
                all_specs.extend(cached);
                continue;
            }
            let content = match std::fs::read_to_string(&file.absolute_path) {
                Ok(c) => c,
                Err(e) => {
                    let err = EngineError::Io {
                        path: file.relative_path.clone(),
                        message: e.to_string(),
                    };
                    findings.extend(err.into_finding());
                    continue;
                }
            };
            match parser_for(format).parse(&file.relative_path, &content) {
                Ok(specs) => {
                    ctx.cache.store_serialized(file, ID, VERSION, &specs);
                    all_specs.extend(specs);
                }
                Err(e) => {
                    let err = EngineError::Parse {
                        path: file.relative_path.clone(),
                        message: format!("{format}: {e}"),
                    };
                    findings.extend(err.into_finding());
                }
            }
        }

        // Union constraints per package, in stable name order.
        let mut by_package: BTreeMap<String, Vec<&DependencySpec>> = BTreeMap::new();
        for spec in &all_specs {
            by_package.entry(spec.name.clone()).or_default().push(spec);
        }

        for (package, specs) in &by_package {
            let mut conflicting: Option<(usize, usize)> = None;
            'outer: for i in 0..specs.len() {
                for j in (i + 1)..specs.len() {
                    if !specs[i].constraint.intersects(&specs[j].constraint) {
                        conflicting = Some((i, j));
                        break 'outer;
                    }
                }
            }

            if let Some((i, j)) = conflicting {
                let mut constraints: Vec<String> =
                    specs.iter().map(|s| s.constraint.to_string()).collect();
                constraints.sort();
                constraints.dedup();
                let mut manifests: Vec<String> = specs
                    .iter()
                    .map(|s| s.manifest.display().to_string())
                    .collect();
                manifests.sort();
                manifests.dedup();

                findings.push(
                    Finding::new(
                        Category::Dependency,
                        Severity::High,
                        specs[i].manifest.clone(),
                        format!(
                            "version conflict for `{package}`: {} vs {} (declared in {})",
                            specs[i].constraint,
                            specs[j].constraint,
                            manifests.join(", ")
                        ),
                        "align the declarations on a single satisfiable constraint",
                    )
                    .with_evidence(format!("package:{package}"))
                    .with_evidence(format!("constraints:{}", constraints.join("|"))),
                );
                continue;
            }

            // Outdated check only when the constraints are consistent.
            if let Some(latest_raw) = ctx.feed.latest(package) {
                if let Some(latest) = Version::parse(&latest_raw) {
                    let implied: Vec<&Version> = specs
                        .iter()
                        .filter_map(|s| s.constraint.implied_version())
                        .collect();
                    if !implied.is_empty() && implied.iter().all(|v| **v < latest) {
                        let newest = implied.iter().max().copied();
                        findings.push(
                            Finding::new(
                                Category::Dependency,
                                Severity::Medium,
                                specs[0].manifest.clone(),
                                format!(
                                    "`{package}` is outdated: declared {} but latest known is {latest}",
                                    newest.map(|v| v.to_string()).unwrap_or_default()
                                ),
                                "upgrade the constraint to the latest version",
                            )
                            .with_evidence(format!("package:{package}")),
                        );
                    }
                }
            }
        }

        tracing::debug!(
            specs = all_specs.len(),
            packages = by_package.len(),
            "dependency analysis complete"
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinned(s: &str) -> Constraint {
        Constraint::Pinned(Version::parse(s).unwrap())
    }

    #[test]
    fn version_ordering_pads_with_zeros() {
        let a = Version::parse("1.2").unwrap();
        let b = Version::parse("1.2.0").unwrap();
        let c = Version::parse("1.10").unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(a < c);
    }

    #[test]
    fn pinned_literal_mismatch_conflicts() {
        assert!(!pinned("1.0.0").intersects(&pinned("2.0.0")));
        assert!(pinned("1.0.0").intersects(&pinned("1.0.0")));
    }

    #[test]
    fn caret_ranges_intersect_when_overlapping() {
        let a = parse_constraint("^1.2.0", ManifestFormat::PackageJson);
        let b = parse_constraint(">=1.5,<2.0", ManifestFormat::RequirementsTxt);
        let c = parse_constraint("^2.0.0", ManifestFormat::PackageJson);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn zero_major_caret_is_narrow() {
        let a = parse_constraint("^0.2.3", ManifestFormat::CargoToml);
        let b = parse_constraint("0.3.0", ManifestFormat::RequirementsTxt);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn bare_cargo_version_gets_caret_semantics() {
        let c = parse_constraint("1.2", ManifestFormat::CargoToml);
        assert!(c.intersects(&pinned("1.9.4")));
        assert!(!c.intersects(&pinned("2.0.0")));
    }

    #[test]
    fn compatible_release_operator_bounds_minor() {
        let c = parse_constraint("~=1.4.2", ManifestFormat::RequirementsTxt);
        assert!(c.intersects(&pinned("1.4.9")));
        assert!(!c.intersects(&pinned("1.5.0")));
    }

    #[test]
    fn package_json_parser_reads_both_sections() {
        let content = r#"{
            "dependencies": { "express": "^4.18.0" },
            "devDependencies": { "jest": "~29.0.0" }
        }"#;
        let specs = PackageJsonParser
            .parse(Path::new("package.json"), content)
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().any(|s| s.name == "express"));
        assert!(specs.iter().any(|s| s.name == "jest"));
    }

    #[test]
    fn requirements_parser_handles_extras_and_comments() {
        let content = "Django==4.2.0\nrequests[socks]>=2.28.0  # with extras\n# comment\n-r other.txt\n";
        let specs = RequirementsTxtParser
            .parse(Path::new("requirements.txt"), content)
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "Django");
        assert_eq!(specs[0].constraint, pinned("4.2.0"));
        assert_eq!(specs[1].name, "requests");
    }

    #[test]
    fn pyproject_parser_reads_pep621_and_poetry() {
        let content = r#"
[project]
dependencies = ["httpx>=0.27", "click==8.1.7"]

[tool.poetry.dependencies]
python = ">=3.11"
rich = "^13.0"
"#;
        let specs = PyprojectTomlParser
            .parse(Path::new("pyproject.toml"), content)
            .unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"httpx"));
        assert!(names.contains(&"click"));
        assert!(names.contains(&"rich"));
        assert!(!names.contains(&"python"));
    }

    #[test]
    fn cargo_parser_reads_table_dependencies() {
        let content = r#"
[dependencies]
serde = { version = "1.0", features = ["derive"] }
local = { path = "../local" }

[dev-dependencies]
tempfile = "3.8"
"#;
        let specs = CargoTomlParser
            .parse(Path::new("Cargo.toml"), content)
            .unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"serde"));
        assert!(names.contains(&"tempfile"));
        // Path dependencies have no version constraint.
        assert!(!names.contains(&"local"));
    }

    #[test]
    fn static_feed_reports_latest() {
        let mut map = HashMap::new();
        map.insert("requests".to_string(), "2.32.0".to_string());
        let feed = StaticFeed::new(map);
        assert_eq!(feed.latest("requests").as_deref(), Some("2.32.0"));
        assert!(feed.latest("flask").is_none());
        assert!(OfflineFeed.latest("requests").is_none());
    }
}
