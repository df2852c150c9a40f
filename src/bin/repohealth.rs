//! CLI surface consumed by external renderers: run the engine over a root
//! and print the report. Exit codes: 0 = completed, 1 = completed with
//! HIGH findings under --strict, 2 = fatal run error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use repohealth::{AnalyzerSelection, EngineConfig, Orchestrator, Report, Severity};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

#[derive(Debug, Parser)]
#[command(
    name = "repohealth",
    version,
    about = "Project-health static analysis: duplicates, dead code, dependency conflicts, complexity, global state"
)]
struct Cli {
    /// Root path of the tree to analyze
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Exclude globs, repeatable (e.g. --exclude '**/generated/**')
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Comma-separated analyzer ids to run (default: all)
    #[arg(long, value_name = "IDS")]
    analyzers: Option<String>,

    /// Drop findings below this severity
    #[arg(long, value_name = "SEVERITY", default_value = "low")]
    severity_floor: Severity,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Cache directory (default: <root>/.repohealth-cache)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Run deadline in seconds; an expired deadline yields a partial report
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Exit 1 when the report contains HIGH-severity findings
    #[arg(long)]
    strict: bool,
}

fn build_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::load(cli.root.clone());
    config.exclude_globs.extend(cli.exclude.iter().cloned());
    if let Some(ids) = &cli.analyzers {
        let ids: Vec<String> = ids
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !ids.is_empty() {
            config.analyzers = AnalyzerSelection::Only(ids);
        }
    }
    config.severity_floor = cli.severity_floor;
    config.cache_dir = cli.cache_dir.clone();
    config.timeout = cli.timeout.map(Duration::from_secs);
    config.strict = cli.strict;
    config
}

fn emit(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", report.to_json().context("serializing report")?);
        }
        OutputFormat::Summary => {
            print!("{}", report.to_summary_text());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli);
    let strict = config.strict;

    let orchestrator = Orchestrator::new(config);
    let report = match orchestrator.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("repohealth: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = emit(&report, cli.format) {
        eprintln!("repohealth: {e}");
        return ExitCode::from(2);
    }

    if strict && report.has_high_findings() {
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
