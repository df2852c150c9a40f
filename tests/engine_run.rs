//! End-to-end engine runs over fixture trees.

use std::fs;
use std::path::Path;

use repohealth::{Category, EngineConfig, Orchestrator, Severity};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn config_for(root: &Path) -> EngineConfig {
    EngineConfig {
        root: root.to_path_buf(),
        ..EngineConfig::default()
    }
}

#[test]
fn identical_files_form_an_exact_duplicate_group() {
    let dir = tempfile::tempdir().unwrap();
    let content = "def shared_logic():\n    return 42\n";
    write(dir.path(), "pkg_a/util.py", content);
    write(dir.path(), "pkg_b/util.py", content);

    let report = Orchestrator::new(config_for(dir.path())).run().unwrap();

    let dupes: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.category == Category::Duplicate)
        .collect();
    assert_eq!(dupes.len(), 1, "one finding per non-canonical member");
    assert_eq!(dupes[0].severity, Severity::High);
    // Canonical member is the lexicographically earliest path; the finding
    // lands on the other copy.
    assert!(dupes[0].file.to_string_lossy().contains("pkg_b"));
    assert!(dupes[0].message.contains("pkg_a"));
}

#[test]
fn conflicting_pins_yield_exactly_one_version_conflict() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "svc_a/requirements.txt", "leftpad==1.0.0\n");
    write(dir.path(), "svc_b/requirements.txt", "leftpad==2.0.0\n");

    let report = Orchestrator::new(config_for(dir.path())).run().unwrap();

    let conflicts: Vec<_> = report
        .findings
        .iter()
        .filter(|f| {
            f.category == Category::Dependency && f.message.contains("version conflict")
        })
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::High);
    assert!(conflicts[0].message.contains("leftpad"));
    assert!(conflicts[0].message.contains("svc_a/requirements.txt"));
    assert!(conflicts[0].message.contains("svc_b/requirements.txt"));
}

#[test]
fn compatible_constraints_are_not_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/requirements.txt", "requests>=2.20\n");
    write(dir.path(), "b/requirements.txt", "requests>=2.28,<3.0\n");

    let report = Orchestrator::new(config_for(dir.path())).run().unwrap();
    assert!(!report
        .findings
        .iter()
        .any(|f| f.message.contains("version conflict")));
}

#[test]
fn complexity_of_three_ifs_is_four() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "calc.py",
        "def decide(x):\n    if x > 0:\n        pass\n    if x > 1:\n        pass\n    if x > 2:\n        pass\n",
    );

    // Threshold 3 so a score of exactly 4 is reported.
    let config = EngineConfig {
        complexity_threshold: 3,
        ..config_for(dir.path())
    };
    let report = Orchestrator::new(config).run().unwrap();

    let complexity: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.category == Category::Complexity)
        .collect();
    assert_eq!(complexity.len(), 1);
    assert!(complexity[0].message.contains("complexity 4"));
}

#[test]
fn reachable_symbols_survive_dead_code_analysis() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app.py",
        "from worker import process_queue\n\ndef main():\n    process_queue()\n",
    );
    write(
        dir.path(),
        "worker.py",
        "def process_queue():\n    drain_batch()\n\ndef drain_batch():\n    return []\n\ndef forgotten_migration():\n    return None\n",
    );

    let report = Orchestrator::new(config_for(dir.path())).run().unwrap();

    let dead: Vec<&str> = report
        .findings
        .iter()
        .filter(|f| f.category == Category::DeadCode)
        .map(|f| f.message.as_str())
        .collect();
    // Transitively reachable from main: never flagged.
    assert!(!dead.iter().any(|m| m.contains("process_queue")));
    assert!(!dead.iter().any(|m| m.contains("drain_batch")));
    assert!(dead.iter().any(|m| m.contains("forgotten_migration")));
}

#[test]
fn severity_floor_filters_low_findings() {
    let dir = tempfile::tempdir().unwrap();
    let content = "def shared_logic():\n    return 42\n";
    write(dir.path(), "a.py", content);
    write(dir.path(), "b.py", content);

    let config = EngineConfig {
        severity_floor: Severity::High,
        ..config_for(dir.path())
    };
    let report = Orchestrator::new(config).run().unwrap();
    assert!(report.findings.iter().all(|f| f.severity == Severity::High));
}

#[test]
fn report_is_idempotent_after_timestamp_normalization() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.py",
        "import helpers\n\ndef main():\n    helpers.do_work()\n",
    );
    write(
        dir.path(),
        "helpers.py",
        "def do_work():\n    return 1\n\ndef stale_helper():\n    return 2\n",
    );
    write(dir.path(), "requirements.txt", "requests==2.28.0\nflask==2.3.0\n");

    let normalize = |mut value: serde_json::Value| -> String {
        value["timestamp"] = serde_json::Value::String(String::new());
        serde_json::to_string_pretty(&value).unwrap()
    };

    // First run populates the cache; second run must hit it for every
    // file and produce an identical report.
    let first = Orchestrator::new(config_for(dir.path())).run().unwrap();
    let second = Orchestrator::new(config_for(dir.path())).run().unwrap();

    let a = normalize(serde_json::to_value(&first).unwrap());
    let b = normalize(serde_json::to_value(&second).unwrap());
    assert_eq!(a, b);
}

#[test]
fn unreadable_root_is_fatal() {
    let config = EngineConfig {
        root: std::path::PathBuf::from("/nonexistent-repohealth-root"),
        ..EngineConfig::default()
    };
    let err = Orchestrator::new(config).run().unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn analyzer_selection_limits_output_categories() {
    let dir = tempfile::tempdir().unwrap();
    let content = "def shared_logic():\n    return 42\n";
    write(dir.path(), "a.py", content);
    write(dir.path(), "b.py", content);

    let config = EngineConfig {
        analyzers: repohealth::AnalyzerSelection::Only(vec!["duplicates".to_string()]),
        ..config_for(dir.path())
    };
    let report = Orchestrator::new(config).run().unwrap();
    assert!(report
        .findings
        .iter()
        .all(|f| matches!(f.category, Category::Duplicate | Category::Error)));
    assert!(report.summary.contains_key("duplicate"));
}
