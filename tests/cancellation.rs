//! A cancelled run still emits a report, marked partial, and never
//! references files that were not scanned.

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use repohealth::{EngineConfig, Orchestrator};

#[test]
fn expired_deadline_yields_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        fs::write(
            dir.path().join(format!("mod_{i:02}.py")),
            "def f():\n    return 1\n",
        )
        .unwrap();
    }

    let config = EngineConfig {
        root: dir.path().to_path_buf(),
        timeout: Some(Duration::from_secs(0)),
        ..EngineConfig::default()
    };
    let report = Orchestrator::new(config).run().unwrap();

    assert!(report.partial);
    // Nothing was scanned, so nothing may be reported.
    assert!(report.findings.is_empty());
}

#[test]
fn pre_tripped_interrupt_yields_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();

    let interrupt = Arc::new(AtomicBool::new(true));
    let config = EngineConfig {
        root: dir.path().to_path_buf(),
        ..EngineConfig::default()
    };
    let report = Orchestrator::new(config)
        .with_interrupt(interrupt)
        .run()
        .unwrap();

    assert!(report.partial);
    assert!(report.findings.is_empty());
}

#[test]
fn uncancelled_run_is_complete() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.py"), "def f():\n    return 1\n").unwrap();

    let config = EngineConfig {
        root: dir.path().to_path_buf(),
        timeout: Some(Duration::from_secs(3600)),
        ..EngineConfig::default()
    };
    let report = Orchestrator::new(config).run().unwrap();
    assert!(!report.partial);
}
