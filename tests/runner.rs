//! Suite-level tests: YAML in, report out.

mod common;

use std::fs;

use pretty_assertions::assert_eq;

use common::{options, Journal, Method, MockEngine, MockStore, STREAM_SCRIPT};
use kapacitor_unit::{CaseStatus, Runner, TestSuite};

const SUITE: &str = r#"
tests:
  - name: "passes"
    task_name: alert_weather.tick
    db: weather
    data:
      - weather,location=us-midwest temperature=82
    expects:
      warn: 1

  - name: "both inputs"
    task_name: alert_weather.tick
    db: weather
    recording_id: rec-1
    data:
      - weather,location=us-midwest temperature=82
    expects:
      warn: 1

  - name: "no script"
    task_name: missing.tick
    db: weather
    data:
      - weather,location=us-midwest temperature=82

  - name: "wrong count"
    task_name: alert_weather.tick
    db: weather
    data:
      - weather,location=us-midwest temperature=82
    expects:
      warn: 2
"#;

fn scripts_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("alert_weather.tick"), STREAM_SCRIPT).unwrap();
    dir
}

#[tokio::test]
async fn suite_reports_every_test_and_keeps_going() {
    let dir = scripts_dir();
    let suite = TestSuite::from_yaml(SUITE).unwrap();
    let journal = Journal::default();
    let engine = MockEngine::new(&journal).with_stats(&[("warns_triggered", 1)]);
    let store = MockStore::new(&journal);

    let runner = Runner::new(&engine, &store, options());
    let report = runner.run_suite(&suite, dir.path()).await;

    let statuses: Vec<CaseStatus> = report.cases.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            CaseStatus::Passed,
            CaseStatus::Invalid,
            CaseStatus::Errored,
            CaseStatus::Failed,
        ]
    );
    assert!(!report.all_passed());
    assert!(report.cases[1].message.contains("recording_id"));
    assert!(report.cases[2].message.contains("missing.tick"));
    assert_eq!(report.cases[3].message, "warn: expected 2, got 1");

    // Only the two runnable tests reached the engine.
    assert_eq!(journal.count(Method::LoadTask), 2);
    assert_eq!(journal.count(Method::DeleteTask), 2);
}

#[tokio::test]
async fn cancelled_run_skips_remaining_tests() {
    let dir = scripts_dir();
    let suite = TestSuite::from_yaml(SUITE).unwrap();
    let journal = Journal::default();
    let engine = MockEngine::new(&journal);
    let store = MockStore::new(&journal);
    let opts = options();
    opts.cancel.cancel();

    let report = Runner::new(&engine, &store, opts)
        .run_suite(&suite, dir.path())
        .await;

    assert_eq!(report.count(CaseStatus::Errored), 4);
    assert!(report.cases.iter().all(|c| c.message == "run cancelled"));
    assert!(journal.is_empty());
}

#[tokio::test]
async fn all_passing_suite() {
    let dir = scripts_dir();
    let suite = TestSuite::from_yaml(
        "- name: ok\n  task_name: alert_weather.tick\n  db: weather\n  data:\n    - weather temperature=90\n  expects:\n    warn: 1\n",
    )
    .unwrap();
    let journal = Journal::default();
    let engine = MockEngine::new(&journal).with_stats(&[("warns_triggered", 1)]);
    let store = MockStore::new(&journal);

    let report = Runner::new(&engine, &store, options())
        .run_suite(&suite, dir.path())
        .await;

    assert!(report.all_passed());
    assert_eq!(report.total(), 1);
}
