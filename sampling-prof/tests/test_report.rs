use std::collections::HashMap;

use sampling_prof::analysis::{flat_report, load_profile, render_flat_report, report_file, FlatRow};
use sampling_prof::domain::{FormatError, NodeId};
use sampling_prof::export::SampleCount;

const FIXTURE: &str = "tests/fixtures/profile.txt";

const FIXTURE_REPORT: &str = "\
runtime: 2.0485 secs
total samples: 10
self\t%\ttotal\t%\tname
7\t70.00%\t7\t70.00%\tsrc/lib.rs:30:fib
2\t20.00%\t2\t20.00%\tsrc/config.rs:12:parse<K, V>
1\t10.00%\t10\t100.00%\tsrc/main.rs:10:main
";

#[test]
fn test_report_fixture() {
    let mut out = Vec::new();
    report_file(FIXTURE, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), FIXTURE_REPORT);
}

#[test]
fn test_report_top_rows() {
    let profile = load_profile(FIXTURE).unwrap();
    let mut out = Vec::new();
    render_flat_report(&profile, 2, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let rows: Vec<&str> = text.lines().skip(3).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].ends_with("src/lib.rs:30:fib"));
    assert!(rows[1].ends_with("src/config.rs:12:parse<K, V>"));
}

#[test]
fn test_flat_report_worked_example() {
    let names = HashMap::from([(NodeId(0), "a".to_string()), (NodeId(1), "b".to_string())]);
    let counts = [
        SampleCount { id: NodeId(0), self_count: 1, total_count: 5 },
        SampleCount { id: NodeId(1), self_count: 4, total_count: 4 },
    ];

    let report = flat_report(&names, &counts);

    assert_eq!(report.total, 5);
    let rows: Vec<(u64, &str, u64, &str, &str)> = report
        .rows
        .iter()
        .map(|r: &FlatRow| {
            (r.self_count, r.self_pct.as_str(), r.total_count, r.total_pct.as_str(), r.name.as_str())
        })
        .collect();
    assert_eq!(rows, vec![(4, "80.00%", 4, "80.00%", "b"), (1, "20.00%", 5, "100.00%", "a")]);
}

#[test]
fn test_report_json_rows() {
    let profile = load_profile(FIXTURE).unwrap();
    let report = flat_report(&profile.node_names(), &profile.counts);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total"], 10);
    assert_eq!(json["rows"][0]["name"], "src/lib.rs:30:fib");
    assert_eq!(json["rows"][0]["self_pct"], "70.00%");
}

#[test]
fn test_report_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = report_file(dir.path().join("absent.txt"), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, FormatError::Io(_)));
}

#[test]
fn test_report_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.txt");
    std::fs::write(&path, "2048.5\n\nsrc/main.rs:10:main,0\n").unwrap();

    let err = report_file(&path, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, FormatError::MissingSections { found: 2 }));
}
