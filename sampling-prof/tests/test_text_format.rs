use std::sync::Arc;

use sampling_prof::analysis::{flat_report, FlatReport};
use sampling_prof::domain::{Frame, NodeId};
use sampling_prof::export::Profile;
use sampling_prof::profiling::{Session, ThreadRegistry};

const FIXTURE: &str = "tests/fixtures/profile.txt";

fn stack(labels: &[&'static str]) -> Vec<Frame> {
    // Leaf first, as captured
    labels.iter().rev().map(|label| Frame::new("src/app.rs", 1, *label)).collect()
}

fn recorded_session() -> Session {
    let mut session = Session::new(Arc::new(ThreadRegistry::new()));
    session.process(&[
        stack(&["main", "fib", "fib", "fib"]),
        stack(&["main", "fib"]),
        stack(&["main", "parse"]),
    ]);
    session.process(&[stack(&["main", "fib", "fib"]), stack(&["main"])]);
    session
}

#[test]
fn test_fixture_parses() {
    let text = std::fs::read_to_string(FIXTURE).unwrap();
    let profile = Profile::parse(&text).unwrap();

    assert_eq!(profile.runtime_ms, 2048.5);
    assert_eq!(profile.nodes.len(), 3);
    assert_eq!(profile.nodes[2].name, "src/config.rs:12:parse<K, V>");
    assert_eq!(profile.total_samples(), 10);
    assert_eq!(profile.edges.len(), 4);
    assert_eq!(profile.edges[0].from, NodeId::ROOT);
}

#[test]
fn test_fixture_reserializes_identically() {
    let text = std::fs::read_to_string(FIXTURE).unwrap();
    let profile: Profile = text.parse().unwrap();
    assert_eq!(profile.to_text(), text);
}

#[test]
fn test_session_round_trip_keeps_report() {
    let profile = recorded_session().result();
    let direct = flat_report(&profile.node_names(), &profile.counts);

    let parsed = Profile::parse(&profile.to_text()).unwrap();
    let reparsed = FlatReport::from(&parsed);

    assert_eq!(direct, reparsed);
    assert_eq!(parsed.nodes, profile.nodes);
    assert_eq!(parsed.counts, profile.counts);
    assert_eq!(parsed.edges, profile.edges);
}

#[test]
fn test_session_counts_recursion_once() {
    let profile = recorded_session().result();
    let names = profile.node_names();
    let fib = profile.nodes.iter().find(|n| n.name == "src/app.rs:1:fib").unwrap().id;
    let main = profile.nodes.iter().find(|n| n.name == "src/app.rs:1:main").unwrap().id;

    let fib_counts = profile.counts.iter().find(|c| c.id == fib).unwrap();
    // fib is on 3 of the 5 stacks and the leaf of all 3
    assert_eq!((fib_counts.self_count, fib_counts.total_count), (3, 3));

    let main_counts = profile.counts.iter().find(|c| c.id == main).unwrap();
    assert_eq!((main_counts.self_count, main_counts.total_count), (1, 5));

    let self_edge = profile.edges.iter().find(|e| e.from == fib && e.to == fib).unwrap();
    assert_eq!(self_edge.count, 2);
    assert_eq!(names.len(), 3);
}

#[test]
fn test_empty_session_result() {
    let profile = Session::new(Arc::new(ThreadRegistry::new())).result();

    assert!(profile.is_empty());
    assert_eq!(profile.total_samples(), 0);
    assert_eq!(profile.runtime_ms, 0.0);
}
