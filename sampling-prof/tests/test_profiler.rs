use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sampling_prof::domain::{Frame, ProfilerError};
use sampling_prof::export::Profile;
use sampling_prof::profiling::{ProfilerConfig, SamplingProf, ShadowStacks};
use sampling_prof::workload;

fn fast(config: ProfilerConfig) -> ProfilerConfig {
    config.with_sampling_interval(Duration::from_millis(10))
}

/// Profiler whose flushed sessions are collected in memory
fn collecting(config: ProfilerConfig) -> (SamplingProf, ShadowStacks, Arc<Mutex<Vec<Profile>>>) {
    let stacks = ShadowStacks::new();
    let flushed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&flushed);
    let prof = SamplingProf::new(fast(config), stacks.clone())
        .unwrap()
        .with_output_handler(move |profile| {
            sink.lock().unwrap().push(profile);
            Ok(())
        });
    (prof, stacks, flushed)
}

fn busy(stacks: &ShadowStacks, outer: &'static str, inner: &'static str, time: Duration) {
    let _outer = stacks.enter(Frame::new("work.rs", 1, outer));
    let _inner = stacks.enter(Frame::new("work.rs", 2, inner));
    thread::sleep(time);
}

#[test]
fn test_single_session_flushes_once() {
    let (prof, stacks, flushed) = collecting(ProfilerConfig::default());

    assert!(prof.start().unwrap());
    busy(&stacks, "outer", "inner", Duration::from_millis(150));
    assert!(prof.stop().unwrap());

    let flushed = flushed.lock().unwrap();
    assert_eq!(flushed.len(), 1);

    let profile = &flushed[0];
    let names: Vec<&str> = profile.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["work.rs:1:outer", "work.rs:2:inner"]);
    assert!(profile.total_samples() > 0);
    assert!(profile.counts[1].self_count > 0);
    assert_eq!(profile.counts[0].total_count, profile.total_samples());
    assert!(profile.runtime_ms >= 100.0);
}

#[test]
fn test_idle_session_never_calls_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let prof = SamplingProf::new(fast(ProfilerConfig::default()), ShadowStacks::new())
        .unwrap()
        .with_output_handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("handler must not run for an empty session")
        });

    assert!(prof.start().unwrap());
    thread::sleep(Duration::from_millis(50));
    assert!(prof.stop().unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_handler_error_surfaces_from_stop() {
    let stacks = ShadowStacks::new();
    let prof = SamplingProf::new(fast(ProfilerConfig::default()), stacks.clone())
        .unwrap()
        .with_output_handler(|_| anyhow::bail!("disk full"));

    prof.start().unwrap();
    busy(&stacks, "outer", "inner", Duration::from_millis(50));

    let err = prof.stop().unwrap_err();
    assert!(matches!(err, ProfilerError::OutputHandler(_)));
    assert!(err.to_string().contains("disk full"));
    assert!(!prof.is_running());
}

#[test]
fn test_rotating_mode_flushes_several_sessions() {
    let config = ProfilerConfig::multithreaded().with_output_interval(Some(Duration::from_millis(100)));
    let (prof, stacks, flushed) = collecting(config);

    thread::scope(|s| {
        for label in ["worker_a", "worker_b"] {
            let prof = &prof;
            let stacks = &stacks;
            s.spawn(move || {
                assert!(prof.start().unwrap());
                assert!(prof.profiling());
                busy(stacks, "run", label, Duration::from_millis(400));
                assert!(prof.stop().unwrap());
                assert!(!prof.profiling());
            });
        }
    });

    assert!(prof.is_running());
    assert!(prof.terminate().unwrap());

    let flushed = flushed.lock().unwrap();
    assert!(flushed.len() > 1, "expected rotation, got {} session(s)", flushed.len());
    for profile in flushed.iter() {
        assert!(profile.total_samples() > 0);
    }
}

#[test]
fn test_rotating_mode_stop_keeps_other_threads_sampled() {
    let (prof, stacks, flushed) = collecting(ProfilerConfig::multithreaded());

    assert!(prof.start().unwrap());
    thread::scope(|s| {
        s.spawn(|| {
            assert!(prof.start().unwrap());
            assert!(prof.stop().unwrap());
        });
    });
    assert!(prof.is_running());
    assert_eq!(prof.registered_threads().len(), 1);

    busy(&stacks, "main", "still_sampled", Duration::from_millis(60));
    assert!(prof.stop().unwrap());
    assert!(prof.terminate().unwrap());

    let flushed = flushed.lock().unwrap();
    assert_eq!(flushed.len(), 1);
    assert!(flushed[0].nodes.iter().any(|n| n.name == "work.rs:2:still_sampled"));
}

#[test]
fn test_profile_helper_writes_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.txt");
    let stacks = ShadowStacks::new();
    let prof = SamplingProf::new(fast(ProfilerConfig::default()), stacks.clone()).unwrap();
    prof.set_output_file(&path);

    let value = prof
        .profile(|| {
            busy(&stacks, "outer", "inner", Duration::from_millis(80));
            42
        })
        .unwrap();
    assert_eq!(value, 42);
    assert!(!prof.profiling());

    let profile = Profile::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(profile.nodes.len(), 2);

    let mut out = Vec::new();
    prof.report(&mut out).unwrap();
    let report = String::from_utf8(out).unwrap();
    assert!(report.starts_with("runtime: "));
    assert!(report.contains("self\t%\ttotal\t%\tname\n"));
    assert!(report.contains("\twork.rs:2:inner\n"));
}

#[test]
fn test_restart_opens_fresh_session() {
    let (prof, stacks, flushed) = collecting(ProfilerConfig::default());

    prof.profile(|| busy(&stacks, "first", "a", Duration::from_millis(50))).unwrap();
    prof.profile(|| busy(&stacks, "second", "b", Duration::from_millis(50))).unwrap();

    let flushed = flushed.lock().unwrap();
    assert_eq!(flushed.len(), 2);
    assert!(flushed[1].nodes.iter().all(|n| !n.name.contains("first")));
}

#[test]
fn test_recursive_workload_totals_bounded_by_samples() {
    let (prof, stacks, flushed) = collecting(ProfilerConfig::default());

    prof.profile(|| {
        let deadline = std::time::Instant::now() + Duration::from_millis(150);
        while std::time::Instant::now() < deadline {
            workload::fib(&stacks, 18);
        }
    })
    .unwrap();

    let flushed = flushed.lock().unwrap();
    let profile = &flushed[0];
    let samples = profile.total_samples();
    assert!(samples > 0);
    for count in &profile.counts {
        assert!(count.self_count <= count.total_count);
        assert!(count.total_count <= samples);
    }
    for edge in &profile.edges {
        assert!(edge.count <= samples);
    }
}

#[test]
fn test_drop_flushes_open_session() {
    let (prof, stacks, flushed) = collecting(ProfilerConfig::default());
    prof.start().unwrap();
    busy(&stacks, "outer", "inner", Duration::from_millis(50));
    drop(prof);

    assert_eq!(flushed.lock().unwrap().len(), 1);
}
