//! # sampling-prof - Main Entry Point
//!
//! Supports two subcommands:
//! - **record**: profile the built-in workload until `--duration` elapses or Ctrl+C
//! - **report**: render the flat report of a persisted profile record

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use sampling_prof::analysis::{load_profile, render_flat_report, FlatReport, DEFAULT_REPORT_ROWS};
use sampling_prof::cli::{Args, Command, RecordArgs, ReportArgs};
use sampling_prof::domain::ProfilerError;
use sampling_prof::export::{FileSink, Profile};
use sampling_prof::profiling::config::from_secs_f64;
use sampling_prof::profiling::{ProfilerConfig, SamplingProf, ShadowStacks};
use sampling_prof::workload;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ProfilerError>() {
        Some(ProfilerError::InvalidConfig(_)) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Report(report_args) => report(&report_args),
        Command::Record(record_args) => record(&record_args).await,
    }
}

fn report(args: &ReportArgs) -> Result<()> {
    let profile = load_profile(&args.file)
        .with_context(|| format!("Failed to read profile {}", args.file.display()))?;

    let mut out = io::stdout().lock();
    if args.json {
        let mut report = FlatReport::from(&profile);
        report.rows.truncate(args.top);
        serde_json::to_writer_pretty(&mut out, &report).context("Failed to write JSON report")?;
        writeln!(out)?;
    } else {
        render_flat_report(&profile, args.top, &mut out)?;
    }
    Ok(())
}

/// Build the profiler configuration from CLI arguments.
///
/// More than one workload thread switches to multithreading mode, where
/// sessions rotate every `--output-interval` seconds.
fn profiler_config(args: &RecordArgs) -> Result<ProfilerConfig> {
    if args.threads == 0 {
        return Err(ProfilerError::InvalidConfig("--threads must be at least 1".to_string()).into());
    }
    let config = ProfilerConfig::default()
        .with_sampling_interval(from_secs_f64("interval", args.interval)?)
        .with_max_sampling_threads(args.threads);

    if args.threads > 1 {
        Ok(config
            .with_multithreading(true)
            .with_output_interval(Some(from_secs_f64("output-interval", args.output_interval)?)))
    } else {
        Ok(config)
    }
}

async fn record(args: &RecordArgs) -> Result<()> {
    let config = profiler_config(args)?;

    let mut sink = FileSink::new(&args.output);
    if config.multithreading {
        sink = sink.numbered();
    }
    let written: Arc<Mutex<Vec<PathBuf>>> = Arc::default();
    let handler = {
        let written = Arc::clone(&written);
        move |profile: Profile| -> Result<()> {
            let path = sink.write(&profile)?;
            info!("Session with {} samples written to {}", profile.total_samples(), path.display());
            written.lock().unwrap_or_else(PoisonError::into_inner).push(path);
            Ok(())
        }
    };

    let stacks = ShadowStacks::new();
    let prof = Arc::new(SamplingProf::new(config, stacks.clone())?.with_output_handler(handler));
    let stop = Arc::new(AtomicBool::new(false));

    info!(
        "Recording {} workload thread(s), sampling every {:?}",
        args.threads,
        prof.sampling_interval()
    );
    let started = Instant::now();

    let mut workers = Vec::with_capacity(args.threads);
    for i in 0..args.threads {
        let prof = Arc::clone(&prof);
        let stacks = stacks.clone();
        let stop = Arc::clone(&stop);
        let depth = args.depth;
        let worker = std::thread::Builder::new()
            .name(format!("workload-{i}"))
            .spawn(move || prof.profile(|| workload::run(&stacks, depth, &stop)))
            .context("Failed to spawn workload thread")?;
        workers.push(worker);
    }

    let exit_reason = if args.duration > 0 {
        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(args.duration)) => "duration limit reached",
            _ = tokio::signal::ctrl_c() => "interrupted",
        }
    } else {
        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        "interrupted"
    };

    stop.store(true, Ordering::Relaxed);
    let mut rounds = 0;
    for worker in workers {
        rounds += worker.join().map_err(|_| anyhow::anyhow!("Workload thread panicked"))??;
    }
    prof.terminate()?;

    let written = std::mem::take(&mut *written.lock().unwrap_or_else(PoisonError::into_inner));
    eprintln!(
        "\n{exit_reason}: {:.1}s, {rounds} workload rounds, {} profile file(s)",
        started.elapsed().as_secs_f64(),
        written.len()
    );

    if !args.quiet {
        if let Some(last) = written.last() {
            let profile = load_profile(last)
                .with_context(|| format!("Failed to read profile {}", last.display()))?;
            render_flat_report(&profile, DEFAULT_REPORT_ROWS, &mut io::stdout().lock())?;
        }
    }
    Ok(())
}
