//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::analysis::DEFAULT_REPORT_ROWS;
use crate::export::DEFAULT_OUTPUT_FILE;

#[derive(Parser)]
#[command(
    name = "sampling-prof",
    version,
    about = "Sample call stacks and report where time is spent",
    after_help = "\
EXAMPLES:
    sampling-prof record --duration 5                  Profile the demo workload for 5s
    sampling-prof record --threads 4 --output-interval 1
                                                       Rotate a profile file every second
    sampling-prof report profile.txt --top 10          Show the 10 hottest frames"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render the flat report of a persisted profile
    Report(ReportArgs),
    /// Profile the built-in instrumented workload
    Record(RecordArgs),
}

#[derive(ClapArgs)]
pub struct ReportArgs {
    /// Profile record to read
    #[arg(value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
    pub file: PathBuf,

    /// Number of rows to print
    #[arg(long, default_value_t = DEFAULT_REPORT_ROWS)]
    pub top: usize,

    /// Print the ranked rows as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs)]
pub struct RecordArgs {
    /// File the profile is written to (numbered per session with several threads)
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
    pub output: PathBuf,

    /// Sampling interval in seconds
    #[arg(short, long, value_name = "SECS", default_value = "0.1")]
    pub interval: f64,

    /// Worker threads running the workload (more than one enables rotation)
    #[arg(short, long, default_value = "1")]
    pub threads: usize,

    /// Session rotation interval in seconds, with several threads
    #[arg(long, value_name = "SECS", default_value = "60")]
    pub output_interval: f64,

    /// Stop after N seconds (0 = until Ctrl+C)
    #[arg(short, long, value_name = "SECS", default_value = "10")]
    pub duration: u64,

    /// Recursion depth of the workload
    #[arg(long, default_value = "24")]
    pub depth: u32,

    /// Suppress the report printed after recording
    #[arg(short, long)]
    pub quiet: bool,
}
