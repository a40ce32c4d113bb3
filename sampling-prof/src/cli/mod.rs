//! Command-line interface for sampling-prof
//!
//! This module contains CLI argument parsing

pub mod args;

pub use args::{Args, Command, RecordArgs, ReportArgs};
