//! Flat report: nodes ranked by self samples.
//!
//! ```text
//! runtime: 1.567 secs
//! total samples: 5
//! self    %       total   %       name
//! 4       80.00%  4       80.00%  src/lib.rs:30:fib
//! 1       20.00%  5       100.00% src/lib.rs:12:main
//! ```
//!
//! Both percentage columns divide by the sum of self counts, so `total %`
//! can exceed 100% for frames that sit below other frames in most stacks.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use crate::domain::{FormatError, NodeId};
use crate::export::{Profile, SampleCount};

/// Rows printed by the rendered report
pub const DEFAULT_REPORT_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatRow {
    pub self_count: u64,
    pub self_pct: String,
    pub total_count: u64,
    pub total_pct: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatReport {
    /// Sum of self counts over all nodes
    pub total: u64,
    /// Nodes with at least one self sample, most self samples first
    pub rows: Vec<FlatRow>,
}

fn percentage(count: u64, total: u64) -> String {
    format!("{:.2}%", 100.0 * count as f64 / total as f64)
}

/// Rank nodes by self count
///
/// Ties keep the order of `counts`. Nodes missing from `names` are shown by id.
#[must_use]
pub fn flat_report(names: &HashMap<NodeId, String>, counts: &[SampleCount]) -> FlatReport {
    let total: u64 = counts.iter().map(|c| c.self_count).sum();

    let mut ranked: Vec<&SampleCount> = counts.iter().filter(|c| c.self_count > 0).collect();
    ranked.sort_by(|a, b| b.self_count.cmp(&a.self_count));

    let rows = ranked
        .into_iter()
        .map(|count| FlatRow {
            self_count: count.self_count,
            self_pct: percentage(count.self_count, total),
            total_count: count.total_count,
            total_pct: percentage(count.total_count, total),
            name: names.get(&count.id).cloned().unwrap_or_else(|| count.id.to_string()),
        })
        .collect();

    FlatReport { total, rows }
}

impl From<&Profile> for FlatReport {
    fn from(profile: &Profile) -> Self {
        flat_report(&profile.node_names(), &profile.counts)
    }
}

/// Write the text report with at most `top` rows
///
/// # Errors
/// Returns any error from `out`.
pub fn render_flat_report(profile: &Profile, top: usize, out: &mut impl Write) -> io::Result<()> {
    let report = FlatReport::from(profile);

    writeln!(out, "runtime: {} secs", profile.runtime_ms / 1000.0)?;
    writeln!(out, "total samples: {}", report.total)?;
    writeln!(out, "self\t%\ttotal\t%\tname")?;
    for row in report.rows.iter().take(top) {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.self_count, row.self_pct, row.total_count, row.total_pct, row.name
        )?;
    }
    Ok(())
}

/// Read a persisted record
///
/// # Errors
/// Returns [`FormatError`] if the file cannot be read or parsed.
pub fn load_profile(path: impl AsRef<Path>) -> Result<Profile, FormatError> {
    let text = std::fs::read_to_string(path)?;
    Profile::parse(&text)
}

/// Render the report of a persisted record with the default row limit
///
/// # Errors
/// Returns [`FormatError`] if the file cannot be read or parsed, or writing fails.
pub fn report_file(path: impl AsRef<Path>, out: &mut impl Write) -> Result<(), FormatError> {
    let profile = load_profile(path)?;
    render_flat_report(&profile, DEFAULT_REPORT_ROWS, out)?;
    Ok(())
}
