//! Analysis of closed sessions
//!
//! Pure ranking logic over persisted or in-memory profiles, separated from
//! the sampler and the binary's presentation.

pub mod flat_report;

pub use flat_report::{
    flat_report, load_profile, render_flat_report, report_file, FlatReport, FlatRow,
    DEFAULT_REPORT_ROWS,
};
