//! Profile export
//!
//! This module provides the persisted form of closed sessions and the default
//! file-based output handler that writes it.

pub mod file_sink;
pub mod text_format;

pub use file_sink::{FileSink, DEFAULT_OUTPUT_FILE};
pub use text_format::{Edge, NodeEntry, Profile, SampleCount};
