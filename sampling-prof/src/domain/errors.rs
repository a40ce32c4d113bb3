//! Structured error types for sampling-prof
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::ThreadHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Invalid profiler configuration: {0}")]
    InvalidConfig(String),

    #[error("Output handler failed: {0:#}")]
    OutputHandler(anyhow::Error),

    #[error("Sampler thread panicked")]
    SamplerPanicked,

    #[error("Failed to spawn sampler thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failure of the stack capture capability for a single thread.
///
/// Always recovered by the sampler: the thread is skipped for that tick.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Stack of {0} is unavailable")]
    Unavailable(ThreadHandle),

    #[error("Stack of {0} is poisoned by a panicking writer")]
    Poisoned(ThreadHandle),
}

/// Malformed persisted profile record.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Expected 4 sections in profile record, found {found}")]
    MissingSections { found: usize },

    #[error("Wrong field count in {section} record {line:?}: expected {expected}, found {found}")]
    FieldCount { section: &'static str, line: String, expected: usize, found: usize },

    #[error("Invalid number {value:?} in {section} record {line:?}")]
    InvalidNumber { section: &'static str, line: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = FormatError::MissingSections { found: 2 };
        assert_eq!(err.to_string(), "Expected 4 sections in profile record, found 2");
    }

    #[test]
    fn test_field_count_error() {
        let err = FormatError::FieldCount {
            section: "counts",
            line: "0,1".to_string(),
            expected: 3,
            found: 2,
        };
        assert!(err.to_string().contains("counts"));
        assert!(err.to_string().contains("\"0,1\""));
    }

    #[test]
    fn test_capture_error_names_thread() {
        let err = CaptureError::Poisoned(ThreadHandle(3));
        assert!(err.to_string().contains("Thread#3"));
    }

    #[test]
    fn test_output_handler_error_keeps_context() {
        let inner = anyhow::anyhow!("disk full").context("Failed to write profile.txt");
        let err = ProfilerError::OutputHandler(inner);
        assert_eq!(err.to_string(), "Output handler failed: Failed to write profile.txt: disk full");
    }
}
