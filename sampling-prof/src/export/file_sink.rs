//! Default output handler: write each flushed session to a file.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use super::Profile;
use crate::OutputHandler;

/// File written when no output handler is configured
pub const DEFAULT_OUTPUT_FILE: &str = "profile.txt";

/// Writes sessions as text records
///
/// By default every session overwrites `path`. With [`FileSink::numbered`]
/// the n-th session goes to `<stem>.<n>.<ext>` instead, so rotating
/// profilers keep every window.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    numbered: bool,
    written: usize,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), numbered: false, written: 0 }
    }

    #[must_use]
    pub fn numbered(mut self) -> Self {
        self.numbered = true;
        self
    }

    /// Sessions written so far
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Path the next session will be written to
    #[must_use]
    pub fn next_path(&self) -> PathBuf {
        if !self.numbered {
            return self.path.clone();
        }
        let stem = self.path.file_stem().map_or_else(
            || DEFAULT_OUTPUT_FILE.into(),
            |stem| stem.to_string_lossy().into_owned(),
        );
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}.{}.{}", self.written, ext.to_string_lossy()),
            None => format!("{stem}.{}", self.written),
        };
        self.path.with_file_name(name)
    }

    /// Write one session
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write(&mut self, profile: &Profile) -> Result<PathBuf> {
        let path = self.next_path();
        std::fs::write(&path, profile.to_text())
            .with_context(|| format!("Failed to write profile to {}", path.display()))?;
        self.written += 1;
        debug!("Wrote {} nodes to {}", profile.nodes.len(), path.display());
        Ok(path)
    }

    /// Box the sink as a profiler output handler
    #[must_use]
    pub fn into_handler(mut self) -> OutputHandler {
        Box::new(move |profile| self.write(&profile).map(|_| ()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
