//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep thread identities, node ids and raw frames
//! from being mixed up, and make function signatures more expressive.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a profiled thread
///
/// An opaque, comparable token. The profiler never dereferences it; it only
/// hands it back to a [`StackCapture`](crate::profiling::StackCapture) source.
/// Handles are process-unique and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadHandle(pub u64);

static NEXT_THREAD_HANDLE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_HANDLE: ThreadHandle =
        ThreadHandle(NEXT_THREAD_HANDLE.fetch_add(1, Ordering::Relaxed));
}

impl ThreadHandle {
    /// Handle of the calling thread (assigned lazily on first use)
    #[must_use]
    pub fn current() -> Self {
        CURRENT_HANDLE.with(|handle| *handle)
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread#{}", self.0)
    }
}

/// Session-local node id
///
/// Ids are assigned in first-seen order starting at 0. The only negative
/// value is [`NodeId::ROOT`], the caller of a stack's outermost frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    /// "No caller" marker used as the source of a stack's entry edge
    pub const ROOT: NodeId = NodeId(-1);

    /// Returns true for the root sentinel
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a captured stack: (source location, line, label)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub file: Cow<'static, str>,
    pub line: u32,
    pub label: Cow<'static, str>,
}

impl Frame {
    pub fn new(
        file: impl Into<Cow<'static, str>>,
        line: u32,
        label: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self { file: file.into(), line, label: label.into() }
    }

    /// Identity key of the frame, `file:line:label`
    ///
    /// Two frames with the same key collapse into one node within a session.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.label)
    }
}

/// Build a [`Frame`] for the current source location
///
/// ```
/// use sampling_prof::frame;
///
/// let frame = frame!("parse");
/// assert_eq!(frame.label, "parse");
/// assert!(frame.file.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! frame {
    ($label:expr) => {
        $crate::domain::Frame::new(file!(), line!(), $label)
    };
}
