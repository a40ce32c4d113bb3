//! Stack capture sources
//!
//! The sampler only needs one capability: "given a thread handle, return its
//! current stack, leaf first". [`StackCapture`] is that seam.
//!
//! [`ShadowStacks`] is the built-in source. Instrumented code pushes frames
//! as it runs and the sampler copies the pushed frames on every tick:
//!
//! ```
//! use sampling_prof::frame;
//! use sampling_prof::profiling::{ShadowStacks, StackCapture};
//! use sampling_prof::domain::ThreadHandle;
//!
//! let stacks = ShadowStacks::new();
//! let _outer = stacks.enter(frame!("outer"));
//! let _inner = stacks.enter(frame!("inner"));
//!
//! let stack = stacks.capture(ThreadHandle::current()).unwrap();
//! assert_eq!(stack[0].label, "inner");
//! assert_eq!(stack[1].label, "outer");
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{CaptureError, Frame, ThreadHandle};

/// Capability to read the current stack of a thread
///
/// Implementations must not block indefinitely. A finished or unknown
/// thread yields an empty stack, not an error.
pub trait StackCapture: Send + Sync + 'static {
    /// Current stack of `handle`, leaf (innermost) frame first
    ///
    /// # Errors
    /// Returns [`CaptureError`] when the stack exists but cannot be read.
    fn capture(&self, handle: ThreadHandle) -> Result<Vec<Frame>, CaptureError>;
}

type ThreadStack = Arc<Mutex<Vec<Frame>>>;

/// Cooperative per-thread shadow stacks
///
/// Cheap to clone; clones share the same stacks.
#[derive(Debug, Clone, Default)]
pub struct ShadowStacks {
    threads: Arc<Mutex<HashMap<ThreadHandle, ThreadStack>>>,
}

impl ShadowStacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stack_of(&self, handle: ThreadHandle) -> Option<ThreadStack> {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        threads.get(&handle).cloned()
    }

    /// Push `frame` on the calling thread's stack until the guard drops
    #[must_use = "the frame is popped as soon as the guard is dropped"]
    pub fn enter(&self, frame: Frame) -> FrameGuard {
        let handle = ThreadHandle::current();
        let stack = {
            let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(threads.entry(handle).or_default())
        };
        stack.lock().unwrap_or_else(PoisonError::into_inner).push(frame);
        FrameGuard { stacks: self.clone(), handle, stack, _marker: PhantomData }
    }

    /// Run `f` inside `frame`
    pub fn scope<R>(&self, frame: Frame, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter(frame);
        f()
    }

    /// Number of threads with at least one frame entered
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl StackCapture for ShadowStacks {
    fn capture(&self, handle: ThreadHandle) -> Result<Vec<Frame>, CaptureError> {
        let Some(stack) = self.stack_of(handle) else {
            return Ok(Vec::new());
        };
        let frames = stack.lock().map_err(|_| CaptureError::Poisoned(handle))?;
        Ok(frames.iter().rev().cloned().collect())
    }
}

/// Pops its frame when dropped
///
/// Not `Send`: frames must be popped by the thread that pushed them.
#[derive(Debug)]
pub struct FrameGuard {
    stacks: ShadowStacks,
    handle: ThreadHandle,
    stack: ThreadStack,
    _marker: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let mut frames = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        frames.pop();
        if frames.is_empty() {
            drop(frames);
            // Forget finished threads so they capture as empty
            let mut threads = self.stacks.threads.lock().unwrap_or_else(PoisonError::into_inner);
            if threads.get(&self.handle).is_some_and(|s| Arc::ptr_eq(s, &self.stack)) {
                threads.remove(&self.handle);
            }
        }
    }
}

/// Capture source backed by a closure, handy for tests and adapters
pub struct FnCapture<F>(pub F);

impl<F> StackCapture for FnCapture<F>
where
    F: Fn(ThreadHandle) -> Result<Vec<Frame>, CaptureError> + Send + Sync + 'static,
{
    fn capture(&self, handle: ThreadHandle) -> Result<Vec<Frame>, CaptureError> {
        (self.0)(handle)
    }
}
