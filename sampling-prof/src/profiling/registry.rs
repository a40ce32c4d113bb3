//! Thread registry
//!
//! Membership set of the threads currently being sampled, with per-member
//! join timestamps for wall-clock accounting across join/leave churn.
//!
//! ## Runtime accounting
//!
//! ```text
//! thread A   |=====|                 retired on unregister
//! thread B      |==========|         still registered
//!            ^             ^
//!          reset          now
//!
//! elapsed = retired + Σ (now - joined_at)
//! ```
//!
//! The reported value is the sum of the individual active spans, not the
//! wall-clock span of their union. `elapsed_and_reset()` moves every
//! member's join timestamp to `now`, so consecutive windows never overlap.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::ThreadHandle;

#[derive(Debug, Default)]
struct RegistryState {
    members: HashMap<ThreadHandle, Instant>,
    /// Active time of members that left since the last reset
    retired: Duration,
}

impl RegistryState {
    fn elapsed_at(&self, now: Instant) -> Duration {
        self.members
            .values()
            .fold(self.retired, |acc, joined_at| acc + now.saturating_duration_since(*joined_at))
    }
}

/// Thread-safe membership set guarded by a single lock
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    state: Mutex<RegistryState>,
}

impl ThreadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the state consistent, so a panic in
    // another holder does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `handle` stamped with the current time
    ///
    /// Returns false (and keeps the original timestamp) if it was already
    /// registered.
    pub fn register(&self, handle: ThreadHandle) -> bool {
        let mut state = self.lock();
        if state.members.contains_key(&handle) {
            return false;
        }
        state.members.insert(handle, Instant::now());
        true
    }

    /// Remove `handle`, folding its active time into the retired total
    ///
    /// Returns whether the handle was registered.
    pub fn unregister(&self, handle: ThreadHandle) -> bool {
        let mut state = self.lock();
        match state.members.remove(&handle) {
            Some(joined_at) => {
                state.retired += joined_at.elapsed();
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the members, ordered by handle
    #[must_use]
    pub fn snapshot(&self) -> Vec<ThreadHandle> {
        let mut handles: Vec<ThreadHandle> = self.lock().members.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    #[must_use]
    pub fn contains(&self, handle: ThreadHandle) -> bool {
        self.lock().members.contains_key(&handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    /// Accumulated active time since the last reset, without resetting
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed_at(Instant::now())
    }

    /// Accumulated active time since the last reset; starts a new window
    ///
    /// Current members are re-stamped with `now` and the retired total is
    /// zeroed, all under one lock.
    pub fn elapsed_and_reset(&self) -> Duration {
        let mut state = self.lock();
        let now = Instant::now();
        let elapsed = state.elapsed_at(now);
        for joined_at in state.members.values_mut() {
            *joined_at = now;
        }
        state.retired = Duration::ZERO;
        elapsed
    }

    /// Unregister every member; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let now = Instant::now();
        let removed = state.members.len();
        let active = state.elapsed_at(now);
        state.members.clear();
        state.retired = active;
        removed
    }
}
