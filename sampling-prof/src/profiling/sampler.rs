//! # Sampler Loop
//!
//! The single background worker that captures stacks and owns the active
//! [`Session`]. It is the only writer of aggregation state.
//!
//! ## Tick
//!
//! 1. Wait for the next tick (or a shutdown signal)
//! 2. Exit if the profiler is no longer running
//! 3. Capture one stack per registered thread from a registry snapshot;
//!    failed or empty captures are skipped
//! 4. Close the session if the rotation policy says so, hand it to the output
//!    handler if it holds data, and open a fresh one
//!
//! On exit the open session is flushed once.
//!
//! The output handler runs on this thread, so a slow handler delays the
//! following ticks. Handler errors end the worker and surface from
//! [`SamplerHandle::join`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver, Sender};
use log::{debug, info, warn};

use super::capture::StackCapture;
use super::config::ProfilerConfig;
use super::registry::ThreadRegistry;
use super::session::Session;
use crate::domain::{Frame, ProfilerError, ThreadHandle};
use crate::OutputHandler;

/// When the active session is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Never rotate; the single session is flushed when the worker exits
    OnExit,
    /// Close whenever the session's thread-active runtime exceeds the limit
    Every(Duration),
}

impl Rotation {
    /// Output intervals only apply in multithreading mode
    #[must_use]
    pub fn from_config(config: &ProfilerConfig) -> Self {
        match config.output_interval {
            Some(limit) if config.multithreading => Rotation::Every(limit),
            _ => Rotation::OnExit,
        }
    }
}

struct Sampler {
    registry: Arc<ThreadRegistry>,
    capture: Arc<dyn StackCapture>,
    handler: OutputHandler,
    running: Arc<AtomicBool>,
    shutdown: Receiver<()>,
    interval: Duration,
    rotation: Rotation,
    max_threads: usize,
    /// Start of the next capture window when threads exceed `max_threads`
    cursor: usize,
}

impl Sampler {
    fn run(mut self) -> anyhow::Result<()> {
        info!(
            "Sampler started: interval {:?}, rotation {:?}, max threads {}",
            self.interval, self.rotation, self.max_threads
        );
        let ticker = tick(self.interval);
        let mut session = Session::new(Arc::clone(&self.registry));

        loop {
            select! {
                recv(ticker) -> _ => {},
                recv(self.shutdown) -> _ => {},
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let stacks = self.capture_stacks();
            session.process(&stacks);

            if self.should_rotate(&session) {
                let closed = std::mem::replace(&mut session, Session::new(Arc::clone(&self.registry)));
                self.flush(closed)?;
            }
        }

        self.flush(session)?;
        info!("Sampler stopped");
        Ok(())
    }

    fn should_rotate(&self, session: &Session) -> bool {
        match self.rotation {
            Rotation::Every(limit) => session.runtime() > limit,
            Rotation::OnExit => false,
        }
    }

    /// One stack per sampled thread; failures are skipped for this tick
    fn capture_stacks(&mut self) -> Vec<Vec<Frame>> {
        let handles = self.select_threads(self.registry.snapshot());
        let mut stacks = Vec::with_capacity(handles.len());

        for handle in handles {
            let capture = &self.capture;
            match panic::catch_unwind(AssertUnwindSafe(|| capture.capture(handle))) {
                Ok(Ok(stack)) if !stack.is_empty() => stacks.push(stack),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!("Skipping {handle}: {e}"),
                Err(payload) => warn!("Stack capture of {handle} panicked: {}", panic_message(&*payload)),
            }
        }
        stacks
    }

    /// Cap the snapshot at `max_threads`, advancing the window every tick
    fn select_threads(&mut self, handles: Vec<ThreadHandle>) -> Vec<ThreadHandle> {
        if handles.len() <= self.max_threads {
            return handles;
        }
        let start = self.cursor % handles.len();
        self.cursor = start + self.max_threads;
        handles.iter().cycle().skip(start).take(self.max_threads).copied().collect()
    }

    fn flush(&mut self, session: Session) -> anyhow::Result<()> {
        let has_data = session.has_data();
        let captures = session.captures();
        let wall = session.started_at().elapsed();
        let profile = session.result();

        if !has_data {
            debug!("Dropping empty session after {wall:?}");
            return Ok(());
        }
        debug!(
            "Flushing session: {} nodes, {} captures, runtime {:.1}ms, wall {wall:?}",
            profile.nodes.len(),
            captures,
            profile.runtime_ms
        );
        (self.handler)(profile)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}

/// Owner of a running sampler worker
pub struct SamplerHandle {
    running: Arc<AtomicBool>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<anyhow::Result<()>>>,
}

impl SamplerHandle {
    /// Spawn the worker
    ///
    /// # Errors
    /// Returns [`ProfilerError::Spawn`] if the OS refuses a new thread.
    pub fn spawn(
        config: &ProfilerConfig,
        registry: Arc<ThreadRegistry>,
        capture: Arc<dyn StackCapture>,
        handler: OutputHandler,
    ) -> Result<Self, ProfilerError> {
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);

        let sampler = Sampler {
            registry,
            capture,
            handler,
            running: Arc::clone(&running),
            shutdown: shutdown_rx,
            interval: config.sampling_interval,
            rotation: Rotation::from_config(config),
            max_threads: config.max_sampling_threads,
            cursor: 0,
        };

        let worker = thread::Builder::new()
            .name("sampling-prof".to_string())
            .spawn(move || sampler.run())
            .map_err(ProfilerError::Spawn)?;

        Ok(Self { running, shutdown: Some(shutdown_tx), worker: Some(worker) })
    }

    /// True until the worker exits (stopped, or ended by a handler error)
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop sampling and wait for the final flush
    ///
    /// # Errors
    /// Returns the output handler's error, or [`ProfilerError::SamplerPanicked`].
    pub fn join(mut self) -> Result<(), ProfilerError> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<(), ProfilerError> {
        self.running.store(false, Ordering::Release);
        // Disconnecting wakes the worker immediately
        drop(self.shutdown.take());
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProfilerError::OutputHandler(e)),
            Err(_) => Err(ProfilerError::SamplerPanicked),
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            warn!("Sampler ended with error: {e}");
        }
    }
}
