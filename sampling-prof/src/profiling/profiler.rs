//! Public control surface
//!
//! [`SamplingProf`] owns the thread registry and at most one sampler worker.
//! Threads join and leave through `start`/`stop`; the worker is spawned on
//! the first start and joined by `terminate`.
//!
//! ## Modes
//!
//! - **Single-session** (default): `start` begins one session for the
//!   calling thread, `stop` terminates the worker and flushes it.
//! - **Multithreading**: every thread brackets its own work with
//!   `start`/`stop`; the worker keeps sampling whoever is registered and
//!   rotates sessions every `output_interval`. Only `terminate` stops it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{info, warn};

use super::capture::StackCapture;
use super::config::ProfilerConfig;
use super::registry::ThreadRegistry;
use super::sampler::SamplerHandle;
use crate::analysis::report_file;
use crate::domain::{FormatError, ProfilerError, ThreadHandle};
use crate::export::{FileSink, Profile, DEFAULT_OUTPUT_FILE};
use crate::OutputHandler;

type SharedHandler = Arc<Mutex<OutputHandler>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forward to a handler that outlives individual sampler workers
fn forward(shared: &SharedHandler) -> OutputHandler {
    let shared = Arc::clone(shared);
    Box::new(move |profile: Profile| {
        let mut handler = lock(&shared);
        (*handler)(profile)
    })
}

pub struct SamplingProf {
    config: ProfilerConfig,
    registry: Arc<ThreadRegistry>,
    capture: Arc<dyn StackCapture>,
    handler: SharedHandler,
    output_file: Arc<Mutex<PathBuf>>,
    sampler: Mutex<Option<SamplerHandle>>,
}

impl SamplingProf {
    /// Create a profiler that writes each session to [`DEFAULT_OUTPUT_FILE`]
    ///
    /// # Errors
    /// Returns [`ProfilerError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ProfilerConfig, capture: impl StackCapture) -> Result<Self, ProfilerError> {
        config.validate()?;

        let output_file = Arc::new(Mutex::new(PathBuf::from(DEFAULT_OUTPUT_FILE)));
        let target = Arc::clone(&output_file);
        let default_handler: OutputHandler = Box::new(move |profile: Profile| {
            let path = lock(&target).clone();
            FileSink::new(path).write(&profile).map(|_| ())
        });

        Ok(Self {
            config,
            registry: Arc::new(ThreadRegistry::new()),
            capture: Arc::new(capture),
            handler: Arc::new(Mutex::new(default_handler)),
            output_file,
            sampler: Mutex::new(None),
        })
    }

    /// Replace the output handler used by subsequently started workers
    #[must_use]
    pub fn with_output_handler(
        self,
        handler: impl FnMut(Profile) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        *lock(&self.handler) = Box::new(handler);
        self
    }

    /// Start profiling the calling thread
    ///
    /// Single-session mode: true if profiling was not already running.
    /// Multithreading mode: true if the calling thread was newly registered.
    ///
    /// # Errors
    /// Returns [`ProfilerError::Spawn`] if the sampler thread cannot start.
    pub fn start(&self) -> Result<bool, ProfilerError> {
        self.start_thread(ThreadHandle::current(), None)
    }

    /// Like [`start`](Self::start), with a handler for the worker it spawns
    ///
    /// The handler is ignored, with a warning, if the sampler is already running.
    ///
    /// # Errors
    /// Returns [`ProfilerError::Spawn`] if the sampler thread cannot start.
    pub fn start_with(&self, handler: OutputHandler) -> Result<bool, ProfilerError> {
        self.start_thread(ThreadHandle::current(), Some(handler))
    }

    /// Start profiling an explicit thread handle
    ///
    /// # Errors
    /// Returns [`ProfilerError::Spawn`] if the sampler thread cannot start.
    pub fn start_thread(
        &self,
        handle: ThreadHandle,
        handler: Option<OutputHandler>,
    ) -> Result<bool, ProfilerError> {
        let mut sampler = lock(&self.sampler);

        if sampler.is_some() && handler.is_some() {
            warn!("Sampler already running, output handler passed by {handle} is not used");
        }
        if !self.config.multithreading && sampler.is_some() {
            return Ok(false);
        }

        let newly_registered = self.registry.register(handle);
        if sampler.is_none() {
            let handler = handler.unwrap_or_else(|| forward(&self.handler));
            match SamplerHandle::spawn(&self.config, Arc::clone(&self.registry), Arc::clone(&self.capture), handler) {
                Ok(spawned) => *sampler = Some(spawned),
                Err(e) => {
                    self.registry.unregister(handle);
                    return Err(e);
                }
            }
            info!("Profiling started by {handle}");
            return Ok(true);
        }
        Ok(newly_registered)
    }

    /// Stop profiling the calling thread
    ///
    /// Single-session mode: same as [`terminate`](Self::terminate).
    /// Multithreading mode: unregisters the calling thread only; returns
    /// whether it was registered.
    ///
    /// # Errors
    /// Single-session mode surfaces the output handler's error.
    pub fn stop(&self) -> Result<bool, ProfilerError> {
        self.stop_thread(ThreadHandle::current())
    }

    /// Stop profiling an explicit thread handle
    ///
    /// # Errors
    /// Single-session mode surfaces the output handler's error.
    pub fn stop_thread(&self, handle: ThreadHandle) -> Result<bool, ProfilerError> {
        if self.config.multithreading {
            Ok(self.registry.unregister(handle))
        } else {
            self.terminate()
        }
    }

    /// Stop the sampler, flushing any open session once
    ///
    /// Returns false if no sampler was running. The profiler can be started
    /// again afterwards.
    ///
    /// # Errors
    /// Returns the output handler's error from this or an earlier flush.
    pub fn terminate(&self) -> Result<bool, ProfilerError> {
        let mut sampler = lock(&self.sampler);
        let Some(running) = sampler.take() else {
            return Ok(false);
        };
        let joined = running.join();
        let cleared = self.registry.clear();
        // Active time of the cleared members belongs to the flushed session
        self.registry.elapsed_and_reset();
        info!("Profiling terminated, {cleared} thread(s) unregistered");
        joined.map(|()| true)
    }

    /// Whether the calling thread is being profiled
    ///
    /// In single-session mode this is true while the sampler runs.
    #[must_use]
    pub fn profiling(&self) -> bool {
        let running = lock(&self.sampler).is_some();
        if self.config.multithreading {
            running && self.registry.contains(ThreadHandle::current())
        } else {
            running
        }
    }

    /// Whether a sampler worker exists, regardless of the calling thread
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.sampler).is_some()
    }

    /// Run `f` between `start` and `stop`
    ///
    /// The stop also happens if `f` panics.
    ///
    /// # Errors
    /// Propagates errors from starting or stopping.
    pub fn profile<R>(&self, f: impl FnOnce() -> R) -> Result<R, ProfilerError> {
        self.start()?;
        let mut guard = StopGuard { prof: Some(self) };
        let value = f();
        guard.prof = None;
        self.stop()?;
        Ok(value)
    }

    #[must_use]
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    #[must_use]
    pub fn sampling_interval(&self) -> Duration {
        self.config.sampling_interval
    }

    /// Threads currently registered
    #[must_use]
    pub fn registered_threads(&self) -> Vec<ThreadHandle> {
        self.registry.snapshot()
    }

    /// File written by the default output handler
    #[must_use]
    pub fn output_file(&self) -> PathBuf {
        lock(&self.output_file).clone()
    }

    pub fn set_output_file(&self, path: impl AsRef<Path>) {
        *lock(&self.output_file) = path.as_ref().to_path_buf();
    }

    /// Render the flat report of the last session written to `output_file`
    ///
    /// # Errors
    /// Returns [`FormatError`] if the file cannot be read or parsed.
    pub fn report(&self, out: &mut impl Write) -> Result<(), FormatError> {
        report_file(self.output_file(), out)
    }
}

impl Drop for SamplingProf {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!("Profiler terminated with error: {e}");
        }
    }
}

struct StopGuard<'a> {
    prof: Option<&'a SamplingProf>,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if let Some(prof) = self.prof.take() {
            if let Err(e) = prof.stop() {
                warn!("Failed to stop profiling after panic: {e}");
            }
        }
    }
}
