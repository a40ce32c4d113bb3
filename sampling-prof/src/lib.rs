//! # sampling-prof - Call-Stack Sampling Profiler
//!
//! A background worker periodically captures the stacks of registered
//! threads, folds them into a deduplicated call graph with self/total sample
//! counts, and hands each closed session to an output handler. A reporter
//! reads persisted sessions back and ranks frames by self time.
//!
//! ## Architecture Overview
//!
//! ```text
//!   caller threads                    sampler thread
//! ┌────────────────┐  register   ┌─────────────────────┐
//! │ start / stop   │────────────▶│   ThreadRegistry    │
//! │ (SamplingProf) │  unregister │ members + run time  │
//! └────────────────┘             └──────────┬──────────┘
//!         │ enter/exit                      │ snapshot every tick
//!         ▼                                 ▼
//! ┌────────────────┐   capture   ┌─────────────────────┐
//! │  ShadowStacks  │◀────────────│       Sampler       │
//! │ (StackCapture) │             │  owns the Session   │
//! └────────────────┘             └──────────┬──────────┘
//!                                           │ rotate / terminate
//!                                           ▼
//!                                ┌─────────────────────┐
//!                                │ OutputHandler       │
//!                                │ (FileSink: text)    │
//!                                └──────────┬──────────┘
//!                                           │ later
//!                                           ▼
//!                                ┌─────────────────────┐
//!                                │ Profile::parse      │
//!                                │ → flat_report       │
//!                                └─────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: registry, session aggregation, sampler loop, capture
//!   sources and the [`SamplingProf`] control surface
//! - [`export`]: the four-section text record and the default file sink
//! - [`analysis`]: flat report ranking and rendering
//! - [`domain`]: core types (`ThreadHandle`, `NodeId`, `Frame`) and errors
//! - [`cli`]: command-line argument parsing for the binary
//! - [`workload`]: instrumented demo workload used by `sampling-prof record`
//!
//! ## Modes
//!
//! 1. **Single-session** (default): one session per `start`…`stop` bracket
//! 2. **Multithreading**: threads join and leave freely; sessions rotate
//!    every `output_interval` until `terminate`
//!
//! ## Typical Usage
//!
//! ```no_run
//! use sampling_prof::{frame, ProfilerConfig, SamplingProf, ShadowStacks};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stacks = ShadowStacks::new();
//! let prof = SamplingProf::new(ProfilerConfig::default(), stacks.clone())?;
//!
//! prof.profile(|| {
//!     let _frame = stacks.enter(frame!("busy_loop"));
//!     std::thread::sleep(std::time::Duration::from_millis(500));
//! })?;
//!
//! prof.report(&mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod profiling;
pub mod workload;

pub use domain::{Frame, NodeId, ThreadHandle};
pub use export::Profile;
pub use profiling::{ProfilerConfig, SamplingProf, ShadowStacks, StackCapture};

/// Receives every closed session that holds data
///
/// Runs on the sampler thread; an error ends the sampler and is returned by
/// the next `stop`/`terminate`.
pub type OutputHandler = Box<dyn FnMut(export::Profile) -> anyhow::Result<()> + Send + 'static>;
