//! Sampling engine
//!
//! - Thread registry with active-time accounting
//! - Session aggregation (nodes, self/total counts, edges)
//! - Background sampler with session rotation
//! - Stack capture sources
//! - The `SamplingProf` control surface

pub mod capture;
pub mod config;
pub mod profiler;
pub mod registry;
pub mod sampler;
pub mod session;

pub use capture::{FnCapture, FrameGuard, ShadowStacks, StackCapture};
pub use config::ProfilerConfig;
pub use profiler::SamplingProf;
pub use registry::ThreadRegistry;
pub use sampler::{Rotation, SamplerHandle};
pub use session::Session;
