//! Profiler configuration
//!
//! All knobs are validated once, when the profiler is constructed.

use std::time::Duration;

use crate::domain::ProfilerError;

/// Default time between two sampling ticks
pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(100);

/// Default rotation interval in multithreaded mode
pub const DEFAULT_OUTPUT_INTERVAL: Duration = Duration::from_secs(60);

/// Default cap on threads captured per tick
pub const DEFAULT_MAX_SAMPLING_THREADS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Sleep between two ticks of the sampler
    pub sampling_interval: Duration,
    /// Keep sampling across start/stop of individual threads
    pub multithreading: bool,
    /// Close the session once its accumulated runtime exceeds this
    pub output_interval: Option<Duration>,
    /// At most this many threads are captured in one tick
    pub max_sampling_threads: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            multithreading: false,
            output_interval: None,
            max_sampling_threads: DEFAULT_MAX_SAMPLING_THREADS,
        }
    }
}

impl ProfilerConfig {
    /// Rotating configuration: multithreading on, 60s output interval
    #[must_use]
    pub fn multithreaded() -> Self {
        Self {
            multithreading: true,
            output_interval: Some(DEFAULT_OUTPUT_INTERVAL),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }

    #[must_use]
    pub fn with_multithreading(mut self, multithreading: bool) -> Self {
        self.multithreading = multithreading;
        self
    }

    #[must_use]
    pub fn with_output_interval(mut self, interval: Option<Duration>) -> Self {
        self.output_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_sampling_threads(mut self, max: usize) -> Self {
        self.max_sampling_threads = max;
        self
    }

    /// Check every field, reporting the first problem found
    ///
    /// # Errors
    /// Returns [`ProfilerError::InvalidConfig`] for a zero interval or a zero
    /// thread cap.
    pub fn validate(&self) -> Result<(), ProfilerError> {
        if self.sampling_interval.is_zero() {
            return Err(ProfilerError::InvalidConfig(
                "sampling interval must be greater than zero".to_string(),
            ));
        }
        if self.output_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ProfilerError::InvalidConfig(
                "output interval must be greater than zero".to_string(),
            ));
        }
        if self.max_sampling_threads == 0 {
            return Err(ProfilerError::InvalidConfig(
                "max sampling threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Convert a user-facing seconds value into a `Duration`
///
/// # Errors
/// Rejects negative, NaN and infinite values.
pub fn from_secs_f64(name: &str, secs: f64) -> Result<Duration, ProfilerError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ProfilerError::InvalidConfig(format!("{name} = {secs}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::default();
        assert_eq!(config.sampling_interval, Duration::from_millis(100));
        assert!(!config.multithreading);
        assert_eq!(config.output_interval, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multithreaded_defaults_to_one_minute_rotation() {
        let config = ProfilerConfig::multithreaded();
        assert!(config.multithreading);
        assert_eq!(config.output_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_sampling_interval_rejected() {
        let config = ProfilerConfig::default().with_sampling_interval(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sampling interval"));
    }

    #[test]
    fn test_zero_output_interval_rejected() {
        let config = ProfilerConfig::multithreaded().with_output_interval(Some(Duration::ZERO));
        assert!(matches!(config.validate(), Err(ProfilerError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_thread_cap_rejected() {
        let config = ProfilerConfig::default().with_max_sampling_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_secs_f64() {
        assert_eq!(from_secs_f64("interval", 0.01).unwrap(), Duration::from_millis(10));
        assert!(from_secs_f64("interval", -1.0).is_err());
        assert!(from_secs_f64("interval", f64::NAN).is_err());
    }
}
