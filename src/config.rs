//! Coordinator Configuration
//!
//! Loaded once at startup, immutable for the process lifetime.

use std::time::Duration;

use thiserror::Error;

/// Retention floor: data readable by transactions started up to `life_time`
/// ago must never be collected, so the window may not shrink below this.
pub const MIN_LIFE_TIME: Duration = Duration::from_secs(10 * 60);

/// How the GC executor runs a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Cluster-wide coordinated sweep.
    Distributed,
    /// Sweep driven from this process with a fixed worker budget.
    Local { concurrency: usize },
}

/// Configuration validation failures. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("life-time must be at least {}s, got {}s", MIN_LIFE_TIME.as_secs(), .0.as_secs())]
    LifeTimeTooShort(Duration),

    #[error("no coordination endpoints configured")]
    NoEndpoints,

    #[error("local mode requires a concurrency of at least 1")]
    ZeroConcurrency,
}

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordination-service endpoints
    pub endpoints: Vec<String>,

    /// Sweep execution mode
    pub mode: ExecMode,

    /// Minimum spacing between completed sweeps
    pub run_interval: Duration,

    /// Retention window subtracted from the oracle clock
    pub life_time: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1:2379".to_string()],
            mode: ExecMode::Distributed,
            run_interval: Duration::from_secs(10 * 60),
            life_time: MIN_LIFE_TIME,
        }
    }
}

impl Config {
    /// Set endpoints from a comma-separated address list
    pub fn with_endpoints(mut self, addrs: &str) -> Self {
        self.endpoints = addrs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Set the execution mode
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the minimum spacing between completed sweeps
    pub fn with_run_interval(mut self, interval: Duration) -> Self {
        self.run_interval = interval;
        self
    }

    /// Set the retention window
    pub fn with_life_time(mut self, life_time: Duration) -> Self {
        self.life_time = life_time;
        self
    }

    /// Reject configurations the coordinator must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.life_time < MIN_LIFE_TIME {
            return Err(ConfigError::LifeTimeTooShort(self.life_time));
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if let ExecMode::Local { concurrency: 0 } = self.mode {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_life_time_floor_enforced() {
        let config = Config::default().with_life_time(Duration::from_secs(599));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LifeTimeTooShort(_))
        ));

        // Exactly at the floor is allowed.
        let config = Config::default().with_life_time(MIN_LIFE_TIME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_list_parsing() {
        let config = Config::default().with_endpoints("10.0.0.1:2379, 10.0.0.2:2379,");
        assert_eq!(config.endpoints, vec!["10.0.0.1:2379", "10.0.0.2:2379"]);

        let config = Config::default().with_endpoints("");
        assert!(matches!(config.validate(), Err(ConfigError::NoEndpoints)));
    }

    #[test]
    fn test_local_mode_needs_workers() {
        let config = Config::default().with_mode(ExecMode::Local { concurrency: 0 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroConcurrency)
        ));

        let config = Config::default().with_mode(ExecMode::Local { concurrency: 2 });
        assert!(config.validate().is_ok());
    }
}
