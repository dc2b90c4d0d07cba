//! Application configuration.

use crate::telemetry::{DEFAULT_LOG_FILTER, ENV_LOG};
use pluto_delegator::config::ENV_ADDR;
use pluto_delegator::{ConfigError, DelegatorConfig};
use pluto_scheduler::SchedulerConfig;
use tracing_subscriber::EnvFilter;

/// Everything an [`Application`](crate::Application) needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Tracing filter directives.
    pub log_filter: String,
    /// Serve the delegation bridge with this configuration. `None` keeps
    /// the application in-process only.
    pub delegator: Option<DelegatorConfig>,
    /// Configuration handed to every scheduler the application creates.
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Set the log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Serve the delegation bridge.
    pub fn with_delegator(mut self, config: DelegatorConfig) -> Self {
        self.delegator = Some(config);
        self
    }

    /// Set the scheduler configuration.
    pub fn with_scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Defaults overridden by `PLUTO_LOG` and the `PLUTO_DELEGATOR_*`
    /// variables. The bridge is enabled when `PLUTO_DELEGATOR_ADDR` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(filter) = lookup(ENV_LOG) {
            EnvFilter::try_new(&filter).map_err(|e| ConfigError::InvalidValue {
                var: ENV_LOG.to_owned(),
                value: filter.clone(),
                reason: e.to_string(),
            })?;
            config.log_filter = filter;
        }
        if lookup(ENV_ADDR).is_some() {
            config.delegator = Some(DelegatorConfig::from_lookup(&lookup)?);
        }
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            delegator: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}
