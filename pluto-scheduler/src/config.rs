//! Scheduler configuration.

use std::time::Duration;

/// Tuning knobs for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often variable waits poll their variable.
    pub poll_interval: Duration,
}

impl SchedulerConfig {
    /// Default poll interval for variable waits.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Set the poll interval for variable waits. Zero is raised to one
    /// millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}
