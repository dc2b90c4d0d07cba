//! Wire-stable duration type for schedules.
//!
//! Timeouts and stability windows inside a serialized schedule are written
//! as a plain integer of milliseconds rather than serde's `{"secs", "nanos"}`
//! struct, so a schedule authored by hand or by another tool reads naturally.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in whole milliseconds, serialized as a bare `u64`.
///
/// # Examples
///
/// ```
/// use pluto_core::DurationMs;
///
/// let timeout = DurationMs::from_secs(2);
/// assert_eq!(timeout.as_millis(), 2000);
/// assert_eq!(serde_json::to_string(&timeout).unwrap(), "2000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Milliseconds in this duration.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this is the zero duration.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        d.to_std()
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
