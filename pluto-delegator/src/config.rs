//! Delegator configuration.

use crate::error::ConfigError;
use std::net::SocketAddr;

/// Environment variable naming the listen address.
pub const ENV_ADDR: &str = "PLUTO_DELEGATOR_ADDR";

/// Environment variable naming the maximum frame length in bytes.
pub const ENV_MAX_FRAME: &str = "PLUTO_DELEGATOR_MAX_FRAME";

/// Where and how the delegator listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatorConfig {
    /// Address to bind. Port `0` picks a free port.
    pub bind_addr: SocketAddr,
    /// Longest accepted frame, in bytes, excluding the newline.
    pub max_frame_len: usize,
}

impl DelegatorConfig {
    /// Default frame limit: 1 MiB.
    pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the frame limit.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Defaults overridden by `PLUTO_DELEGATOR_ADDR` and
    /// `PLUTO_DELEGATOR_MAX_FRAME` when they are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_ADDR) {
            config.bind_addr = raw.trim().parse().map_err(|e: std::net::AddrParseError| {
                invalid(ENV_ADDR, &raw, e.to_string())
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_FRAME) {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid(ENV_MAX_FRAME, &raw, e.to_string()))?;
            if len == 0 {
                return Err(invalid(ENV_MAX_FRAME, &raw, "must be positive".into()));
            }
            config.max_frame_len = len;
        }
        Ok(config)
    }
}

fn invalid(var: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_owned(),
        value: value.to_owned(),
        reason,
    }
}

impl Default for DelegatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            max_frame_len: Self::DEFAULT_MAX_FRAME_LEN,
        }
    }
}
