//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Environment variable holding the default log filter.
pub const ENV_LOG: &str = "PLUTO_LOG";

/// Filter used when `PLUTO_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a formatting subscriber filtered by `filter`, using
/// [`EnvFilter`] directive syntax such as `"info,pluto_bus=debug"`.
///
/// Calling this more than once, or after another subscriber was installed,
/// leaves the existing subscriber in place.
///
/// # Errors
///
/// Returns the parse error if `filter` is not a valid directive list.
pub fn init_tracing(filter: &str) -> Result<(), ParseError> {
    let filter = EnvFilter::try_new(filter)?;
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("pluto.tracing.already_installed");
    }
    Ok(())
}
