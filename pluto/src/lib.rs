#![deny(missing_docs)]
//! # pluto: umbrella crate
//!
//! Single import surface for the Pluto workspace: the component registry,
//! the event bus, the sequential scheduler and the remote delegation bridge,
//! each behind a feature flag, plus a `prelude` for the happy path.
//!
//! With the `app` feature, `Application` wires the pieces together:
//!
//! ```no_run
//! # #[cfg(feature = "app")]
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use pluto::{AppConfig, Application, init_tracing};
//!
//! let config = AppConfig::from_env()?;
//! init_tracing(&config.log_filter)?;
//! let app = Application::new(config);
//! // app.register(my_component)?;
//! let shutdown = app.run().await?;
//! # let _ = shutdown;
//! # Ok(())
//! # }
//! ```

pub use pluto_core;
#[cfg(feature = "bus")]
pub use pluto_bus;
#[cfg(feature = "delegator")]
pub use pluto_delegator;
#[cfg(feature = "registry")]
pub use pluto_registry;
#[cfg(feature = "scheduler")]
pub use pluto_scheduler;

#[cfg(feature = "app")]
mod app;
#[cfg(feature = "app")]
mod config;
mod telemetry;

#[cfg(feature = "app")]
pub use app::{AppError, Application, RunningApplication, Shutdown, StopReason};
#[cfg(feature = "app")]
pub use config::AppConfig;
pub use telemetry::{DEFAULT_LOG_FILTER, ENV_LOG, init_tracing};

/// Happy-path imports for composing Pluto systems.
pub mod prelude {
    pub use pluto_core::{
        Access, Component, ComponentError, Dispatcher, DurationMs, ErrorKind, Event, EventMatch,
        MethodSpec, Publisher, RegistryError, Subscriber, TopicFilter, Value, ValueKind,
        VariableSpec, topics,
    };

    #[cfg(feature = "registry")]
    pub use pluto_registry::ComponentRegistry;

    #[cfg(feature = "bus")]
    pub use pluto_bus::{EventBus, Subscription};

    #[cfg(feature = "scheduler")]
    pub use pluto_scheduler::{
        Condition, Instruction, RunReport, RunState, Schedule, Scheduler, SchedulerConfig,
    };

    #[cfg(feature = "delegator")]
    pub use pluto_delegator::{
        ClientError, DelegatorClient, DelegatorConfig, DelegatorServer, ErrorCode,
    };

    #[cfg(feature = "app")]
    pub use crate::{AppConfig, Application};
}
