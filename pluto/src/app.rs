//! Application wiring: one bus, one registry, schedulers on demand and an
//! optional delegation bridge, run until told to stop.

use crate::config::AppConfig;
use pluto_bus::{BusError, EventBus};
use pluto_core::{Component, Dispatcher, RegistryError, TopicFilter, topics};
use pluto_delegator::{DelegatorError, DelegatorServer};
use pluto_registry::ComponentRegistry;
use pluto_scheduler::{Scheduler, SchedulerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Application failures.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AppError {
    /// Registering a component failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The delegation bridge could not be started.
    #[error(transparent)]
    Delegator(#[from] DelegatorError),

    /// The bus refused a subscription.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Why a running application stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A `stop` event was published on the bus.
    StopEvent,
    /// The shutdown token was cancelled.
    Shutdown,
}

/// Outcome of [`RunningApplication::wait`].
#[derive(Debug)]
pub struct Shutdown {
    /// What triggered the stop.
    pub reason: StopReason,
    /// Components whose shutdown hook failed while draining the registry.
    pub drain_failures: Vec<RegistryError>,
}

/// The composed system, before it starts running.
///
/// The registry publishes `variable.update` events into the application's
/// bus, and every scheduler handed out by [`scheduler`](Self::scheduler)
/// dispatches through the registry and waits on the same bus.
pub struct Application {
    config: AppConfig,
    bus: Arc<EventBus>,
    registry: Arc<ComponentRegistry>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the bus and registry.
    pub fn new(config: AppConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let registry = Arc::new(ComponentRegistry::new().with_publisher(bus.clone()));
        Self {
            config,
            bus,
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a component with the application's registry.
    pub fn register<C: Component + 'static>(&self, component: C) -> Result<(), AppError> {
        Ok(self.registry.register(component)?)
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The shared component registry.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// A fresh scheduler bound to the registry and the bus. Its run is
    /// cancelled when the application shuts down.
    pub fn scheduler(&self) -> Scheduler {
        new_scheduler(&self.registry, &self.bus, &self.config.scheduler, &self.shutdown)
    }

    /// A token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribe to `stop` and start the delegation bridge if configured.
    ///
    /// # Errors
    ///
    /// Fails if the bridge cannot bind its address.
    pub async fn start(self) -> Result<RunningApplication, AppError> {
        let (_, stop) = self
            .bus
            .subscribe_channel(TopicFilter::topic(topics::STOP))?;

        let server = match &self.config.delegator {
            Some(config) => {
                let dispatcher: Arc<dyn Dispatcher> = self.registry.clone();
                let server = DelegatorServer::bind(dispatcher, config).await?;
                let addr = server.local_addr()?;
                let token = self.shutdown.child_token();
                let task = tokio::spawn(server.serve(token.clone()));
                Some(Bridge { addr, token, task })
            }
            None => None,
        };

        tracing::info!(
            components = self.registry.len(),
            delegator = ?server.as_ref().map(|bridge| bridge.addr),
            "pluto.app.start"
        );
        Ok(RunningApplication {
            bus: self.bus,
            registry: self.registry,
            scheduler: self.config.scheduler,
            shutdown: self.shutdown,
            stop,
            server,
        })
    }

    /// Start and run until a `stop` event or the shutdown token.
    pub async fn run(self) -> Result<Shutdown, AppError> {
        self.start().await?.wait().await
    }
}

struct Bridge {
    addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<Result<(), DelegatorError>>,
}

/// A started application.
pub struct RunningApplication {
    bus: Arc<EventBus>,
    registry: Arc<ComponentRegistry>,
    scheduler: SchedulerConfig,
    shutdown: CancellationToken,
    stop: tokio::sync::mpsc::UnboundedReceiver<pluto_core::Event>,
    server: Option<Bridge>,
}

impl RunningApplication {
    /// Address the delegation bridge listens on, if it is being served.
    pub fn delegator_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|bridge| bridge.addr)
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The shared component registry.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// A fresh scheduler bound to the registry and the bus. Its run is
    /// cancelled when the application shuts down.
    pub fn scheduler(&self) -> Scheduler {
        new_scheduler(&self.registry, &self.bus, &self.scheduler, &self.shutdown)
    }

    /// Stop the application as if the shutdown token had fired.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Run until a `stop` event is published or the shutdown token fires,
    /// then cancel every scheduler handed out, stop the bridge, drain the
    /// registry and close the bus.
    pub async fn wait(mut self) -> Result<Shutdown, AppError> {
        let reason = tokio::select! {
            _ = self.shutdown.cancelled() => StopReason::Shutdown,
            _ = self.stop.recv() => StopReason::StopEvent,
        };
        tracing::info!(?reason, "pluto.app.stopping");
        self.shutdown.cancel();

        if let Some(bridge) = self.server.take() {
            bridge.token.cancel();
            match bridge.task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(error = %err, "pluto.app.delegator.failed"),
                Err(err) => tracing::warn!(error = %err, "pluto.app.delegator.aborted"),
            }
        }

        let drain_failures = self.registry.drain().await;
        for err in &drain_failures {
            tracing::warn!(error = %err, "pluto.app.drain.failed");
        }
        self.bus.close();
        tracing::info!(?reason, "pluto.app.stopped");

        Ok(Shutdown {
            reason,
            drain_failures,
        })
    }
}

fn new_scheduler(
    registry: &Arc<ComponentRegistry>,
    bus: &Arc<EventBus>,
    config: &SchedulerConfig,
    shutdown: &CancellationToken,
) -> Scheduler {
    let dispatcher: Arc<dyn Dispatcher> = registry.clone();
    Scheduler::new(dispatcher, Arc::clone(bus))
        .with_config(config.clone())
        .with_cancel_token(shutdown.child_token())
}
