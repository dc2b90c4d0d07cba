//! The scheduler state machine and the task that executes a run.

use crate::config::SchedulerConfig;
use crate::instruction::{Assignment, Condition, Instruction, Schedule};
use pluto_bus::EventBus;
use pluto_core::{Dispatcher, DurationMs, EventMatch, ScheduleError, TopicFilter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where a run is in its lifecycle.
///
/// `Idle → Running → {Completed, Failed, Cancelled}`. Positions are
/// zero-based indexes into the schedule's top-level instructions.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Not started yet.
    Idle,
    /// Executing the instruction at `position`.
    Running {
        /// Instruction being executed.
        position: usize,
    },
    /// Every instruction executed without error.
    Completed,
    /// The instruction at `position` failed; nothing after it ran.
    Failed {
        /// The failing instruction.
        position: usize,
        /// What went wrong.
        error: ScheduleError,
    },
    /// The run was cancelled before the instruction at `position` finished.
    Cancelled {
        /// First instruction that did not complete.
        position: usize,
    },
}

impl RunState {
    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// What happened to one top-level instruction.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// The instruction ran to completion.
    Completed {
        /// Instruction position.
        position: usize,
    },
    /// A best-effort wait timed out and was skipped.
    Skipped {
        /// Instruction position.
        position: usize,
    },
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Terminal state.
    pub state: RunState,
    /// Per-instruction outcomes, in execution order.
    pub trace: Vec<StepEvent>,
}

impl RunReport {
    /// Whether the run completed.
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// The failing position and error, if the run failed.
    pub fn failure(&self) -> Option<(usize, &ScheduleError)> {
        match &self.state {
            RunState::Failed { position, error } => Some((*position, error)),
            _ => None,
        }
    }
}

/// Executes one [`Schedule`] against a dispatcher and a bus.
///
/// A scheduler runs at most one schedule in its lifetime. The run happens
/// on a dedicated Tokio task; [`state`](Self::state) observes it,
/// [`cancel`](Self::cancel) stops it at the next instruction boundary and
/// [`wait`](Self::wait) returns its report.
///
/// Cancellation never interrupts a method call or a variable write in
/// flight. It does wake a parked wait.
pub struct Scheduler {
    dispatcher: Arc<dyn Dispatcher>,
    bus: Arc<EventBus>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    starter: Mutex<Option<watch::Sender<RunState>>>,
    trace: Arc<Mutex<Vec<StepEvent>>>,
}

impl Scheduler {
    /// Create an idle scheduler bound to `dispatcher` and `bus`.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, bus: Arc<EventBus>) -> Self {
        let (tx, rx) = watch::channel(RunState::Idle);
        Self {
            dispatcher,
            bus,
            config: SchedulerConfig::default(),
            cancel: CancellationToken::new(),
            state: rx,
            starter: Mutex::new(Some(tx)),
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancel the run whenever `token` is cancelled, in addition to
    /// [`cancel`](Self::cancel). Pass a child of a wider shutdown token to
    /// tie the run to it.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Begin executing `schedule` on a new Tokio task.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`ScheduleError::AlreadyStarted`] on every call after the first.
    pub fn start(&self, schedule: Schedule) -> Result<(), ScheduleError> {
        let tx = self
            .starter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ScheduleError::AlreadyStarted)?;

        tx.send_replace(RunState::Running { position: 0 });
        tracing::info!(
            description = %schedule.description,
            instructions = schedule.len(),
            "pluto.scheduler.start"
        );
        let run = Run {
            dispatcher: Arc::clone(&self.dispatcher),
            bus: Arc::clone(&self.bus),
            poll_interval: self.config.poll_interval,
            cancel: self.cancel.clone(),
            state: tx,
            trace: Arc::clone(&self.trace),
        };
        tokio::spawn(run.execute_schedule(schedule));
        Ok(())
    }

    /// Request cancellation. Takes effect at the next instruction boundary,
    /// or immediately for a parked wait. Has no effect on a finished run.
    pub fn cancel(&self) {
        if !self.state.borrow().is_terminal() {
            tracing::info!("pluto.scheduler.cancel");
        }
        self.cancel.cancel();
    }

    /// The current state.
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(&self) -> Result<RunReport, ScheduleError> {
        let mut rx = self.state.clone();
        if *rx.borrow() == RunState::Idle {
            return Err(ScheduleError::NotStarted);
        }
        let state = match rx.wait_for(RunState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => return Err(ScheduleError::Aborted),
        };
        let trace = self
            .trace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(RunReport { state, trace })
    }

    /// Start `schedule` and wait for its report.
    pub async fn run(&self, schedule: Schedule) -> Result<RunReport, ScheduleError> {
        self.start(schedule)?;
        self.wait().await
    }
}

enum Step {
    Done,
    Skipped,
}

enum Parked {
    Done(Result<(), ScheduleError>),
    TimedOut(DurationMs),
    Cancelled,
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Step, ScheduleError>> + Send + 'a>>;

/// The state owned by the run task.
struct Run {
    dispatcher: Arc<dyn Dispatcher>,
    bus: Arc<EventBus>,
    poll_interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
    trace: Arc<Mutex<Vec<StepEvent>>>,
}

impl Run {
    async fn execute_schedule(self, schedule: Schedule) {
        for (position, instruction) in schedule.instructions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return self.finish(RunState::Cancelled { position });
            }
            self.state.send_replace(RunState::Running { position });
            tracing::debug!(position, instruction = %instruction, "pluto.scheduler.step");

            let event = match self.execute(instruction).await {
                Ok(Step::Done) => StepEvent::Completed { position },
                Ok(Step::Skipped) => {
                    tracing::info!(position, instruction = %instruction, "pluto.scheduler.step.skipped");
                    StepEvent::Skipped { position }
                }
                Err(ScheduleError::Cancelled) => {
                    return self.finish(RunState::Cancelled { position });
                }
                Err(error) => {
                    tracing::warn!(position, instruction = %instruction, error = %error, "pluto.scheduler.step.failed");
                    return self.finish(RunState::Failed { position, error });
                }
            };
            self.trace
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
        self.finish(RunState::Completed);
    }

    fn finish(&self, state: RunState) {
        tracing::info!(state = ?state, "pluto.scheduler.finish");
        self.state.send_replace(state);
    }

    fn execute<'a>(&'a self, instruction: &'a Instruction) -> StepFuture<'a> {
        Box::pin(async move {
            match instruction {
                Instruction::Call {
                    component,
                    method,
                    args,
                } => {
                    self.dispatcher
                        .call_method(component, method, args.clone())
                        .await?;
                    Ok(Step::Done)
                }
                Instruction::Set {
                    component,
                    assignments,
                } => self.set_all(component, assignments).await,
                Instruction::WaitEvent {
                    matcher,
                    timeout,
                    best_effort,
                } => {
                    let parked = self.park(self.event(matcher), *timeout).await;
                    settle(parked, *best_effort, || format!("event {}", matcher.topic))
                }
                Instruction::WaitDuration { duration } => {
                    match self.park(std::future::pending(), Some(*duration)).await {
                        Parked::Cancelled => Err(ScheduleError::Cancelled),
                        _ => Ok(Step::Done),
                    }
                }
                Instruction::WaitVariable {
                    component,
                    variable,
                    condition,
                    stable_for,
                    timeout,
                    best_effort,
                } => {
                    let settled = self.settled(component, variable, *condition, *stable_for);
                    let parked = self.park(settled, *timeout).await;
                    settle(parked, *best_effort, || {
                        format!("{component}.{variable} {condition}")
                    })
                }
                Instruction::Repeat {
                    instruction,
                    times,
                    every,
                } => self.repeat(instruction, *times, *every).await,
            }
        })
    }

    async fn set_all(
        &self,
        component: &str,
        assignments: &[Assignment],
    ) -> Result<Step, ScheduleError> {
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 && self.cancel.is_cancelled() {
                return Err(ScheduleError::Cancelled);
            }
            self.dispatcher
                .set_variable(component, &assignment.variable, assignment.value.clone())
                .await?;
        }
        Ok(Step::Done)
    }

    async fn repeat(
        &self,
        instruction: &Instruction,
        times: u32,
        every: Option<DurationMs>,
    ) -> Result<Step, ScheduleError> {
        for iteration in 0..times {
            if iteration > 0 && self.cancel.is_cancelled() {
                return Err(ScheduleError::Cancelled);
            }
            let started = Instant::now();
            tracing::debug!(iteration, times, "pluto.scheduler.repeat");
            self.execute(instruction).await?;

            if let Some(every) = every.filter(|_| iteration + 1 < times) {
                let remaining = every.to_std().saturating_sub(started.elapsed());
                if let Parked::Cancelled = self
                    .park(std::future::pending(), Some(DurationMs::from(remaining)))
                    .await
                {
                    return Err(ScheduleError::Cancelled);
                }
            }
        }
        Ok(Step::Done)
    }

    /// Race `until` against the timeout and cancellation.
    async fn park<F>(&self, until: F, timeout: Option<DurationMs>) -> Parked
    where
        F: Future<Output = Result<(), ScheduleError>>,
    {
        let deadline = async {
            match timeout {
                Some(after) => tokio::time::sleep(after.to_std()).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Parked::Cancelled,
            result = until => Parked::Done(result),
            _ = deadline => Parked::TimedOut(timeout.unwrap_or_default()),
        }
    }

    /// Resolves once a matching event is published. The subscription is
    /// registered when the wait begins and removed when it ends.
    async fn event(&self, matcher: &EventMatch) -> Result<(), ScheduleError> {
        let filter = TopicFilter::Exact(matcher.topic.clone());
        let Ok((subscription, mut rx)) = self.bus.subscribe_channel(filter) else {
            tracing::warn!(topic = %matcher.topic, "pluto.scheduler.wait.bus_closed");
            return std::future::pending().await;
        };
        let _unsubscribe = Unsubscribe {
            bus: &self.bus,
            subscription,
        };
        while let Some(event) = rx.recv().await {
            if matcher.matches(&event) {
                return Ok(());
            }
        }
        std::future::pending().await
    }

    /// Resolves once the variable has satisfied `condition` continuously
    /// for `window`. Read failures end the wait with that error.
    async fn settled(
        &self,
        component: &str,
        variable: &str,
        condition: Condition,
        window: DurationMs,
    ) -> Result<(), ScheduleError> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut since: Option<Instant> = None;
        loop {
            ticker.tick().await;
            let value = self.dispatcher.get_variable(component, variable).await?;
            if condition.is_met(&value) {
                let first = *since.get_or_insert_with(Instant::now);
                if first.elapsed() >= window.to_std() {
                    return Ok(());
                }
            } else {
                since = None;
            }
        }
    }
}

fn settle(
    parked: Parked,
    best_effort: bool,
    waiting_for: impl FnOnce() -> String,
) -> Result<Step, ScheduleError> {
    match parked {
        Parked::Done(result) => result.map(|()| Step::Done),
        Parked::Cancelled => Err(ScheduleError::Cancelled),
        Parked::TimedOut(_) if best_effort => Ok(Step::Skipped),
        Parked::TimedOut(after) => Err(ScheduleError::Timeout {
            after,
            waiting_for: waiting_for(),
        }),
    }
}

struct Unsubscribe<'a> {
    bus: &'a EventBus,
    subscription: pluto_bus::Subscription,
}

impl Drop for Unsubscribe<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
