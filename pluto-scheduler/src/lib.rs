#![deny(missing_docs)]
//! Sequential scheduler for Pluto experimental schedules.
//!
//! A [`Schedule`] is an ordered list of [`Instruction`]s: method calls,
//! variable writes and waits on the bus, on the clock or on a variable.
//! A [`Scheduler`] executes one schedule on a dedicated task, strictly one
//! instruction after another, as an explicit state machine:
//!
//! ```text
//! Idle ──start──▶ Running ──▶ Completed
//!                    │
//!                    ├──▶ Failed { position, error }
//!                    └──▶ Cancelled { position }
//! ```
//!
//! Any dispatch error fails the run at the instruction's position; nothing
//! after it executes and nothing is retried. Waits may carry a timeout and
//! may be marked best-effort, in which case a timeout skips the wait
//! instead of failing the run.

mod config;
mod instruction;
mod scheduler;

pub use config::SchedulerConfig;
pub use instruction::{Assignment, Condition, Instruction, Schedule};
pub use scheduler::{RunReport, RunState, Scheduler, StepEvent};
