//! Schedules and the instructions they are made of.

use pluto_core::{DurationMs, EventMatch, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One variable assignment inside [`Instruction::Set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Variable to write.
    pub variable: String,
    /// Value to write.
    pub value: Value,
}

/// When a watched numeric variable counts as settled.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// `min <= value <= max`.
    Range {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// `value >= threshold`.
    AtLeast {
        /// Inclusive lower bound.
        threshold: f64,
    },
}

impl Condition {
    /// Whether `value` satisfies the condition. Non-numeric values never do.
    pub fn is_met(&self, value: &Value) -> bool {
        let Some(x) = value.as_f64() else {
            return false;
        };
        match *self {
            Self::Range { min, max } => min <= x && x <= max,
            Self::AtLeast { threshold } => x >= threshold,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { min, max } => write!(f, "in [{min}, {max}]"),
            Self::AtLeast { threshold } => write!(f, ">= {threshold}"),
        }
    }
}

/// One scheduler step.
///
/// Waits with a `timeout` fail the run with `ScheduleError::Timeout` when
/// it elapses, unless `best_effort` is set, in which case the instruction
/// is skipped and the run continues.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Invoke a method.
    Call {
        /// Target component.
        component: String,
        /// Method to invoke.
        method: String,
        /// Positional arguments.
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Write several variables of one component, in order.
    Set {
        /// Target component.
        component: String,
        /// Assignments applied one after another.
        assignments: Vec<Assignment>,
    },
    /// Park until a matching event is published on the bus.
    WaitEvent {
        /// Predicate the event must satisfy.
        matcher: EventMatch,
        /// Give up after this long.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<DurationMs>,
        /// Skip instead of failing on timeout.
        #[serde(default)]
        best_effort: bool,
    },
    /// Park for a fixed duration.
    WaitDuration {
        /// How long to park.
        duration: DurationMs,
    },
    /// Poll a variable until it satisfies `condition` for `stable_for`
    /// without interruption.
    WaitVariable {
        /// Component owning the variable.
        component: String,
        /// Variable to poll.
        variable: String,
        /// Condition to hold.
        condition: Condition,
        /// How long the condition must hold continuously.
        #[serde(default)]
        stable_for: DurationMs,
        /// Give up after this long.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<DurationMs>,
        /// Skip instead of failing on timeout.
        #[serde(default)]
        best_effort: bool,
    },
    /// Run `instruction` `times` times in a row.
    Repeat {
        /// The repeated instruction.
        instruction: Box<Instruction>,
        /// Number of iterations.
        times: u32,
        /// Minimum spacing between the starts of two iterations.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        every: Option<DurationMs>,
    },
}

impl Instruction {
    /// Invoke `component.method(args)`.
    pub fn call(
        component: impl Into<String>,
        method: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self::Call {
            component: component.into(),
            method: method.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Write each `(variable, value)` pair on `component`, in order.
    pub fn set<V: Into<String>>(
        component: impl Into<String>,
        assignments: impl IntoIterator<Item = (V, Value)>,
    ) -> Self {
        Self::Set {
            component: component.into(),
            assignments: assignments
                .into_iter()
                .map(|(variable, value)| Assignment {
                    variable: variable.into(),
                    value,
                })
                .collect(),
        }
    }

    /// Wait for an event matching `matcher`, with no timeout.
    pub fn wait_event(matcher: EventMatch) -> Self {
        Self::WaitEvent {
            matcher,
            timeout: None,
            best_effort: false,
        }
    }

    /// Park for `duration`.
    pub fn wait_duration(duration: DurationMs) -> Self {
        Self::WaitDuration { duration }
    }

    /// Wait until `component.variable` satisfies `condition`.
    pub fn wait_variable(
        component: impl Into<String>,
        variable: impl Into<String>,
        condition: Condition,
    ) -> Self {
        Self::WaitVariable {
            component: component.into(),
            variable: variable.into(),
            condition,
            stable_for: DurationMs::ZERO,
            timeout: None,
            best_effort: false,
        }
    }

    /// Repeat `instruction` `times` times.
    pub fn repeat(instruction: Instruction, times: u32) -> Self {
        Self::Repeat {
            instruction: Box::new(instruction),
            times,
            every: None,
        }
    }

    /// Set the timeout of a wait. Other instructions are returned unchanged.
    pub fn with_timeout(mut self, after: DurationMs) -> Self {
        if let Self::WaitEvent { timeout, .. } | Self::WaitVariable { timeout, .. } = &mut self {
            *timeout = Some(after);
        }
        self
    }

    /// Mark a wait as best-effort. Other instructions are returned unchanged.
    pub fn best_effort(mut self) -> Self {
        if let Self::WaitEvent { best_effort, .. } | Self::WaitVariable { best_effort, .. } =
            &mut self
        {
            *best_effort = true;
        }
        self
    }

    /// Require a variable wait's condition to hold for `window`.
    pub fn stable_for(mut self, window: DurationMs) -> Self {
        if let Self::WaitVariable { stable_for, .. } = &mut self {
            *stable_for = window;
        }
        self
    }

    /// Space repeat iterations at least `interval` apart.
    pub fn every(mut self, interval: DurationMs) -> Self {
        if let Self::Repeat { every, .. } = &mut self {
            *every = Some(interval);
        }
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call {
                component,
                method,
                args,
            } => write!(f, "call {component}.{method}({} args)", args.len()),
            Self::Set {
                component,
                assignments,
            } => {
                write!(f, "set")?;
                for (i, a) in assignments.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{component}.{}={}", a.variable, a.value)?;
                }
                Ok(())
            }
            Self::WaitEvent {
                matcher, timeout, ..
            } => {
                write!(f, "wait for event {}", matcher.topic)?;
                if let Some(payload) = &matcher.payload {
                    write!(f, " matching {payload}")?;
                }
                if let Some(t) = timeout {
                    write!(f, " (timeout {t})")?;
                }
                Ok(())
            }
            Self::WaitDuration { duration } => write!(f, "wait {duration}"),
            Self::WaitVariable {
                component,
                variable,
                condition,
                stable_for,
                ..
            } => write!(
                f,
                "wait until {component}.{variable} {condition} for {stable_for}"
            ),
            Self::Repeat {
                instruction,
                times,
                every,
            } => {
                write!(f, "repeat {times}x")?;
                if let Some(every) = every {
                    write!(f, " every {every}")?;
                }
                write!(f, ": {instruction}")
            }
        }
    }
}

/// An ordered, described list of instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Human-readable description, used in logs.
    #[serde(default)]
    pub description: String,
    /// Instructions in execution order.
    pub instructions: Vec<Instruction>,
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            instructions: Vec::new(),
        }
    }

    /// Append `instruction`.
    pub fn then(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Number of top-level instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the schedule has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conditions_only_accept_numbers() {
        let range = Condition::Range { min: 1.0, max: 2.0 };
        assert!(range.is_met(&json!(1)));
        assert!(range.is_met(&json!(2.0)));
        assert!(!range.is_met(&json!(2.5)));
        assert!(!range.is_met(&json!("1.5")));
        assert!(Condition::AtLeast { threshold: 10.0 }.is_met(&json!(10)));
    }

    #[test]
    fn modifiers_only_touch_matching_variants() {
        let call = Instruction::call("a", "m", []).with_timeout(DurationMs::from_millis(5));
        assert_eq!(call, Instruction::call("a", "m", []));

        let wait = Instruction::wait_event(EventMatch::topic("ready"))
            .with_timeout(DurationMs::from_millis(5))
            .best_effort();
        assert_eq!(
            wait,
            Instruction::WaitEvent {
                matcher: EventMatch::topic("ready"),
                timeout: Some(DurationMs::from_millis(5)),
                best_effort: true,
            }
        );
    }

    #[test]
    fn instructions_describe_themselves() {
        let set = Instruction::set("pump", [("rate", json!(12)), ("mode", json!("auto"))]);
        assert_eq!(set.to_string(), r#"set pump.rate=12, pump.mode="auto""#);

        let repeat = Instruction::repeat(Instruction::call("pump", "prime", [json!(1)]), 3);
        assert_eq!(repeat.to_string(), "repeat 3x: call pump.prime(1 args)");

        let wait = Instruction::wait_variable("tank", "level", Condition::AtLeast { threshold: 5.0 })
            .stable_for(DurationMs::from_millis(200));
        assert_eq!(wait.to_string(), "wait until tank.level >= 5 for 200ms");
    }

    #[test]
    fn schedule_reads_from_json() {
        let schedule: Schedule = serde_json::from_value(json!({
            "description": "prime and wait",
            "instructions": [
                {"type": "call", "component": "pump", "method": "prime", "args": [1]},
                {"type": "wait_event", "matcher": {"topic": "primed"}, "timeout": 500, "best_effort": true},
                {"type": "repeat", "times": 2, "instruction": {"type": "wait_duration", "duration": 10}}
            ]
        }))
        .unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(
            schedule.instructions[1],
            Instruction::wait_event(EventMatch::topic("primed"))
                .with_timeout(DurationMs::from_millis(500))
                .best_effort()
        );
    }
}
