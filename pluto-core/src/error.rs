//! Error types for each protocol.

use crate::duration::DurationMs;
use crate::value::ValueKind;
use std::fmt;
use thiserror::Error;

/// Failures raised by a component's own logic.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ComponentError {
    /// The component's method or accessor failed.
    #[error("{0}")]
    Failed(String),

    /// The component does not recognise the method name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The component does not recognise the variable name.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ComponentError {
    /// Convenience constructor for [`ComponentError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Registry and dispatch errors.
///
/// Every variant is a distinct, structural failure kind; see
/// [`RegistryError::kind`] for the stable code of each.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A component with this name is already registered.
    #[error("duplicate component name: {0}")]
    DuplicateName(String),

    /// No component with this name is registered.
    #[error("component not found: {0}")]
    NotFound(String),

    /// The component exists but exposes no such method.
    #[error("method not found: {component}.{method}")]
    MethodNotFound {
        /// Component that was searched.
        component: String,
        /// Method that was not found.
        method: String,
    },

    /// The component exists but exposes no such variable.
    #[error("variable not found: {component}.{variable}")]
    VariableNotFound {
        /// Component that was searched.
        component: String,
        /// Variable that was not found.
        variable: String,
    },

    /// The argument count does not match the method's arity.
    #[error("arity mismatch: {component}.{method} takes {expected} argument(s), got {actual}")]
    Arity {
        /// Component owning the method.
        component: String,
        /// Method that was called.
        method: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// The value is not assignable to the variable's declared kind.
    #[error("type mismatch: {component}.{variable} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Component owning the variable.
        component: String,
        /// Variable being set.
        variable: String,
        /// Declared kind.
        expected: ValueKind,
        /// Kind of the rejected value.
        actual: ValueKind,
    },

    /// The variable can be read but not written.
    #[error("variable is read-only: {component}.{variable}")]
    ReadOnlyVariable {
        /// Component owning the variable.
        component: String,
        /// Variable being set.
        variable: String,
    },

    /// The component's own logic failed. Only the failure's description is
    /// kept; no component state travels with it.
    #[error("invocation failed: {component}.{target}: {message}")]
    Invocation {
        /// Component that failed.
        component: String,
        /// Method or variable being accessed.
        target: String,
        /// Description of the original failure.
        message: String,
    },
}

impl RegistryError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName(_) => ErrorKind::DuplicateName,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::VariableNotFound { .. } => ErrorKind::VariableNotFound,
            Self::Arity { .. } => ErrorKind::Arity,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::ReadOnlyVariable { .. } => ErrorKind::ReadOnlyVariable,
            Self::Invocation { .. } => ErrorKind::Invocation,
        }
    }

    /// Wrap a component failure raised while touching `target`.
    pub fn invocation(
        component: impl Into<String>,
        target: impl Into<String>,
        source: &ComponentError,
    ) -> Self {
        Self::Invocation {
            component: component.into(),
            target: target.into(),
            message: source.to_string(),
        }
    }
}

/// Scheduler run errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A wait did not complete before its timeout.
    #[error("timed out after {after} waiting for {waiting_for}")]
    Timeout {
        /// How long the instruction waited.
        after: DurationMs,
        /// Description of what was awaited.
        waiting_for: String,
    },

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The scheduler has already been started once.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// The scheduler was never started, so there is no run to wait for.
    #[error("scheduler not started")]
    NotStarted,

    /// The run task stopped without reaching a terminal state.
    #[error("run aborted before reaching a terminal state")]
    Aborted,

    /// An instruction failed in the registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ScheduleError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::AlreadyStarted | Self::NotStarted | Self::Aborted => ErrorKind::InvalidState,
            Self::Registry(e) => e.kind(),
        }
    }
}

/// Stable, branchable error kinds shared by every layer.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RegistryError::DuplicateName`].
    DuplicateName,
    /// See [`RegistryError::NotFound`].
    NotFound,
    /// See [`RegistryError::MethodNotFound`].
    MethodNotFound,
    /// See [`RegistryError::VariableNotFound`].
    VariableNotFound,
    /// See [`RegistryError::Arity`].
    Arity,
    /// See [`RegistryError::TypeMismatch`].
    TypeMismatch,
    /// See [`RegistryError::ReadOnlyVariable`].
    ReadOnlyVariable,
    /// See [`RegistryError::Invocation`].
    Invocation,
    /// See [`ScheduleError::Timeout`].
    Timeout,
    /// See [`ScheduleError::Cancelled`].
    Cancelled,
    /// An operation was attempted in a state that does not allow it.
    InvalidState,
}

impl ErrorKind {
    /// The stable code for this kind. Codes never change once published.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateName => "duplicate_name",
            Self::NotFound => "not_found",
            Self::MethodNotFound => "method_not_found",
            Self::VariableNotFound => "variable_not_found",
            Self::Arity => "arity_mismatch",
            Self::TypeMismatch => "type_mismatch",
            Self::ReadOnlyVariable => "read_only_variable",
            Self::Invocation => "invocation_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidState => "invalid_state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscriber errors. These are collected by the bus and never stop
/// delivery to other subscribers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// The subscriber failed to handle the event.
    #[error("subscriber failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// One failed delivery during a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Subscription that failed, as returned by `subscribe`.
    pub subscription: u64,
    /// Description of the subscriber's failure.
    pub message: String,
}

/// Publish errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// One or more subscribers failed. Every matching subscriber was still
    /// attempted.
    #[error("{} of {attempted} deliveries failed for topic {topic}", .failures.len())]
    Delivery {
        /// Topic of the published event.
        topic: String,
        /// Number of subscribers the event was delivered to.
        attempted: usize,
        /// The failures, in delivery order.
        failures: Vec<DeliveryFailure>,
    },
}
