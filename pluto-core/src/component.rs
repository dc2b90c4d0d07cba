//! The Component protocol: a named unit exposing methods and variables.

use crate::error::ComponentError;
use crate::value::{Value, ValueKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A callable method and how many positional arguments it takes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Method name, unique within its component.
    pub name: String,
    /// Exact number of positional arguments.
    pub arity: usize,
}

impl MethodSpec {
    /// Describe a method taking `arity` arguments.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

/// Whether a variable may be written.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Get only.
    ReadOnly,
    /// Get and set.
    ReadWrite,
}

/// A readable (and possibly writable) typed variable.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name, unique within its component.
    pub name: String,
    /// Declared kind; `set_variable` rejects values it does not accept.
    pub kind: ValueKind,
    /// Access mode.
    pub access: Access,
}

impl VariableSpec {
    /// Describe a read-write variable.
    pub fn read_write(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::ReadWrite,
        }
    }

    /// Describe a read-only variable.
    pub fn read_only(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::ReadOnly,
        }
    }

    /// Whether `set` is allowed.
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }
}

/// Protocol ①: Component
///
/// The capability interface every dispatchable unit implements. Dispatch is
/// by name, so a component describes itself through [`methods`] and
/// [`variables`]; the registry validates names, arity, access and value
/// kinds against these descriptions before calling [`invoke`] or [`set`].
///
/// Implementations never run concurrently with themselves: the registry
/// serializes every call on a single component, which is why the mutating
/// operations take `&mut self`.
///
/// [`methods`]: Component::methods
/// [`variables`]: Component::variables
/// [`invoke`]: Component::invoke
/// [`set`]: Component::set
#[async_trait]
pub trait Component: Send + Sync {
    /// The unique name this component registers under.
    fn name(&self) -> &str;

    /// The methods currently exposed.
    fn methods(&self) -> Vec<MethodSpec>;

    /// The variables currently exposed.
    fn variables(&self) -> Vec<VariableSpec>;

    /// Invoke `method` with exactly as many arguments as its arity.
    async fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, ComponentError>;

    /// Read the current value of `variable`.
    async fn get(&self, variable: &str) -> Result<Value, ComponentError>;

    /// Replace the value of `variable`. The value already matches the
    /// declared kind.
    async fn set(&mut self, variable: &str, value: Value) -> Result<(), ComponentError>;

    /// Release resources when the component is drained at shutdown.
    async fn shutdown(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }
}
