//! The Dispatch protocol: name-based access to registered components.

use crate::component::{MethodSpec, VariableSpec};
use crate::error::RegistryError;
use crate::value::Value;
use async_trait::async_trait;

/// Protocol ②: Dispatch
///
/// Everything that drives components by name goes through this trait: the
/// scheduler replaying instructions and the remote delegator serving
/// requests. The in-process registry is the canonical implementation.
///
/// Every structural failure (unknown component, method or variable, wrong
/// arity, wrong value kind, read-only variable) is reported before the
/// component's own code runs.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Names of every registered component, sorted.
    fn list_components(&self) -> Vec<String>;

    /// Methods exposed by `component`.
    fn list_methods(&self, component: &str) -> Result<Vec<MethodSpec>, RegistryError>;

    /// Variables exposed by `component`.
    fn list_variables(&self, component: &str) -> Result<Vec<VariableSpec>, RegistryError>;

    /// Call `method` on `component` with positional `args`.
    async fn call_method(
        &self,
        component: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RegistryError>;

    /// Read `variable` from `component`.
    async fn get_variable(&self, component: &str, variable: &str) -> Result<Value, RegistryError>;

    /// Write `value` to `variable` on `component`.
    async fn set_variable(
        &self,
        component: &str,
        variable: &str,
        value: Value,
    ) -> Result<(), RegistryError>;
}
