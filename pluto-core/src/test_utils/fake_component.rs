//! FakeComponent: a component with a fixed, well-known surface.

use crate::component::{Component, MethodSpec, VariableSpec};
use crate::error::ComponentError;
use crate::value::{Value, ValueKind};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared view of the calls a [`FakeComponent`] received.
///
/// Clone it before handing the component to a registry; the clone keeps
/// observing.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CallLog {
    /// Every call in arrival order, formatted `invoke:<method>`,
    /// `get:<variable>` or `set:<variable>`.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// The highest number of calls that were ever in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, entry: String) -> ActiveGuard<'_> {
        self.entries.lock().unwrap().push(entry);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(self)
    }
}

struct ActiveGuard<'a>(&'a CallLog);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A component for exercising dispatch.
///
/// Methods:
/// - `simple_method()` returns `null`
/// - `complex_method(foo, bar)` returns `"silly return"`
/// - `bang_bang()` always fails
/// - `sleep(ms)` sleeps for `ms` milliseconds, then returns `ms`
///
/// Variables:
/// - `foo`: integer, read-only, starts at 0
/// - `bar`, `baz`: any kind, read-write, start at 0
/// - `count`: integer, read-write, starts at 0
/// - `bang`: any kind, read-write, every access fails
/// - `long_a`: integer, read-write, setting it sleeps for `value` milliseconds
pub struct FakeComponent {
    name: String,
    values: HashMap<String, Value>,
    log: CallLog,
}

impl FakeComponent {
    /// Create a fake with all variables at their initial values.
    pub fn new(name: impl Into<String>) -> Self {
        let values = ["foo", "bar", "baz", "count", "long_a"]
            .into_iter()
            .map(|v| (v.to_owned(), json!(0)))
            .collect();
        Self {
            name: name.into(),
            values,
            log: CallLog::default(),
        }
    }

    /// A handle observing every call made to this component.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl Component for FakeComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> Vec<MethodSpec> {
        vec![
            MethodSpec::new("simple_method", 0),
            MethodSpec::new("complex_method", 2),
            MethodSpec::new("bang_bang", 0),
            MethodSpec::new("sleep", 1),
        ]
    }

    fn variables(&self) -> Vec<VariableSpec> {
        vec![
            VariableSpec::read_only("foo", ValueKind::Integer),
            VariableSpec::read_write("bar", ValueKind::Any),
            VariableSpec::read_write("baz", ValueKind::Any),
            VariableSpec::read_write("count", ValueKind::Integer),
            VariableSpec::read_write("bang", ValueKind::Any),
            VariableSpec::read_write("long_a", ValueKind::Integer),
        ]
    }

    async fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, ComponentError> {
        let _active = self.log.enter(format!("invoke:{method}"));
        match method {
            "simple_method" => Ok(Value::Null),
            "complex_method" => Ok(json!("silly return")),
            "bang_bang" => Err(ComponentError::failed("BANG! A forced exception")),
            "sleep" => {
                let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(ms))
            }
            other => Err(ComponentError::UnknownMethod(other.to_owned())),
        }
    }

    async fn get(&self, variable: &str) -> Result<Value, ComponentError> {
        let _active = self.log.enter(format!("get:{variable}"));
        if variable == "bang" {
            return Err(ComponentError::failed("BANG! A forced exception"));
        }
        self.values
            .get(variable)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownVariable(variable.to_owned()))
    }

    async fn set(&mut self, variable: &str, value: Value) -> Result<(), ComponentError> {
        let _active = self.log.enter(format!("set:{variable}"));
        match variable {
            "bang" => Err(ComponentError::failed("BANG! A forced exception")),
            "long_a" => {
                let ms = value.as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.values.insert(variable.to_owned(), value);
                Ok(())
            }
            known if self.values.contains_key(known) => {
                self.values.insert(known.to_owned(), value);
                Ok(())
            }
            other => Err(ComponentError::UnknownVariable(other.to_owned())),
        }
    }
}
