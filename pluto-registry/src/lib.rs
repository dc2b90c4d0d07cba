#![deny(missing_docs)]
//! In-process implementation of pluto-core's Dispatcher trait.
//!
//! Components live in a `HashMap` behind a `std::sync::RwLock`. The lock
//! only guards the map itself: a lookup clones the component's handle and
//! releases the lock before any component code runs. Each component sits
//! behind its own `tokio::sync::Mutex`, so calls on one component are
//! serialized while calls on different components proceed concurrently.

use async_trait::async_trait;
use pluto_core::component::{Component, MethodSpec, VariableSpec};
use pluto_core::dispatch::Dispatcher;
use pluto_core::error::{ComponentError, RegistryError};
use pluto_core::event::{Event, Publisher};
use pluto_core::value::{Value, ValueKind};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// A component shared between the registry and its creator.
pub type SharedComponent = Arc<Mutex<dyn Component>>;

struct Entry {
    component: SharedComponent,
    methods: Vec<MethodSpec>,
    variables: Vec<VariableSpec>,
}

impl Entry {
    fn method(&self, component: &str, method: &str) -> Result<&MethodSpec, RegistryError> {
        self.methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| RegistryError::MethodNotFound {
                component: component.to_owned(),
                method: method.to_owned(),
            })
    }

    fn variable(&self, component: &str, variable: &str) -> Result<&VariableSpec, RegistryError> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .ok_or_else(|| RegistryError::VariableNotFound {
                component: component.to_owned(),
                variable: variable.to_owned(),
            })
    }
}

/// The live mapping from component name to component.
///
/// A component's methods and variables are captured when it registers and
/// every call is validated against them before the component is touched.
/// After a successful `set_variable` the registry publishes a
/// `variable.update` event through the publisher given to
/// [`with_publisher`](Self::with_publisher), if any.
pub struct ComponentRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            publisher: None,
        }
    }

    /// Announce variable updates through `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Register a component, taking ownership of it.
    ///
    /// Fails with [`RegistryError::DuplicateName`] if the name is taken; the
    /// component already registered under it is left untouched.
    pub fn register<C: Component + 'static>(&self, component: C) -> Result<(), RegistryError> {
        let name = component.name().to_owned();
        let entry = Entry {
            methods: component.methods(),
            variables: component.variables(),
            component: Arc::new(Mutex::new(component)),
        };
        self.insert(name, entry)
    }

    /// Register a component the caller keeps a handle to.
    ///
    /// The caller must not hold the component's lock across long operations;
    /// registry dispatch waits on the same lock.
    pub async fn register_shared(&self, component: SharedComponent) -> Result<(), RegistryError> {
        let (name, methods, variables) = {
            let guard = component.lock().await;
            (guard.name().to_owned(), guard.methods(), guard.variables())
        };
        self.insert(
            name,
            Entry {
                component,
                methods,
                variables,
            },
        )
    }

    fn insert(&self, name: String, entry: Entry) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            tracing::warn!(component = %name, "pluto.registry.duplicate");
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::info!(
            component = %name,
            methods = entry.methods.len(),
            variables = entry.variables.len(),
            "pluto.registry.register"
        );
        entries.insert(name, entry);
        Ok(())
    }

    /// Remove a component. In-flight calls on it run to completion.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(_) => {
                tracing::info!(component = %name, "pluto.registry.unregister");
                Ok(())
            }
            None => Err(RegistryError::NotFound(name.to_owned())),
        }
    }

    /// Whether a component named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no component is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of every registered component, sorted. Each call reflects the
    /// registry as it is at that moment.
    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Methods exposed by `component`.
    pub fn list_methods(&self, component: &str) -> Result<Vec<MethodSpec>, RegistryError> {
        self.with_entry(component, |entry| Ok(entry.methods.clone()))
    }

    /// Variables exposed by `component`.
    pub fn list_variables(&self, component: &str) -> Result<Vec<VariableSpec>, RegistryError> {
        self.with_entry(component, |entry| Ok(entry.variables.clone()))
    }

    /// Call `method` on `component`.
    ///
    /// Checks, in order: the component exists, the method exists, the
    /// argument count matches its arity. Only then is the component locked
    /// and invoked. A failure raised by the component becomes
    /// [`RegistryError::Invocation`].
    pub async fn call_method(
        &self,
        component: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RegistryError> {
        let handle = self.with_entry(component, |entry| {
            let spec = entry.method(component, method)?;
            if spec.arity != args.len() {
                return Err(RegistryError::Arity {
                    component: component.to_owned(),
                    method: method.to_owned(),
                    expected: spec.arity,
                    actual: args.len(),
                });
            }
            Ok(Arc::clone(&entry.component))
        })?;

        tracing::debug!(component, method, args = args.len(), "pluto.registry.call");
        let result = handle.lock().await.invoke(method, args).await;
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(component, method, error = %err, "pluto.registry.call.failed");
                Err(component_failure(component, method, err))
            }
        }
    }

    /// Read `variable` from `component`.
    pub async fn get_variable(
        &self,
        component: &str,
        variable: &str,
    ) -> Result<Value, RegistryError> {
        let handle = self.with_entry(component, |entry| {
            entry.variable(component, variable)?;
            Ok(Arc::clone(&entry.component))
        })?;

        let result = handle.lock().await.get(variable).await;
        result.map_err(|err| component_failure(component, variable, err))
    }

    /// Write `value` to `variable` on `component`.
    ///
    /// Rejects read-only variables and values the declared [`ValueKind`]
    /// does not accept before the component is touched. On success a
    /// `variable.update` event is published once the component's lock has
    /// been released; a failed publish is logged, not returned.
    pub async fn set_variable(
        &self,
        component: &str,
        variable: &str,
        value: Value,
    ) -> Result<(), RegistryError> {
        let handle = self.with_entry(component, |entry| {
            let spec = entry.variable(component, variable)?;
            if !spec.is_writable() {
                return Err(RegistryError::ReadOnlyVariable {
                    component: component.to_owned(),
                    variable: variable.to_owned(),
                });
            }
            if !spec.kind.accepts(&value) {
                return Err(RegistryError::TypeMismatch {
                    component: component.to_owned(),
                    variable: variable.to_owned(),
                    expected: spec.kind,
                    actual: ValueKind::of(&value),
                });
            }
            Ok(Arc::clone(&entry.component))
        })?;

        let result = handle.lock().await.set(variable, value.clone()).await;
        result.map_err(|err| component_failure(component, variable, err))?;
        tracing::debug!(component, variable, "pluto.registry.set");

        if let Some(publisher) = &self.publisher {
            let event = Event::variable_update(component, variable, value);
            if let Err(err) = publisher.publish(event).await {
                tracing::warn!(component, variable, error = %err, "pluto.registry.update.undelivered");
            }
        }
        Ok(())
    }

    /// Remove every component and shut each one down, in name order.
    ///
    /// Returns the shutdown failures; an empty vector means every component
    /// shut down cleanly.
    pub async fn drain(&self) -> Vec<RegistryError> {
        let mut drained: Vec<(String, Entry)> = std::mem::take(
            &mut *self.entries.write().unwrap_or_else(PoisonError::into_inner),
        )
        .into_iter()
        .collect();
        drained.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut failures = Vec::new();
        for (name, entry) in drained {
            let result = entry.component.lock().await.shutdown().await;
            if let Err(err) = result {
                tracing::warn!(component = %name, error = %err, "pluto.registry.shutdown.failed");
                failures.push(RegistryError::invocation(&name, "shutdown", &err));
            }
        }
        tracing::info!(failures = failures.len(), "pluto.registry.drain");
        failures
    }

    fn with_entry<T>(
        &self,
        component: &str,
        f: impl FnOnce(&Entry) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(component)
            .ok_or_else(|| RegistryError::NotFound(component.to_owned()))?;
        f(entry)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A component reporting an unknown name after passing validation means its
/// declared surface and its behaviour disagree; report the structural kind.
fn component_failure(component: &str, target: &str, err: ComponentError) -> RegistryError {
    match err {
        ComponentError::UnknownMethod(method) => RegistryError::MethodNotFound {
            component: component.to_owned(),
            method,
        },
        ComponentError::UnknownVariable(variable) => RegistryError::VariableNotFound {
            component: component.to_owned(),
            variable,
        },
        other => RegistryError::invocation(component, target, &other),
    }
}

#[async_trait]
impl Dispatcher for ComponentRegistry {
    fn list_components(&self) -> Vec<String> {
        ComponentRegistry::list_components(self)
    }

    fn list_methods(&self, component: &str) -> Result<Vec<MethodSpec>, RegistryError> {
        ComponentRegistry::list_methods(self, component)
    }

    fn list_variables(&self, component: &str) -> Result<Vec<VariableSpec>, RegistryError> {
        ComponentRegistry::list_variables(self, component)
    }

    async fn call_method(
        &self,
        component: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RegistryError> {
        ComponentRegistry::call_method(self, component, method, args).await
    }

    async fn get_variable(&self, component: &str, variable: &str) -> Result<Value, RegistryError> {
        ComponentRegistry::get_variable(self, component, variable).await
    }

    async fn set_variable(
        &self,
        component: &str,
        variable: &str,
        value: Value,
    ) -> Result<(), RegistryError> {
        ComponentRegistry::set_variable(self, component, variable, value).await
    }
}
