// Service container

use crate::{Error, Result};
use parking_lot::RwLock;
use portico_log::{debug, trace};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Marker for anything that can live in the container.
pub trait Provider: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Provider for T {}

type Instance = Arc<dyn Any + Send + Sync>;
type Hook = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// Type-keyed service container.
///
/// Cloning a container yields another handle to the same services. `on`
/// hooks run against the current instance (if any) and against every
/// instance registered later, which is how boots adjust services owned by
/// other boots.
#[derive(Clone, Default)]
pub struct Container {
    providers: Arc<RwLock<HashMap<TypeId, Instance>>>,
    hooks: Arc<RwLock<HashMap<TypeId, Vec<Hook>>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance, replacing any previous one of that type.
    pub fn register<T: Provider>(&self, instance: T) {
        self.register_arc(Arc::new(instance));
    }

    pub fn register_arc<T: Provider>(&self, instance: Arc<T>) {
        let type_name = std::any::type_name::<T>();
        self.register_by_id(TypeId::of::<T>(), instance);
        debug!(target: "portico::container", "registered {}", type_name);
    }

    /// Register an already type-erased instance under the given id.
    pub fn register_by_id(&self, type_id: TypeId, instance: Instance) {
        self.providers.write().insert(type_id, instance.clone());

        let hooks = self.hooks.read().get(&type_id).cloned().unwrap_or_default();
        for hook in hooks {
            hook(instance.as_ref());
        }
    }

    /// Resolve a service by type.
    pub fn resolve<T: Provider>(&self) -> Result<Arc<T>> {
        let type_name = std::any::type_name::<T>();
        trace!(target: "portico::container", "resolving {}", type_name);

        self.resolve_by_id(TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
            .ok_or_else(|| Error::ProviderNotFound(type_name.to_string()))
    }

    pub fn resolve_by_id(&self, type_id: TypeId) -> Option<Instance> {
        self.providers.read().get(&type_id).cloned()
    }

    pub fn has<T: Provider>(&self) -> bool {
        self.providers.read().contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Provider>(&self) -> bool {
        self.providers.write().remove(&TypeId::of::<T>()).is_some()
    }

    /// Run `hook` on the service of type `T` now (if registered) and on every
    /// later registration of that type.
    pub fn on<T, F>(&self, hook: F)
    where
        T: Provider,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let hook: Hook = Arc::new(move |any: &(dyn Any + Send + Sync)| {
            if let Some(service) = any.downcast_ref::<T>() {
                hook(service);
            }
        });

        self.hooks
            .write()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(hook.clone());

        if let Some(current) = self.resolve_by_id(TypeId::of::<T>()) {
            hook(current.as_ref());
        }
    }

    /// Handle that does not keep the services alive.
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            providers: Arc::downgrade(&self.providers),
            hooks: Arc::downgrade(&self.hooks),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-owning handle to a [`Container`], for services held by the
/// container they resolve from.
#[derive(Clone)]
pub struct WeakContainer {
    providers: Weak<RwLock<HashMap<TypeId, Instance>>>,
    hooks: Weak<RwLock<HashMap<TypeId, Vec<Hook>>>>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        Some(Container {
            providers: self.providers.upgrade()?,
            hooks: self.hooks.upgrade()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, PartialEq)]
    struct Greeting(String);

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.register(Greeting("hi".into()));

        let greeting = container.resolve::<Greeting>().unwrap();
        assert_eq!(greeting.0, "hi");
        assert!(container.has::<Greeting>());
    }

    #[test]
    fn test_resolve_missing() {
        let container = Container::new();
        let err = container.resolve::<Greeting>().unwrap_err();
        assert!(matches!(err, Error::ProviderNotFound(_)));
    }

    #[test]
    fn test_clones_share_services() {
        let container = Container::new();
        let handle = container.clone();
        handle.register(Greeting("shared".into()));
        assert!(container.has::<Greeting>());
        assert!(container.remove::<Greeting>());
        assert!(!handle.has::<Greeting>());
    }

    #[test]
    fn test_on_runs_for_existing_and_future_instances() {
        let container = Container::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        container.register(Greeting("first".into()));

        let sink = seen.clone();
        container.on::<Greeting, _>(move |g| sink.lock().push(g.0.clone()));
        container.register(Greeting("second".into()));

        assert_eq!(*seen.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_weak_container() {
        let container = Container::new();
        let weak = container.downgrade();
        container.register(Greeting("alive".into()));
        assert!(weak.upgrade().is_some_and(|c| c.has::<Greeting>()));

        drop(container);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_hook_may_use_container() {
        let container = Container::new();
        let inner = container.clone();
        container.on::<Greeting, _>(move |_| inner.register(42u32));
        container.register(Greeting("x".into()));
        assert_eq!(*container.resolve::<u32>().unwrap(), 42);
    }
}
