//! Boot units and the boot scheduler.
//!
//! A boot unit wires services into an [`App`]. Every unit describes itself
//! with a [`BootDescriptor`] naming the units it depends on; the [`Booter`]
//! boots dependencies first and every unit at most once. Terminate runs in
//! reverse boot order, once per unit unless the unit declares the phase
//! rebootable, in which case it runs on every run cycle.

use crate::{App, Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use portico_log::{debug, trace};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a boot unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Boot,
    Terminate,
}

type Factory = Arc<dyn Fn() -> BootUnit + Send + Sync>;

/// A dependency on another boot unit, created on demand when not queued.
#[derive(Clone)]
pub struct BootDependency {
    pub id: String,
    factory: Factory,
}

impl BootDependency {
    pub fn of<B: Boot + Default>() -> Self {
        Self {
            id: std::any::type_name::<B>().to_string(),
            factory: Arc::new(|| BootUnit::new(B::default())),
        }
    }

    pub fn create(&self) -> BootUnit {
        (self.factory)()
    }
}

impl fmt::Debug for BootDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BootDependency").field(&self.id).finish()
    }
}

/// Metadata a boot unit supplies about itself.
#[derive(Debug, Clone)]
pub struct BootDescriptor {
    pub id: String,
    pub dependencies: Vec<BootDependency>,
    pub rebootable: Vec<Phase>,
}

impl BootDescriptor {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: std::any::type_name::<T>().to_string(),
            dependencies: Vec::new(),
            rebootable: Vec::new(),
        }
    }

    pub fn depends_on<B: Boot + Default>(mut self) -> Self {
        self.dependencies.push(BootDependency::of::<B>());
        self
    }

    pub fn rebootable(mut self, phase: Phase) -> Self {
        if !self.rebootable.contains(&phase) {
            self.rebootable.push(phase);
        }
        self
    }

    pub fn is_rebootable(&self, phase: Phase) -> bool {
        self.rebootable.contains(&phase)
    }
}

#[async_trait]
pub trait Boot: Send + Sync + 'static {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
    }

    fn boot(&self, _app: &App) -> Result<()> {
        Ok(())
    }

    async fn terminate(&self, _app: &App) -> Result<()> {
        Ok(())
    }
}

/// A boot unit together with its concrete type, so a booted unit can be
/// registered in the container and resolved as itself.
#[derive(Clone)]
pub struct BootUnit {
    type_id: TypeId,
    boot: Arc<dyn Boot>,
    instance: Arc<dyn Any + Send + Sync>,
}

impl BootUnit {
    pub fn new<B: Boot>(boot: B) -> Self {
        Self::from_arc(Arc::new(boot))
    }

    pub fn from_arc<B: Boot>(boot: Arc<B>) -> Self {
        Self {
            type_id: TypeId::of::<B>(),
            boot: boot.clone(),
            instance: boot,
        }
    }

    pub fn id(&self) -> String {
        self.boot.descriptor().id
    }

    pub fn boot(&self) -> &Arc<dyn Boot> {
        &self.boot
    }
}

impl fmt::Debug for BootUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BootUnit").field(&self.id()).finish()
    }
}

/// Dependency-ordered boot scheduler.
#[derive(Default)]
pub struct Booter {
    queue: Mutex<Vec<BootUnit>>,
    booted: Mutex<IndexMap<String, BootUnit>>,
    terminated: Mutex<HashSet<String>>,
}

impl Booter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a unit. Units already queued or booted are ignored.
    pub fn add(&self, unit: BootUnit) {
        let id = unit.id();
        if self.is_booted(&id) {
            return;
        }
        let mut queue = self.queue.lock();
        if !queue.iter().any(|u| u.id() == id) {
            trace!(target: "portico::boot", "queued {}", id);
            queue.push(unit);
        }
    }

    pub fn is_booted(&self, id: &str) -> bool {
        self.booted.lock().contains_key(id)
    }

    pub fn is_queued(&self, id: &str) -> bool {
        self.queue.lock().iter().any(|u| u.id() == id)
    }

    /// Ids of the booted units in boot order.
    pub fn booted_ids(&self) -> Vec<String> {
        self.booted.lock().keys().cloned().collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Boot every queued unit, dependencies first.
    pub fn boot_all(&self, app: &App) -> Result<()> {
        loop {
            let next = {
                let mut queue = self.queue.lock();
                if queue.is_empty() {
                    break;
                }
                queue.remove(0)
            };
            self.boot_unit(app, next, &mut Vec::new())?;
        }
        Ok(())
    }

    fn take_queued(&self, id: &str) -> Option<BootUnit> {
        let mut queue = self.queue.lock();
        let index = queue.iter().position(|u| u.id() == id)?;
        Some(queue.remove(index))
    }

    fn boot_unit(&self, app: &App, unit: BootUnit, stack: &mut Vec<String>) -> Result<()> {
        let descriptor = unit.boot.descriptor();
        let id = descriptor.id.clone();

        if self.is_booted(&id) {
            return Ok(());
        }
        if stack.contains(&id) {
            stack.push(id);
            return Err(Error::CircularBoot(stack.join(" -> ")));
        }

        stack.push(id.clone());
        for dependency in &descriptor.dependencies {
            if self.is_booted(&dependency.id) {
                continue;
            }
            let unit = self.take_queued(&dependency.id).unwrap_or_else(|| dependency.create());
            self.boot_unit(app, unit, stack)?;
        }
        stack.pop();

        // A dependency may have booted this unit through another path.
        if self.is_booted(&id) {
            return Ok(());
        }

        debug!(target: "portico::boot", "booting {}", id);
        app.container().register_by_id(unit.type_id, unit.instance.clone());
        unit.boot.boot(app).map_err(|e| match e {
            Error::CircularBoot(_) | Error::Boot(_) => e,
            other => Error::Boot(format!("{}: {}", id, other)),
        })?;
        self.booted.lock().insert(id, unit);
        Ok(())
    }

    /// Terminate booted units in reverse boot order.
    pub async fn terminate(&self, app: &App) -> Result<()> {
        let units: Vec<BootUnit> = self.booted.lock().values().rev().cloned().collect();

        for unit in units {
            let descriptor = unit.boot.descriptor();
            let first = self.terminated.lock().insert(descriptor.id.clone());
            if !first && !descriptor.is_rebootable(Phase::Terminate) {
                continue;
            }
            trace!(target: "portico::boot", "terminating {}", descriptor.id);
            unit.boot.terminate(app).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    #[derive(Default)]
    struct Base;

    impl Boot for Base {
        fn boot(&self, _app: &App) -> Result<()> {
            ORDER.lock().push("base");
            Ok(())
        }
    }

    #[derive(Default)]
    struct Feature;

    impl Boot for Feature {
        fn descriptor(&self) -> BootDescriptor {
            BootDescriptor::of::<Self>().depends_on::<Base>()
        }

        fn boot(&self, app: &App) -> Result<()> {
            assert!(app.has::<Base>());
            ORDER.lock().push("feature");
            Ok(())
        }
    }

    #[test]
    fn test_dependencies_boot_first_and_once() {
        ORDER.lock().clear();
        let app = App::new("test");
        app.boot(Feature).boot(Base);
        app.booting().unwrap();
        app.booting().unwrap();

        assert_eq!(*ORDER.lock(), vec!["base", "feature"]);
        assert!(app.has::<Feature>());
        assert_eq!(app.booter().booted_ids().len(), 2);
    }

    #[derive(Default)]
    struct Ping;

    #[derive(Default)]
    struct Pong;

    impl Boot for Ping {
        fn descriptor(&self) -> BootDescriptor {
            BootDescriptor::of::<Self>().depends_on::<Pong>()
        }
    }

    impl Boot for Pong {
        fn descriptor(&self) -> BootDescriptor {
            BootDescriptor::of::<Self>().depends_on::<Ping>()
        }
    }

    #[test]
    fn test_circular_dependencies() {
        let app = App::new("test");
        app.boot(Ping);
        let err = app.booting().unwrap_err();
        assert!(matches!(
            err,
            Error::CircularBoot(ref chain) if chain.contains("Ping") && chain.contains("Pong")
        ));
    }

    #[derive(Default)]
    struct Counter {
        once: AtomicUsize,
    }

    struct Cyclic(Arc<AtomicUsize>);

    #[async_trait]
    impl Boot for Counter {
        async fn terminate(&self, _app: &App) -> Result<()> {
            self.once.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Boot for Cyclic {
        fn descriptor(&self) -> BootDescriptor {
            BootDescriptor::of::<Self>().rebootable(Phase::Terminate)
        }

        async fn terminate(&self, _app: &App) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rebootable_terminate_runs_every_cycle() {
        let cycles = Arc::new(AtomicUsize::new(0));
        let app = App::new("test");
        app.boot(Counter::default()).boot(Cyclic(cycles.clone()));

        app.run().await.unwrap();
        app.run().await.unwrap();
        app.run().await.unwrap();

        assert_eq!(cycles.load(Ordering::SeqCst), 3);
        assert_eq!(app.get::<Counter>().unwrap().once.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct Failing;

    impl Boot for Failing {
        fn boot(&self, _app: &App) -> Result<()> {
            Err(Error::Config("missing key".into()))
        }
    }

    #[test]
    fn test_boot_errors_name_the_unit() {
        let app = App::new("test");
        app.boot(Failing);
        let err = app.booting().unwrap_err();
        assert!(matches!(
            err,
            Error::Boot(ref msg) if msg.contains("Failing") && msg.contains("missing key")
        ));
    }
}
