//! Application kernel.
//!
//! An [`App`] owns the service container, the directory registry and the
//! boot scheduler. It is cheap to clone; all clones share one kernel.
//! Services that need to reach back to the app hold a [`WeakApp`].

use crate::boot::{Boot, BootUnit, Booter};
use crate::container::Provider;
use crate::dirs::{Dir, Dirs};
use crate::emitter::ResponseEmitter;
use crate::{Container, Error, HttpRequest, HttpResponse, Result};
use parking_lot::RwLock;
use portico_log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Adjusts every request handed to the app.
pub type RequestFilter = Arc<dyn Fn(HttpRequest) -> HttpRequest + Send + Sync>;

struct AppInner {
    name: String,
    container: Container,
    dirs: RwLock<Dirs>,
    booter: Booter,
    environment: RwLock<String>,
    run_cycles: AtomicUsize,
    request: RwLock<Option<HttpRequest>>,
    request_filters: RwLock<Vec<RequestFilter>>,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

/// Non-owning handle to an [`App`].
#[derive(Clone)]
pub struct WeakApp {
    inner: Weak<AppInner>,
}

impl WeakApp {
    pub fn upgrade(&self) -> Option<App> {
        self.inner.upgrade().map(|inner| App { inner })
    }
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        let app = Self {
            inner: Arc::new(AppInner {
                name: name.into(),
                container: Container::new(),
                dirs: RwLock::new(Dirs::new()),
                booter: Booter::new(),
                environment: RwLock::new("production".to_string()),
                run_cycles: AtomicUsize::new(1),
                request: RwLock::new(None),
                request_filters: RwLock::new(Vec::new()),
            }),
        };
        app.container().register(app.downgrade());
        app
    }

    /// App rooted at `root`, with `config` and `views` dirs below it.
    pub fn with_root(name: impl Into<String>, root: impl Into<std::path::PathBuf>) -> Self {
        let root = root.into();
        let app = Self::new(name);
        app.dir(Dir::new(root.clone(), "root", "root", 0))
            .dir(Dir::new(root.join("config"), "config", "config", 10))
            .dir(Dir::new(root.join("views"), "views", "views", 10));
        app
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn downgrade(&self) -> WeakApp {
        WeakApp {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    pub fn get<T: Provider>(&self) -> Result<Arc<T>> {
        self.inner.container.resolve::<T>()
    }

    pub fn has<T: Provider>(&self) -> bool {
        self.inner.container.has::<T>()
    }

    pub fn set<T: Provider>(&self, service: T) -> &Self {
        self.inner.container.register(service);
        self
    }

    pub fn set_arc<T: Provider>(&self, service: Arc<T>) -> &Self {
        self.inner.container.register_arc(service);
        self
    }

    /// Run `hook` on the service of type `T`, now and whenever it is replaced.
    pub fn on<T, F>(&self, hook: F) -> &Self
    where
        T: Provider,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.container.on::<T, F>(hook);
        self
    }

    pub fn dir(&self, dir: Dir) -> &Self {
        self.inner.dirs.write().dir(dir);
        self
    }

    /// Snapshot of the registered dirs.
    pub fn dirs(&self) -> Dirs {
        self.inner.dirs.read().clone()
    }

    pub fn environment(&self) -> String {
        self.inner.environment.read().clone()
    }

    pub fn set_environment(&self, environment: impl Into<String>) -> &Self {
        *self.inner.environment.write() = environment.into();
        self
    }

    /// Number of run cycles the app goes through per request.
    pub fn run_cycles(&self) -> usize {
        self.inner.run_cycles.load(Ordering::SeqCst)
    }

    pub fn set_run_cycles(&self, cycles: usize) -> &Self {
        self.inner.run_cycles.store(cycles.max(1), Ordering::SeqCst);
        self
    }

    pub fn booter(&self) -> &Booter {
        &self.inner.booter
    }

    /// Queue a boot unit.
    pub fn boot<B: Boot>(&self, boot: B) -> &Self {
        self.boot_unit(BootUnit::new(boot))
    }

    pub fn boot_arc<B: Boot>(&self, boot: Arc<B>) -> &Self {
        self.boot_unit(BootUnit::from_arc(boot))
    }

    pub fn boot_unit(&self, unit: BootUnit) -> &Self {
        self.inner.booter.add(unit);
        self
    }

    /// The booted unit of type `B`.
    pub fn get_boot<B: Boot>(&self) -> Result<Arc<B>> {
        self.get::<B>()
    }

    pub fn is_booted<B: Boot>(&self) -> bool {
        self.inner.booter.is_booted(std::any::type_name::<B>())
    }

    /// Boot every queued unit.
    pub fn booting(&self) -> Result<()> {
        self.inner.booter.boot_all(self)
    }

    /// One run cycle: boot what is queued, then terminate.
    pub async fn run(&self) -> Result<()> {
        self.booting()?;
        self.inner.booter.terminate(self).await
    }

    pub fn request(&self) -> Option<HttpRequest> {
        self.inner.request.read().clone()
    }

    /// Set the current request, passed through the request filters.
    pub fn set_request(&self, request: HttpRequest) -> &Self {
        let filters: Vec<RequestFilter> = self.inner.request_filters.read().clone();
        let request = filters.iter().fold(request, |req, filter| filter(req));
        *self.inner.request.write() = Some(request);
        self
    }

    /// Add a request filter; it also applies to the current request.
    pub fn add_request_filter(
        &self,
        filter: impl Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static,
    ) -> &Self {
        let filter: RequestFilter = Arc::new(filter);
        self.inner.request_filters.write().push(filter.clone());

        let current = self.inner.request.write().take();
        if let Some(request) = current {
            *self.inner.request.write() = Some(filter(request));
        }
        self
    }

    /// Serve `request` through all run cycles and return the emitted response.
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(
            target: "portico::app",
            "{} handling {} {}",
            self.name(),
            request.method,
            request.path
        );
        self.set_request(request);
        for _ in 0..self.run_cycles() {
            self.run().await?;
        }

        self.get::<ResponseEmitter>()
            .ok()
            .and_then(|emitter| emitter.take())
            .ok_or_else(|| Error::Internal(format!("app '{}' emitted no response", self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Boot;
    use async_trait::async_trait;

    #[test]
    fn test_services() {
        let app = App::new("test");
        app.set(String::from("hello"));
        assert_eq!(*app.get::<String>().unwrap(), "hello");
        assert!(app.has::<WeakApp>());
        assert!(app.get::<u8>().is_err());
    }

    #[test]
    fn test_weak_app() {
        let app = App::new("test");
        let weak = app.downgrade();
        assert_eq!(weak.upgrade().map(|a| a.name().to_string()), Some("test".to_string()));
        drop(app);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_request_filters() {
        let app = App::new("test");
        app.set_request(HttpRequest::new("GET", "/"));
        app.add_request_filter(|req| req.with_host("example.com"));
        assert_eq!(app.request().unwrap().host, "example.com");

        app.set_request(HttpRequest::new("GET", "/other"));
        assert_eq!(app.request().unwrap().host, "example.com");
    }

    #[test]
    fn test_with_root_dirs() {
        let app = App::with_root("test", "/srv/app");
        let dirs = app.dirs();
        assert_eq!(dirs.get("config").unwrap().path, std::path::PathBuf::from("/srv/app/config"));
        assert_eq!(dirs.group("views").len(), 1);
    }

    struct Emit;

    #[async_trait]
    impl Boot for Emit {
        fn boot(&self, app: &App) -> Result<()> {
            app.set(ResponseEmitter::new());
            Ok(())
        }

        async fn terminate(&self, app: &App) -> Result<()> {
            let path = app.request().map(|r| r.path).unwrap_or_default();
            app.get::<ResponseEmitter>()?.emit(HttpResponse::ok().with_text(path)).await
        }
    }

    #[tokio::test]
    async fn test_handle_returns_emitted_response() {
        let app = App::new("test");
        app.boot(Emit);
        let res = app.handle(HttpRequest::new("GET", "/hello")).await.unwrap();
        assert_eq!(res.body_string(), "/hello");
    }

    #[tokio::test]
    async fn test_handle_without_emitter() {
        let app = App::new("test");
        assert!(matches!(app.handle(HttpRequest::new("GET", "/")).await, Err(Error::Internal(_))));
    }
}
