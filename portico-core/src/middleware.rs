// Middleware dispatcher

use crate::{Error, HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use portico_log::trace;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The next handler in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send>;

/// Innermost request handler of a chain
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send + Sync>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Middleware built from an async closure.
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        (self.f)(req, next).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as named middleware.
pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Middleware>
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(FnMiddleware { name: name.into(), f })
}

/// Wrap a closure as a [`HandlerFn`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> BoxFuture<Result<HttpResponse>> { Box::pin(f(req)) })
}

/// Middleware as referenced from a route or configuration.
#[derive(Clone)]
pub enum MiddlewareRef {
    Instance(Arc<dyn Middleware>),
    Alias(String),
}

impl MiddlewareRef {
    pub fn new(middleware: impl Middleware + 'static) -> Self {
        MiddlewareRef::Instance(Arc::new(middleware))
    }

    pub fn name(&self) -> &str {
        match self {
            MiddlewareRef::Instance(middleware) => middleware.name(),
            MiddlewareRef::Alias(alias) => alias,
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(alias: &str) -> Self {
        MiddlewareRef::Alias(alias.to_string())
    }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        MiddlewareRef::Instance(middleware)
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MiddlewareRef({})", self.name())
    }
}

/// Ordered snapshot of middleware executed around a handler.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.middlewares.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the chain with `handler` as the innermost step.
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse> {
        trace!(
            target: "portico::middleware",
            "executing {} middleware for {} {}",
            self.len(),
            req.method,
            req.path
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        handler: HandlerFn,
    ) -> BoxFuture<Result<HttpResponse>> {
        if index >= self.middlewares.len() {
            return handler(req);
        }

        let middleware = self.middlewares[index].clone();
        let chain = self.clone();
        Box::pin(async move {
            middleware
                .handle(req, Box::new(move |req| chain.execute_from(index + 1, req, handler)))
                .await
        })
    }
}

struct Entry {
    priority: i32,
    middleware: Arc<dyn Middleware>,
}

#[derive(Default)]
struct DispatcherState {
    stack: Vec<Entry>,
    aliases: HashMap<String, (Arc<dyn Middleware>, i32)>,
}

/// Priority-ordered middleware dispatcher.
///
/// Higher priorities run first; equal priorities keep insertion order. When
/// the stack is exhausted the fallback handler produces the response.
pub struct MiddlewareDispatcher {
    state: RwLock<DispatcherState>,
    fallback: HandlerFn,
}

impl MiddlewareDispatcher {
    pub fn new(fallback: HandlerFn) -> Self {
        Self {
            state: RwLock::new(DispatcherState::default()),
            fallback,
        }
    }

    /// Dispatcher whose fallback answers with a copy of `response`.
    pub fn with_fallback_response(response: HttpResponse) -> Self {
        Self::new(handler_fn(move |_| {
            let response = response.clone();
            async move { Ok(response) }
        }))
    }

    pub fn add(&self, middleware: Arc<dyn Middleware>, priority: i32) -> &Self {
        self.state.write().stack.push(Entry { priority, middleware });
        self
    }

    /// Add a middleware reference, resolving aliases. `priority` overrides the
    /// alias default when given.
    pub fn add_ref(&self, middleware: MiddlewareRef, priority: Option<i32>) -> Result<&Self> {
        let (middleware, default_priority) = self.resolve(&middleware)?;
        Ok(self.add(middleware, priority.unwrap_or(default_priority)))
    }

    /// The middleware behind `middleware` and its default priority.
    pub fn resolve(&self, middleware: &MiddlewareRef) -> Result<(Arc<dyn Middleware>, i32)> {
        match middleware {
            MiddlewareRef::Instance(middleware) => Ok((middleware.clone(), 0)),
            MiddlewareRef::Alias(alias) => self
                .state
                .read()
                .aliases
                .get(alias)
                .cloned()
                .ok_or_else(|| Error::Config(format!("unknown middleware alias '{}'", alias))),
        }
    }

    /// Register `middleware` under `alias` with a default priority.
    pub fn alias(
        &self,
        alias: impl Into<String>,
        middleware: Arc<dyn Middleware>,
        priority: i32,
    ) -> &Self {
        self.state.write().aliases.insert(alias.into(), (middleware, priority));
        self
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.state.read().aliases.contains_key(alias)
    }

    /// Whether a middleware with the given name is on the stack.
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().stack.iter().any(|e| e.middleware.name() == name)
    }

    /// An empty dispatcher sharing aliases and fallback with this one.
    pub fn fresh(&self) -> Self {
        let aliases = self.state.read().aliases.clone();
        Self {
            state: RwLock::new(DispatcherState {
                stack: Vec::new(),
                aliases,
            }),
            fallback: self.fallback.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stack in execution order.
    pub fn chain(&self) -> MiddlewareChain {
        let state = self.state.read();
        let mut ordered: Vec<&Entry> = state.stack.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        MiddlewareChain::new(ordered.into_iter().map(|e| e.middleware.clone()).collect())
    }

    pub async fn handle(&self, req: HttpRequest) -> Result<HttpResponse> {
        self.chain().apply(req, self.fallback.clone()).await
    }

    pub async fn handle_with(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse> {
        self.chain().apply(req, handler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        from_fn(name, move |req, next: Next| {
            let log = log.clone();
            async move {
                log.lock().push(name.to_string());
                next(req).await
            }
        })
    }

    #[tokio::test]
    async fn test_descending_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());

        dispatcher.add(recorder("low", log.clone()), 100);
        dispatcher.add(recorder("high", log.clone()), 5000);
        dispatcher.add(recorder("mid-a", log.clone()), 1000);
        dispatcher.add(recorder("mid-b", log.clone()), 1000);

        let res = dispatcher.handle(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(*log.lock(), vec!["high", "mid-a", "mid-b", "low"]);
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());
        dispatcher.add(
            from_fn("deny", |_req, _next: Next| async { Ok(HttpResponse::forbidden()) }),
            0,
        );
        let res = dispatcher.handle(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn test_aliases_and_fresh_dispatcher() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());
        dispatcher.alias("audit", recorder("audit", log.clone()), 10);
        dispatcher.add(recorder("global", log.clone()), 0);

        let fresh = dispatcher.fresh();
        assert!(fresh.is_empty());
        assert!(fresh.has_alias("audit"));
        fresh.add_ref("audit".into(), None).unwrap();

        let handler = handler_fn(|_req| async { Ok(HttpResponse::ok().with_text("inner")) });
        let res = fresh.handle_with(HttpRequest::new("GET", "/"), handler).await.unwrap();
        assert_eq!(res.body_string(), "inner");
        assert_eq!(*log.lock(), vec!["audit"]);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_unknown_alias() {
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());
        assert!(matches!(dispatcher.add_ref("nope".into(), None), Err(Error::Config(_))));
    }

    #[test]
    fn test_contains_by_name() {
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());
        dispatcher.add(from_fn("routing", |req, next: Next| next(req)), 1000);
        assert!(dispatcher.contains("routing"));
        assert!(!dispatcher.contains("session"));
    }
}
