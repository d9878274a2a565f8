use async_trait::async_trait;
use portico_core::{HttpRequest, HttpResponse, MatchedRoute, Middleware, Next, Result, Router};
use portico_log::trace;
use std::sync::Arc;

/// The route matched by [`PreRouting`], carried in the request extensions.
#[derive(Debug, Clone)]
pub struct PreRouted(pub MatchedRoute);

/// Matches the route before the inner middleware runs, so they can inspect
/// it. A request no route matches passes through; [`Routing`](super::Routing)
/// reports it.
pub struct PreRouting {
    router: Arc<Router>,
}

impl PreRouting {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Middleware for PreRouting {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        match self.router.dispatch(&req) {
            Ok(matched) => {
                req.extensions.insert(PreRouted(matched));
            }
            Err(e) => trace!(target: "portico::http", "pre-routing skipped: {}", e),
        }
        next(req).await
    }

    fn name(&self) -> &str {
        "pre_routing"
    }
}
