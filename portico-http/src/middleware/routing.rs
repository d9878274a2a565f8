use super::pre_routing::PreRouted;
use async_trait::async_trait;
use portico_core::{HttpRequest, HttpResponse, Middleware, Next, Result, Router, SharedRouteHandler};
use std::sync::Arc;

/// Ends the middleware stack by serving the matched route.
///
/// Uses the match left by [`PreRouting`](super::PreRouting) when there is
/// one. Route parameters become request attributes before the route handler
/// runs. Middleware of lower priority never run.
pub struct Routing {
    router: Arc<Router>,
    handler: SharedRouteHandler,
}

impl Routing {
    pub fn new(router: Arc<Router>, handler: SharedRouteHandler) -> Self {
        Self { router, handler }
    }
}

#[async_trait]
impl Middleware for Routing {
    async fn handle(&self, mut req: HttpRequest, _next: Next) -> Result<HttpResponse> {
        let matched = match req.extensions.remove::<PreRouted>() {
            Some(PreRouted(matched)) => matched,
            None => self.router.dispatch(&req)?,
        };

        for (name, value) in matched.params() {
            req.path_params.insert(name.clone(), value.clone());
            req.attributes.insert(name.clone(), value.clone().into());
        }
        for (key, value) in matched.route().parameters() {
            req.attributes.entry(key.clone()).or_insert_with(|| value.clone());
        }

        self.handler.handle(matched, Some(req)).await?.into_response()
    }

    fn name(&self) -> &str {
        "routing"
    }
}
