//! Routing boot: the router, the route handler and the routing middleware.

use super::http::{HttpBoot, HttpSettings, RouteHandlerKind};
use super::middleware::MiddlewareBoot;
use crate::middleware::{MethodOverride, PreRouting, Routing, priority};
use async_trait::async_trait;
use portico_core::{
    App, BasicRouteHandler, Boot, BootDescriptor, Controllers, Error, ErrorHandlers, HttpResponse,
    MiddlewareDispatcher, Phase, Result, RouteHandler, Router, SharedRouteHandler,
};
use portico_log::debug;
use serde_json::json;
use std::sync::Arc;

/// Signature key used when `http.signature_key` is not configured.
pub const DEFAULT_SIGNATURE_KEY: &str = "a-random-32-character-secret-signature-key";

fn route_not_found(e: Error) -> std::result::Result<HttpResponse, Error> {
    match e {
        Error::RouteNotFound(_) => HttpResponse::new(404).with_json(&json!({
            "status": 404,
            "message": "404 | Not Found",
        })),
        other => Err(other),
    }
}

fn invalid_signature(e: Error) -> std::result::Result<HttpResponse, Error> {
    match e {
        Error::InvalidSignature(_) => Ok(HttpResponse::forbidden().with_text("403 | Forbidden")),
        other => Err(other),
    }
}

/// Registers the [`Router`], the [`Controllers`] registry and the route
/// handler selected by `http.route_handler`. The `chain` handler is also
/// registered as a [`RouteHandler`] so stages can be added to it.
///
/// On terminate the routing middleware joins the dispatcher. When the app
/// has no dispatcher the request is routed directly.
#[derive(Default)]
pub struct RoutingBoot;

#[async_trait]
impl Boot for RoutingBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<HttpBoot>()
            .depends_on::<MiddlewareBoot>()
            .rebootable(Phase::Terminate)
    }

    fn boot(&self, app: &App) -> Result<()> {
        let settings = app.get::<HttpSettings>()?;

        let router = Arc::new(Router::new());
        let signature_key = settings.signature_key.as_deref().unwrap_or(DEFAULT_SIGNATURE_KEY);
        router.set_signature_key(signature_key);
        router.set_base_path(&settings.base_path);
        if let Some(request) = app.request() {
            router.set_origin(request.origin());
        }
        for domain in &settings.domains {
            router.add_domain(&domain.key, domain.host());
        }
        app.set_arc(router);

        if !app.has::<Controllers>() {
            app.set(Controllers::new());
        }

        let handler: SharedRouteHandler = match settings.route_handler {
            RouteHandlerKind::Chain => {
                let chain = RouteHandler::attached(app.container());
                app.set(chain.clone());
                Arc::new(chain)
            }
            RouteHandlerKind::Basic => Arc::new(BasicRouteHandler::attached(app.container())),
        };
        app.set(handler);

        let errors = app.get::<ErrorHandlers>()?;
        errors.add(route_not_found, 0).add(invalid_signature, 0);

        debug!(target: "portico::http", "router ready at {}", settings.base_path);
        Ok(())
    }

    async fn terminate(&self, app: &App) -> Result<()> {
        let router = app.get::<Router>()?;
        if let Some(request) = app.request() {
            router.set_origin(request.origin());
        }
        let handler = (*app.get::<SharedRouteHandler>()?).clone();

        if let Ok(dispatcher) = app.get::<MiddlewareDispatcher>() {
            if !dispatcher.contains("method_override") {
                dispatcher.add(Arc::new(MethodOverride), priority::METHOD_OVERRIDE);
            }
            if !dispatcher.contains("pre_routing") {
                dispatcher.add(Arc::new(PreRouting::new(router.clone())), priority::PRE_ROUTING);
            }
            if !dispatcher.contains("routing") {
                dispatcher.add(Arc::new(Routing::new(router, handler)), priority::ROUTING);
            }
            return Ok(());
        }

        let Some(request) = app.request() else {
            return Ok(());
        };
        let routed = match router.dispatch(&request) {
            Ok(matched) => handler
                .handle(matched, Some(request))
                .await
                .and_then(|out| out.into_response()),
            Err(e) => Err(e),
        };
        let response = match routed {
            Ok(response) => response,
            Err(e) => app.get::<ErrorHandlers>()?.handle_throwable(e)?,
        };
        app.get::<HttpBoot>()?.set_response(response);
        Ok(())
    }
}
