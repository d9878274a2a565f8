//! Route-handler chain.
//!
//! Turns a matched route and the live request into a handler invocation.
//! Stages run in registration order and may fill the argument bag, hand a
//! new route or request snapshot to the following stages, or finish the
//! chain with their own output. What remains after the stages is resolved
//! through the [`Controllers`] registry and invoked.

use crate::arguments::Arguments;
use crate::handler::{Controllers, HandlerOutput};
use crate::middleware::{MiddlewareChain, MiddlewareDispatcher, handler_fn};
use crate::params::DeclaredParameters;
use crate::routing::MatchedRoute;
use crate::container::WeakContainer;
use crate::{Container, Error, HttpRequest, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use portico_log::{debug, trace};
use std::sync::Arc;

/// Per-dispatch state shared by the stages of one chain run.
pub struct RouteContext {
    pub arguments: Arguments,
    container: Container,
    controllers: Option<Arc<Controllers>>,
    declared: Option<(MatchedRoute, Arc<DeclaredParameters>)>,
}

impl RouteContext {
    pub fn new(container: Container) -> Self {
        let controllers = container.resolve::<Controllers>().ok();
        Self {
            arguments: Arguments::new(),
            container,
            controllers,
            declared: None,
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn controllers(&self) -> Option<&Controllers> {
        self.controllers.as_deref()
    }

    /// Declared parameters of the route handler. Inspected again only when a
    /// stage swapped the route for a different definition.
    pub fn declared(&mut self, route: &MatchedRoute) -> Arc<DeclaredParameters> {
        if let Some((seen, declared)) = &self.declared
            && seen.same_route(route)
        {
            return declared.clone();
        }

        let declared = Arc::new(DeclaredParameters::new(
            route.handler().clone(),
            self.controllers.clone(),
        ));
        self.declared = Some((route.clone(), declared.clone()));
        declared
    }
}

/// What a stage wants to happen next.
pub enum StageOutcome {
    Continue,
    /// Continue with new snapshots.
    Replace {
        route: MatchedRoute,
        request: Option<HttpRequest>,
    },
    /// Stop the chain; `output` becomes the handler result.
    Finish {
        route: MatchedRoute,
        request: Option<HttpRequest>,
        output: HandlerOutput,
    },
}

/// One pluggable step of the chain.
#[async_trait]
pub trait RouteHandlerStage: Send + Sync {
    /// Key the stage is registered under.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(
        &self,
        ctx: &mut RouteContext,
        route: &MatchedRoute,
        request: Option<&HttpRequest>,
    ) -> Result<StageOutcome>;
}

/// Anything able to serve a matched route.
#[async_trait]
pub trait HandleRoute: Send + Sync {
    async fn handle(
        &self,
        route: MatchedRoute,
        request: Option<HttpRequest>,
    ) -> Result<HandlerOutput>;
}

/// The route handler as held by the container.
pub type SharedRouteHandler = Arc<dyn HandleRoute>;

/// Injects the live request into parameters asking for it.
pub struct RequestStage;

#[async_trait]
impl RouteHandlerStage for RequestStage {
    async fn handle(
        &self,
        ctx: &mut RouteContext,
        route: &MatchedRoute,
        request: Option<&HttpRequest>,
    ) -> Result<StageOutcome> {
        let Some(request) = request else {
            return Ok(StageOutcome::Continue);
        };

        let declared = ctx.declared(route);
        for parameter in declared.parameters().iter().filter(|p| p.wants_request()) {
            ctx.arguments.set(parameter.name.as_str(), request.clone());
        }
        Ok(StageOutcome::Continue)
    }
}

type Stages = IndexMap<String, Arc<dyn RouteHandlerStage>>;

#[derive(Clone)]
enum ContainerLink {
    Owned(Container),
    Attached(WeakContainer),
}

impl ContainerLink {
    fn upgrade(&self) -> Result<Container> {
        match self {
            ContainerLink::Owned(container) => Ok(container.clone()),
            ContainerLink::Attached(weak) => weak
                .upgrade()
                .ok_or_else(|| Error::Internal("route handler outlived its container".to_string())),
        }
    }
}

/// Extensible route handler.
#[derive(Clone)]
pub struct RouteHandler {
    stages: Arc<RwLock<Stages>>,
    container: ContainerLink,
}

impl RouteHandler {
    /// Handler with the request stage installed.
    pub fn new(container: Container) -> Self {
        Self::with_link(ContainerLink::Owned(container))
    }

    /// Handler registered inside the container it resolves services from.
    /// It holds the container weakly and fails once the container is gone.
    pub fn attached(container: &Container) -> Self {
        Self::with_link(ContainerLink::Attached(container.downgrade()))
    }

    fn with_link(container: ContainerLink) -> Self {
        let handler = Self {
            stages: Arc::new(RwLock::new(IndexMap::new())),
            container,
        };
        handler.add_handler(RequestStage);
        handler
    }

    /// Handler without any stage.
    pub fn empty(container: Container) -> Self {
        Self {
            stages: Arc::new(RwLock::new(IndexMap::new())),
            container: ContainerLink::Owned(container),
        }
    }

    /// Append a stage. A stage with the same name is replaced in place.
    pub fn add_handler(&self, stage: impl RouteHandlerStage + 'static) -> &Self {
        self.add_handler_arc(Arc::new(stage))
    }

    pub fn add_handler_arc(&self, stage: Arc<dyn RouteHandlerStage>) -> &Self {
        let name = stage.name().to_string();
        trace!(target: "portico::route_handler", "adding stage {}", name);
        self.stages.write().insert(name, stage);
        self
    }

    pub fn remove_handler(&self, name: &str) -> &Self {
        self.stages.write().shift_remove(name);
        self
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.stages.read().keys().cloned().collect()
    }

    pub fn container(&self) -> Result<Container> {
        self.container.upgrade()
    }

    /// Run the stages, then invoke the handler.
    pub async fn process(
        &self,
        route: MatchedRoute,
        request: Option<HttpRequest>,
    ) -> Result<HandlerOutput> {
        let mut ctx = RouteContext::new(self.container()?);
        ctx.arguments = route.request_parameters();
        if let Some(extra) = route.handler().extra_arguments() {
            ctx.arguments.merge(extra);
        }

        let stages: Vec<Arc<dyn RouteHandlerStage>> =
            self.stages.read().values().cloned().collect();
        let (mut route, mut request) = (route, request);

        for stage in stages {
            match stage.handle(&mut ctx, &route, request.as_ref()).await? {
                StageOutcome::Continue => {}
                StageOutcome::Replace { route: next, request: next_request } => {
                    route = next;
                    request = next_request;
                }
                StageOutcome::Finish { route, output, .. } => {
                    debug!(
                        target: "portico::route_handler",
                        "stage {} finished '{}'",
                        stage.name(),
                        route.route().uri()
                    );
                    return Ok(output);
                }
            }
        }

        invoke(ctx, &route, request.as_ref()).await
    }
}

async fn invoke(
    ctx: RouteContext,
    route: &MatchedRoute,
    request: Option<&HttpRequest>,
) -> Result<HandlerOutput> {
    let callable = route.handler().resolve(ctx.controllers()).ok_or_else(|| {
        Error::Internal(format!(
            "route handler '{}' cannot be resolved",
            route.handler().describe()
        ))
    })?;

    trace!(target: "portico::route_handler", "invoking {}", route.handler().describe());
    callable.invoke(ctx.arguments, &ctx.container, request).await
}

/// Routes without middleware are processed directly. An empty middleware
/// list counts as none, as does a missing dispatcher or request.
#[async_trait]
impl HandleRoute for RouteHandler {
    async fn handle(
        &self,
        route: MatchedRoute,
        request: Option<HttpRequest>,
    ) -> Result<HandlerOutput> {
        let dispatcher = self.container()?.resolve::<MiddlewareDispatcher>().ok();

        let (dispatcher, request) = match (dispatcher, request) {
            (Some(dispatcher), Some(request)) if !route.route().middleware().is_empty() => {
                (dispatcher, request)
            }
            (_, request) => return self.process(route, request).await,
        };

        let scoped = dispatcher.fresh();
        for middleware in route.route().middleware() {
            scoped.add_ref(middleware.clone(), None)?;
        }

        let handler = self.clone();
        let final_handler = handler_fn(move |req: HttpRequest| {
            let handler = handler.clone();
            let route = route.clone();
            async move { handler.process(route, Some(req)).await?.into_response() }
        });

        let response = scoped.handle_with(request.clone(), final_handler).await?;
        Ok(HandlerOutput::Response(response))
    }
}

/// Fixed pipeline without stages.
///
/// The live request is always passed as the `request` argument, declared or
/// not. Route middleware is resolved against the app dispatcher and wraps
/// the handler in the order the route lists it.
#[derive(Clone)]
pub struct BasicRouteHandler {
    container: ContainerLink,
}

impl BasicRouteHandler {
    pub fn new(container: Container) -> Self {
        Self {
            container: ContainerLink::Owned(container),
        }
    }

    /// See [`RouteHandler::attached`].
    pub fn attached(container: &Container) -> Self {
        Self {
            container: ContainerLink::Attached(container.downgrade()),
        }
    }

    async fn call(
        &self,
        route: MatchedRoute,
        request: Option<HttpRequest>,
    ) -> Result<HandlerOutput> {
        let mut ctx = RouteContext::new(self.container.upgrade()?);
        ctx.arguments = route.request_parameters();
        if let Some(extra) = route.handler().extra_arguments() {
            ctx.arguments.merge(extra);
        }
        if let Some(request) = &request {
            ctx.arguments.set("request", request.clone());
        }
        invoke(ctx, &route, request.as_ref()).await
    }
}

#[async_trait]
impl HandleRoute for BasicRouteHandler {
    async fn handle(
        &self,
        route: MatchedRoute,
        request: Option<HttpRequest>,
    ) -> Result<HandlerOutput> {
        let dispatcher = self.container.upgrade()?.resolve::<MiddlewareDispatcher>().ok();

        let (dispatcher, request) = match (dispatcher, request) {
            (Some(dispatcher), Some(request)) if !route.route().middleware().is_empty() => {
                (dispatcher, request)
            }
            (_, request) => return self.call(route, request).await,
        };

        let middlewares = route
            .route()
            .middleware()
            .iter()
            .map(|middleware| dispatcher.resolve(middleware).map(|(middleware, _)| middleware))
            .collect::<Result<Vec<_>>>()?;

        let handler = self.clone();
        let final_handler = handler_fn(move |req: HttpRequest| {
            let handler = handler.clone();
            let route = route.clone();
            async move { handler.call(route, Some(req)).await?.into_response() }
        });

        let response = MiddlewareChain::new(middlewares).apply(request, final_handler).await?;
        Ok(HandlerOutput::Response(response))
    }
}
