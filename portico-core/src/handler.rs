// Route handlers, controllers and handler invocation

use crate::arguments::{ArgKey, ArgValue, Arguments};
use crate::params::{DeclaredParameter, ParamType};
use crate::{Container, Error, HttpRequest, HttpResponse, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Method invoked when a handler names only a controller.
pub const DEFAULT_METHOD: &str = "invoke";

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HandlerOutput>> + Send>>;

type CallFn = Arc<dyn Fn(Call) -> HandlerFuture + Send + Sync>;

/// What a handler returns.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    Response(HttpResponse),
    Text(String),
    Json(serde_json::Value),
    Empty,
}

impl HandlerOutput {
    /// Turn the output into a response.
    pub fn into_response(self) -> Result<HttpResponse> {
        match self {
            HandlerOutput::Response(response) => Ok(response),
            HandlerOutput::Text(text) => Ok(HttpResponse::ok().with_html(text)),
            HandlerOutput::Json(value) => HttpResponse::ok().with_json(&value),
            HandlerOutput::Empty => Ok(HttpResponse::ok()),
        }
    }
}

impl From<HttpResponse> for HandlerOutput {
    fn from(response: HttpResponse) -> Self {
        HandlerOutput::Response(response)
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for HandlerOutput {
    fn from(value: serde_json::Value) -> Self {
        HandlerOutput::Json(value)
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Empty
    }
}

/// An invokable function together with its declared parameters.
#[derive(Clone)]
pub struct Callable {
    parameters: Vec<DeclaredParameter>,
    call: CallFn,
}

impl Callable {
    /// Wrap an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Call) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutput>> + Send + 'static,
    {
        Self {
            parameters: Vec::new(),
            call: Arc::new(move |call: Call| -> HandlerFuture { Box::pin(f(call)) }),
        }
    }

    /// Wrap a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Call) -> Result<HandlerOutput> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |call| {
            let f = f.clone();
            async move { f(call) }
        })
    }

    /// Declare the next formal parameter.
    pub fn param(mut self, parameter: DeclaredParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameters(&self) -> &[DeclaredParameter] {
        &self.parameters
    }

    /// Resolve the declared parameters from `arguments` and invoke.
    pub async fn invoke(
        &self,
        arguments: Arguments,
        container: &Container,
        request: Option<&HttpRequest>,
    ) -> Result<HandlerOutput> {
        let call = Call::resolve(&self.parameters, arguments, container, request)?;
        (self.call)(call).await
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Arguments resolved for one invocation.
pub struct Call {
    resolved: IndexMap<String, ArgValue>,
    arguments: Arguments,
    request: Option<HttpRequest>,
    container: Container,
}

impl Call {
    fn resolve(
        parameters: &[DeclaredParameter],
        arguments: Arguments,
        container: &Container,
        request: Option<&HttpRequest>,
    ) -> Result<Self> {
        let mut resolved = IndexMap::new();

        if parameters.is_empty() {
            for (key, value) in arguments.values() {
                if let ArgKey::Name(name) = key {
                    resolved.insert(name.clone(), value.clone());
                }
            }
        }

        for (position, parameter) in parameters.iter().enumerate() {
            let value = arguments
                .get_named(&parameter.name)
                .or_else(|| arguments.get_position(position))
                .cloned()
                .or_else(|| autowire(parameter, container, request));

            match value {
                Some(value) => {
                    resolved.insert(parameter.name.clone(), coerce(parameter, value));
                }
                None if parameter.optional => {}
                None => {
                    return Err(Error::UnresolvableParameter(format!(
                        "${} ({})",
                        parameter.name,
                        parameter.type_name().unwrap_or("untyped")
                    )));
                }
            }
        }

        Ok(Self {
            resolved,
            arguments,
            request: request.cloned(),
            container: container.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.resolved.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name).and_then(ArgValue::as_value)
    }

    /// Deserialize a resolved value.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .value(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvableParameter(name.to_string()))?;
        serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
    }

    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|v| v.downcast::<T>())
    }

    /// The request injected as an argument, or the request of the dispatch.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.resolved
            .values()
            .find_map(ArgValue::as_request)
            .or(self.request.as_ref())
    }

    /// The whole argument bag the call was resolved from.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn container(&self) -> &Container {
        &self.container
    }
}

fn autowire(
    parameter: &DeclaredParameter,
    container: &Container,
    request: Option<&HttpRequest>,
) -> Option<ArgValue> {
    match parameter.ty.as_ref()? {
        ParamType::Request => request.cloned().map(ArgValue::from),
        ParamType::Service { id, .. } => container.resolve_by_id(*id).map(ArgValue::Service),
        ParamType::Builtin(_) => None,
    }
}

fn coerce(parameter: &DeclaredParameter, value: ArgValue) -> ArgValue {
    let (Some(ParamType::Builtin(ty)), ArgValue::Value(serde_json::Value::String(raw))) =
        (&parameter.ty, &value)
    else {
        return value;
    };

    let coerced = match *ty {
        "int" => raw.parse::<i64>().ok().map(serde_json::Value::from),
        "float" => raw.parse::<f64>().ok().map(serde_json::Value::from),
        "bool" => raw.parse::<bool>().ok().map(serde_json::Value::from),
        _ => None,
    };

    coerced.map(ArgValue::Value).unwrap_or(value)
}

/// A named set of methods, the equivalent of a controller class.
pub trait Controller: Send + Sync + 'static {
    fn method(&self, name: &str) -> Option<Callable>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Controller built from a map of callables.
#[derive(Clone, Debug)]
pub struct ControllerMethods {
    name: String,
    methods: HashMap<String, Callable>,
}

impl ControllerMethods {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.methods.insert(name.into(), callable);
        self
    }
}

impl Controller for ControllerMethods {
    fn method(&self, name: &str) -> Option<Callable> {
        self.methods.get(name).cloned()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Registry resolving controller names to instances.
#[derive(Default)]
pub struct Controllers {
    controllers: RwLock<HashMap<String, Arc<dyn Controller>>>,
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, controller: impl Controller) {
        self.register_arc(name, Arc::new(controller));
    }

    pub fn register_arc(&self, name: impl Into<String>, controller: Arc<dyn Controller>) {
        self.controllers.write().insert(name.into(), controller);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Controller>> {
        self.controllers.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.controllers.read().contains_key(name)
    }
}

/// Object side of a method reference.
#[derive(Clone)]
pub enum Target {
    /// Looked up by name in [`Controllers`].
    Class(String),
    Instance(Arc<dyn Controller>),
}

impl Target {
    fn controller(&self, controllers: Option<&Controllers>) -> Option<Arc<dyn Controller>> {
        match self {
            Target::Class(name) => controllers?.get(name),
            Target::Instance(instance) => Some(instance.clone()),
        }
    }

    fn name(&self) -> String {
        match self {
            Target::Class(name) => name.clone(),
            Target::Instance(instance) => instance.name().to_string(),
        }
    }
}

/// Reference to a route handler.
#[derive(Clone, Default)]
pub enum HandlerRef {
    #[default]
    Empty,
    Closure(Callable),
    /// `[target, method]` or `[target, method, arguments]`.
    Method {
        target: Target,
        method: String,
        arguments: Option<Arguments>,
    },
    /// A target invoked through [`DEFAULT_METHOD`].
    Invokable(Target),
}

impl HandlerRef {
    /// Parse `Class::method` or a bare `Class`.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if reference.is_empty() {
            return HandlerRef::Empty;
        }

        match reference.split_once("::") {
            Some((class, method)) => HandlerRef::method(class, method),
            None => HandlerRef::Invokable(Target::Class(reference.to_string())),
        }
    }

    pub fn method(class: impl Into<String>, method: impl Into<String>) -> Self {
        HandlerRef::Method {
            target: Target::Class(class.into()),
            method: method.into(),
            arguments: None,
        }
    }

    pub fn instance(controller: impl Controller, method: impl Into<String>) -> Self {
        HandlerRef::Method {
            target: Target::Instance(Arc::new(controller)),
            method: method.into(),
            arguments: None,
        }
    }

    /// Attach extra named arguments to a method reference.
    pub fn with_arguments(self, extra: Arguments) -> Self {
        match self {
            HandlerRef::Method { target, method, .. } => HandlerRef::Method {
                target,
                method,
                arguments: Some(extra),
            },
            other => other,
        }
    }

    pub fn extra_arguments(&self) -> Option<&Arguments> {
        match self {
            HandlerRef::Method { arguments, .. } => arguments.as_ref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, HandlerRef::Empty)
    }

    /// Resolve the reference to something callable.
    pub fn resolve(&self, controllers: Option<&Controllers>) -> Option<Callable> {
        match self {
            HandlerRef::Empty => None,
            HandlerRef::Closure(callable) => Some(callable.clone()),
            HandlerRef::Method { target, method, .. } => {
                target.controller(controllers)?.method(method)
            }
            HandlerRef::Invokable(target) => target.controller(controllers)?.method(DEFAULT_METHOD),
        }
    }

    /// Human-readable form used in route listings.
    pub fn describe(&self) -> String {
        match self {
            HandlerRef::Empty => String::new(),
            HandlerRef::Closure(_) => "Closure".to_string(),
            HandlerRef::Method { target, method, .. } => format!("{}::{}", target.name(), method),
            HandlerRef::Invokable(target) => target.name(),
        }
    }
}

impl From<Callable> for HandlerRef {
    fn from(callable: Callable) -> Self {
        HandlerRef::Closure(callable)
    }
}

impl From<&str> for HandlerRef {
    fn from(reference: &str) -> Self {
        HandlerRef::parse(reference)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerRef({})", self.describe())
    }
}
