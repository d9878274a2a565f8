// Routes, route matching and url generation

use crate::arguments::Arguments;
use crate::handler::HandlerRef;
use crate::middleware::MiddlewareRef;
use crate::url::{EXPIRES_PARAM, SIGNATURE_PARAM, Url, UrlSigner, join_url};
use crate::{Error, HttpRequest, Result};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use portico_log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPattern {
    Any,
    Methods(Vec<String>),
}

impl MethodPattern {
    /// Parse `*`, `GET` or `GET|POST`.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            return MethodPattern::Any;
        }
        MethodPattern::Methods(
            pattern
                .split('|')
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, method: &str) -> bool {
        match self {
            MethodPattern::Any => true,
            MethodPattern::Methods(methods) => methods.iter().any(|m| {
                m.eq_ignore_ascii_case(method)
                    || (m == "GET" && method.eq_ignore_ascii_case("HEAD"))
            }),
        }
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodPattern::Any => f.write_str("*"),
            MethodPattern::Methods(methods) => f.write_str(&methods.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, optional: bool, wildcard: bool },
}

fn parse_pattern(uri: &str) -> Vec<Segment> {
    uri.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(inner) => {
                let (optional, inner) = match inner.strip_prefix('?') {
                    Some(rest) => (true, rest),
                    None => (false, inner),
                };
                let (wildcard, name) = match inner.strip_suffix('*') {
                    Some(rest) => (true, rest),
                    None => (false, inner),
                };
                Segment::Param {
                    name: name.to_string(),
                    optional,
                    wildcard,
                }
            }
            None => Segment::Literal(segment.to_string()),
        })
        .collect()
}

fn satisfies(constraints: &HashMap<String, String>, name: &str, value: &str) -> bool {
    let Some(pattern) = constraints.get(name) else {
        return true;
    };
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            warn!(target: "portico::router", "invalid constraint for {}: {}", name, e);
            false
        }
    }
}

fn match_segments(
    segments: &[Segment],
    path: &str,
    constraints: &HashMap<String, String>,
) -> Option<IndexMap<String, String>> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let mut params = IndexMap::new();

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(literal) => {
                if parts.get(i) != Some(&literal.as_str()) {
                    return None;
                }
            }
            Segment::Param { name, optional, wildcard: true } => {
                let rest = parts.get(i..).map(|p| p.join("/")).unwrap_or_default();
                if rest.is_empty() && !optional {
                    return None;
                }
                let rest = decode(&rest);
                if !rest.is_empty() && !satisfies(constraints, name, &rest) {
                    return None;
                }
                params.insert(name.clone(), rest);
                return Some(params);
            }
            Segment::Param { name, optional, .. } => match parts.get(i) {
                Some(value) => {
                    let value = decode(value);
                    if !satisfies(constraints, name, &value) {
                        return None;
                    }
                    params.insert(name.clone(), value);
                }
                None if *optional => {}
                None => return None,
            },
        }
    }

    (parts.len() <= segments.len()).then_some(params)
}

fn build_path(segments: &[Segment], params: &HashMap<String, String>) -> Result<String> {
    let mut parts = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Literal(literal) => parts.push(literal.clone()),
            Segment::Param { name, optional, wildcard } => match params.get(name) {
                Some(value) if *wildcard => parts.push(value.trim_matches('/').to_string()),
                Some(value) => parts.push(urlencoding::encode(value).into_owned()),
                None if *optional => break,
                None => return Err(Error::Url(format!("missing route parameter '{}'", name))),
            },
        }
    }
    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join("/"))
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    method: MethodPattern,
    uri: String,
    segments: Vec<Segment>,
    handler: HandlerRef,
    name: Option<String>,
    domain: Option<String>,
    constraints: HashMap<String, String>,
    parameters: IndexMap<String, serde_json::Value>,
    request_parameters: Arguments,
    middleware: Vec<MiddlewareRef>,
    signed: bool,
    translations: IndexMap<String, String>,
}

impl Route {
    pub fn new(method: &str, uri: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        let uri = uri.into().trim_matches('/').to_string();
        Self {
            method: MethodPattern::parse(method),
            segments: parse_pattern(&uri),
            uri,
            handler: handler.into(),
            name: None,
            domain: None,
            constraints: HashMap::new(),
            parameters: IndexMap::new(),
            request_parameters: Arguments::new(),
            middleware: Vec::new(),
            signed: false,
            translations: IndexMap::new(),
        }
    }

    pub fn method(&self) -> &MethodPattern {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    pub fn parameters(&self) -> &IndexMap<String, serde_json::Value> {
        &self.parameters
    }

    pub fn request_parameters(&self) -> &Arguments {
        &self.request_parameters
    }

    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn translations(&self) -> &IndexMap<String, String> {
        &self.translations
    }

    fn signature_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uri)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

/// A route bound to the values of one request.
#[derive(Clone)]
pub struct MatchedRoute {
    route: Arc<Route>,
    params: IndexMap<String, String>,
    overrides: IndexMap<String, serde_json::Value>,
}

impl MatchedRoute {
    pub fn new(route: Route, params: IndexMap<String, String>) -> Self {
        Self {
            route: Arc::new(route),
            params,
            overrides: IndexMap::new(),
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn name(&self) -> Option<&str> {
        self.route.name()
    }

    pub fn handler(&self) -> &HandlerRef {
        self.route.handler()
    }

    /// Bound uri parameters.
    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.overrides.get(key).or_else(|| self.route.parameter(key))
    }

    /// Snapshot with `key` set to `value`.
    pub fn with_parameter(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        let mut next = self.clone();
        next.overrides.insert(key.into(), value.into());
        next
    }

    /// Snapshot of this match using another handler.
    pub fn with_handler(&self, handler: impl Into<HandlerRef>) -> Self {
        let mut route = (*self.route).clone();
        route.handler = handler.into();
        Self {
            route: Arc::new(route),
            params: self.params.clone(),
            overrides: self.overrides.clone(),
        }
    }

    /// Whether both snapshots share the same route definition.
    pub fn same_route(&self, other: &MatchedRoute) -> bool {
        Arc::ptr_eq(&self.route, &other.route)
    }

    /// Route request parameters followed by the bound uri parameters.
    pub fn request_parameters(&self) -> Arguments {
        let mut arguments = self.route.request_parameters.clone();
        for (name, value) in &self.params {
            arguments.set(name.as_str(), value.as_str());
        }
        arguments
    }
}

impl fmt::Debug for MatchedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchedRoute")
            .field("route", &self.route)
            .field("params", &self.params)
            .finish()
    }
}

struct RouterState {
    routes: Vec<Route>,
    base_path: String,
    origin: Option<String>,
    matched: Option<MatchedRoute>,
    domains: IndexMap<String, String>,
}

impl RouterState {
    /// Host of a route domain, which may be a registered domain key.
    fn host_of<'a>(&'a self, domain: &'a str) -> &'a str {
        self.domains.get(domain).map(String::as_str).unwrap_or(domain)
    }
}

/// Route registry and dispatcher.
pub struct Router {
    state: RwLock<RouterState>,
    signer: RwLock<Option<Arc<UrlSigner>>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RouterState {
                routes: Vec::new(),
                base_path: "/".to_string(),
                origin: None,
                matched: None,
                domains: IndexMap::new(),
            }),
            signer: RwLock::new(None),
        }
    }

    pub fn set_signature_key(&self, key: impl AsRef<[u8]>) {
        *self.signer.write() = Some(Arc::new(UrlSigner::new(key)));
    }

    /// Set the path prefix all routes live under, e.g. `/private/`.
    pub fn set_base_path(&self, base_path: &str) {
        let trimmed = base_path.trim_matches('/');
        self.state.write().base_path = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };
    }

    pub fn base_path(&self) -> String {
        self.state.read().base_path.clone()
    }

    /// Set the `scheme://host` generated urls start with.
    pub fn set_origin(&self, origin: impl Into<String>) {
        self.state.write().origin = Some(origin.into());
    }

    pub fn origin(&self) -> String {
        self.state
            .read()
            .origin
            .clone()
            .unwrap_or_else(|| "http://localhost".to_string())
    }

    /// Register `host` under `key` so routes can bind to the key.
    pub fn add_domain(&self, key: impl Into<String>, host: impl Into<String>) {
        self.state
            .write()
            .domains
            .insert(key.into().to_ascii_lowercase(), host.into().to_ascii_lowercase());
    }

    /// Registered domain keys and their hosts.
    pub fn domains(&self) -> IndexMap<String, String> {
        self.state.read().domains.clone()
    }

    /// Register a route and return a handle to configure it.
    pub fn add(self: &Arc<Self>, route: Route) -> RouteHandle {
        let mut state = self.state.write();
        state.routes.push(route);
        RouteHandle {
            router: self.clone(),
            index: state.routes.len() - 1,
        }
    }

    pub fn route(
        self: &Arc<Self>,
        method: &str,
        uri: &str,
        handler: impl Into<HandlerRef>,
    ) -> RouteHandle {
        self.add(Route::new(method, uri, handler))
    }

    pub fn get(self: &Arc<Self>, uri: &str, handler: impl Into<HandlerRef>) -> RouteHandle {
        self.route("GET", uri, handler)
    }

    pub fn post(self: &Arc<Self>, uri: &str, handler: impl Into<HandlerRef>) -> RouteHandle {
        self.route("POST", uri, handler)
    }

    /// Register routes sharing a uri prefix.
    pub fn group(self: &Arc<Self>, prefix: &str, routes: impl FnOnce(&RouteGroup)) -> GroupHandle {
        let group = RouteGroup {
            router: self.clone(),
            prefix: prefix.trim_matches('/').to_string(),
            indexes: Mutex::new(Vec::new()),
        };
        routes(&group);
        GroupHandle {
            router: self.clone(),
            indexes: group.indexes.into_inner(),
        }
    }

    pub fn routes(&self) -> Vec<Route> {
        self.state.read().routes.clone()
    }

    pub fn get_route(&self, name: &str) -> Option<Route> {
        self.state
            .read()
            .routes
            .iter()
            .find(|r| r.name() == Some(name))
            .cloned()
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.get_route(name).is_some()
    }

    /// The route matched by the last dispatch.
    pub fn matched_route(&self) -> Option<MatchedRoute> {
        self.state.read().matched.clone()
    }

    /// Match `request` against the registered routes in registration order.
    pub fn dispatch(&self, request: &HttpRequest) -> Result<MatchedRoute> {
        let mut state = self.state.write();
        state.origin = Some(request.origin());

        let not_found = || Error::RouteNotFound(format!("{} {}", request.method, request.path));
        let path = strip_base_path(&state.base_path, &request.path).ok_or_else(not_found)?;

        let found = state.routes.iter().find_map(|route| {
            if !route.method.matches(&request.method) {
                return None;
            }
            if let Some(domain) = &route.domain
                && !state.host_of(domain).eq_ignore_ascii_case(&request.host)
            {
                return None;
            }
            match_segments(&route.segments, &path, &route.constraints)
                .map(|params| (route.clone(), params))
        });

        let Some((route, params)) = found else {
            debug!(target: "portico::router", "no route for {} {}", request.method, request.path);
            return Err(not_found());
        };

        if route.signed {
            self.verify_signature(&route, &path, request)?;
        }

        debug!(
            target: "portico::router",
            "matched {} {} to '{}'",
            request.method,
            request.path,
            route.uri
        );
        let matched = MatchedRoute::new(route, params);
        state.matched = Some(matched.clone());
        Ok(matched)
    }

    fn verify_signature(&self, route: &Route, path: &str, request: &HttpRequest) -> Result<()> {
        let signer = self
            .signer
            .read()
            .clone()
            .ok_or_else(|| Error::InvalidSignature("no signature key configured".to_string()))?;

        let signature = request
            .query(SIGNATURE_PARAM)
            .ok_or_else(|| {
                Error::InvalidSignature(format!("missing signature for '{}'", route.uri))
            })?;

        let expires = match request.query(EXPIRES_PARAM) {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| Error::InvalidSignature("malformed expiry".to_string()))?,
            ),
            None => None,
        };

        signer.verify(route.signature_name(), path, expires, signature)
    }

    /// Generate the url of the named route.
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<Url> {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let state = self.state.read();
        let route = state
            .routes
            .iter()
            .find(|r| r.name() == Some(name))
            .ok_or_else(|| Error::Url(format!("route '{}' not found", name)))?;

        let origin = state.origin.clone().unwrap_or_else(|| "http://localhost".to_string());
        let base = match &route.domain {
            Some(domain) => format!("{}://{}", scheme_of(&origin), state.host_of(domain)),
            None => format!("{}{}", origin, state.base_path),
        };

        let path = build_path(&route.segments, &params)?;

        let mut translated = IndexMap::new();
        for (locale, uri) in &route.translations {
            let localized = build_path(&parse_pattern(uri), &params)?;
            translated.insert(locale.clone(), join_url(&base, &localized));
        }

        let mut domained = IndexMap::new();
        if let Some(domain) = &route.domain {
            domained.insert(state.host_of(domain).to_string(), join_url(&base, &path));
        }

        Ok(Url::new(route.signature_name(), base, path)
            .with_signer(self.signer.read().clone())
            .with_translated(translated)
            .with_domained(domained))
    }

    fn edit(&self, index: usize, f: impl FnOnce(&mut Route)) {
        if let Some(route) = self.state.write().routes.get_mut(index) {
            f(route);
        }
    }
}

fn scheme_of(origin: &str) -> &str {
    origin.split_once("://").map(|(scheme, _)| scheme).unwrap_or("http")
}

fn strip_base_path(base_path: &str, path: &str) -> Option<String> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(path.trim_matches('/').to_string());
    }
    if path == base {
        return Some(String::new());
    }
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| rest.trim_matches('/').to_string())
}

/// Handle to a registered route.
#[derive(Clone)]
pub struct RouteHandle {
    router: Arc<Router>,
    index: usize,
}

impl RouteHandle {
    pub fn name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.router.edit(self.index, |r| r.name = Some(name));
        self
    }

    /// Bind the route to a host.
    pub fn domain(self, domain: impl Into<String>) -> Self {
        let domain = domain.into().to_ascii_lowercase();
        self.router.edit(self.index, |r| r.domain = Some(domain));
        self
    }

    /// Constrain a uri parameter by regular expression.
    pub fn constraint(self, param: impl Into<String>, pattern: impl Into<String>) -> Self {
        let (param, pattern) = (param.into(), pattern.into());
        self.router.edit(self.index, |r| {
            r.constraints.insert(param, pattern);
        });
        self
    }

    pub fn parameter(self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.router.edit(self.index, |r| {
            r.parameters.insert(key, value);
        });
        self
    }

    /// Seed an argument for the handler.
    pub fn request_parameter(
        self,
        key: impl Into<crate::ArgKey>,
        value: impl Into<crate::ArgValue>,
    ) -> Self {
        let (key, value) = (key.into(), value.into());
        self.router.edit(self.index, |r| {
            r.request_parameters.set(key, value);
        });
        self
    }

    pub fn middleware(self, middleware: Vec<MiddlewareRef>) -> Self {
        self.router.edit(self.index, |r| r.middleware.extend(middleware));
        self
    }

    pub fn signed(self, signed: bool) -> Self {
        self.router.edit(self.index, |r| r.signed = signed);
        self
    }

    /// Uri used for `locale` in translated urls.
    pub fn translate(self, locale: impl Into<String>, uri: impl Into<String>) -> Self {
        let (locale, uri) = (locale.into(), uri.into());
        self.router.edit(self.index, |r| {
            r.translations.insert(locale, uri.trim_matches('/').to_string());
        });
        self
    }

    /// Current state of the route.
    pub fn route(&self) -> Option<Route> {
        self.router.state.read().routes.get(self.index).cloned()
    }
}

/// Routes registered under a common prefix.
pub struct RouteGroup {
    router: Arc<Router>,
    prefix: String,
    indexes: Mutex<Vec<usize>>,
}

impl RouteGroup {
    fn apply_prefix(&self, uri: &str) -> String {
        let uri = uri.trim_matches('/');
        match (self.prefix.is_empty(), uri.is_empty()) {
            (true, _) => uri.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, uri),
        }
    }

    pub fn route(&self, method: &str, uri: &str, handler: impl Into<HandlerRef>) -> RouteHandle {
        let handle = self.router.route(method, &self.apply_prefix(uri), handler);
        self.indexes.lock().push(handle.index);
        handle
    }

    pub fn get(&self, uri: &str, handler: impl Into<HandlerRef>) -> RouteHandle {
        self.route("GET", uri, handler)
    }

    pub fn post(&self, uri: &str, handler: impl Into<HandlerRef>) -> RouteHandle {
        self.route("POST", uri, handler)
    }

    /// Nested group; its routes also belong to this group.
    pub fn group(&self, prefix: &str, routes: impl FnOnce(&RouteGroup)) {
        let nested = RouteGroup {
            router: self.router.clone(),
            prefix: self.apply_prefix(prefix),
            indexes: Mutex::new(Vec::new()),
        };
        routes(&nested);
        self.indexes.lock().extend(nested.indexes.into_inner());
    }
}

/// Applies settings to every route of a group.
pub struct GroupHandle {
    router: Arc<Router>,
    indexes: Vec<usize>,
}

impl GroupHandle {
    pub fn middleware(self, middleware: Vec<MiddlewareRef>) -> Self {
        for &index in &self.indexes {
            let middleware = middleware.clone();
            self.router.edit(index, |r| r.middleware.extend(middleware));
        }
        self
    }

    pub fn domain(self, domain: &str) -> Self {
        for &index in &self.indexes {
            self.router.edit(index, |r| r.domain = Some(domain.to_ascii_lowercase()));
        }
        self
    }

    pub fn parameter(self, key: &str, value: serde_json::Value) -> Self {
        for &index in &self.indexes {
            let value = value.clone();
            self.router.edit(index, |r| {
                r.parameters.insert(key.to_string(), value);
            });
        }
        self
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
