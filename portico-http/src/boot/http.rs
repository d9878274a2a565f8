//! HTTP boot: configuration, host filtering and response emission.

use crate::install::install_config;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use portico_config::{ConfigBoot, ConfigExt, ConfigManager};
use portico_core::{
    App, Boot, BootDescriptor, ErrorHandlers, HttpRequest, HttpResponse, Phase, ResponseEmitter,
    Result,
};
use portico_log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Which route handler serves matched routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteHandlerKind {
    /// Extensible stage chain.
    #[default]
    Chain,
    /// Fixed pipeline without stages.
    Basic,
}

/// A `[[domains]]` entry of `http.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    pub key: String,
    pub domain: String,
    pub uri: Option<String>,
}

impl DomainSettings {
    /// The host routes bound to this domain match, taken from `uri` when
    /// `domain` is empty.
    pub fn host(&self) -> String {
        if !self.domain.is_empty() {
            return self.domain.to_ascii_lowercase();
        }
        let uri = self.uri.as_deref().unwrap_or_default();
        HttpRequest::from_uri("GET", uri).host
    }
}

/// The `http` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub signature_key: Option<String>,
    pub base_path: String,
    pub route_handler: RouteHandlerKind,
    pub domains: Vec<DomainSettings>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: None,
            hosts: None,
            signature_key: None,
            base_path: "/".to_string(),
            route_handler: RouteHandlerKind::Chain,
            domains: Vec::new(),
        }
    }
}

impl HttpSettings {
    /// Read the `http` section. A missing section yields the defaults.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        if !config.has("http") {
            return Ok(Self::default());
        }
        Ok(config.get::<Self>("http")?)
    }

    /// The allow-listed hosts followed by the configured domains.
    pub fn allowed_hosts(&self) -> Vec<String> {
        let mut hosts = match (&self.hosts, &self.host) {
            (Some(hosts), _) => hosts.clone(),
            (None, Some(host)) => vec![host.clone()],
            (None, None) => vec![String::new(), "localhost".to_string()],
        };
        hosts.extend(self.domains.iter().map(DomainSettings::host));
        hosts
    }
}

/// Hosts requests may be addressed to.
#[derive(Debug, Default)]
pub struct ValidHosts {
    hosts: RwLock<Vec<String>>,
}

impl ValidHosts {
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        let valid = Self::default();
        for host in hosts {
            valid.allow(host);
        }
        valid
    }

    pub fn allow(&self, host: impl Into<String>) {
        let host = host.into().to_ascii_lowercase();
        let mut hosts = self.hosts.write();
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        self.hosts.read().iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    /// The host disallowed requests are rewritten to.
    pub fn fallback(&self) -> String {
        self.hosts.read().first().cloned().unwrap_or_default()
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.read().clone()
    }
}

/// The host a rewritten request was originally addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedHost(pub String);

/// Allow `host` on `app`. A current request that was rewritten away from
/// `host` gets its original host back.
pub fn allow_host(app: &App, host: &str) -> Result<()> {
    app.get::<ValidHosts>()?.allow(host);

    if let Some(mut request) = app.request()
        && request
            .extensions
            .get::<RequestedHost>()
            .is_some_and(|requested| requested.0.eq_ignore_ascii_case(host))
    {
        request.extensions.remove::<RequestedHost>();
        app.set_request(request.with_host(host));
    }
    Ok(())
}

fn filter_host(hosts: &ValidHosts, mut request: HttpRequest) -> HttpRequest {
    if hosts.is_allowed(&request.host) {
        return request;
    }
    let fallback = hosts.fallback();
    warn!(target: "portico::http", "host '{}' is not allowed, using '{}'", request.host, fallback);
    let original = std::mem::replace(&mut request.host, fallback);
    request.extensions.insert(RequestedHost(original));
    request
}

/// Loads `http.toml` and registers the error handlers, the response emitter
/// and the host filter. Terminates by emitting the response on the last run
/// cycle of every request.
#[derive(Default)]
pub struct HttpBoot {
    response: Mutex<Option<HttpResponse>>,
    terminated: AtomicUsize,
}

impl HttpBoot {
    /// The response of the current run, `200 OK` until one is set.
    pub fn response(&self) -> HttpResponse {
        self.response.lock().clone().unwrap_or_default()
    }

    pub fn set_response(&self, response: HttpResponse) {
        *self.response.lock() = Some(response);
    }
}

#[async_trait]
impl Boot for HttpBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<ConfigBoot>()
            .rebootable(Phase::Terminate)
    }

    fn boot(&self, app: &App) -> Result<()> {
        let config = app.config()?;
        let dirs = app.dirs();

        if let Some(dir) = dirs.get("config")
            && dir.path.is_dir()
            && install_config(dir)?
        {
            debug!(target: "portico::http", "installed default config into {}", dir.path.display());
        }
        config.load_optional("http.toml", "http", &dirs.group("config"))?;
        let settings = HttpSettings::from_config(&config)?;

        if !app.has::<ErrorHandlers>() {
            app.set(ErrorHandlers::new());
        }
        if !app.has::<ResponseEmitter>() {
            app.set(ResponseEmitter::new());
        }

        let hosts = Arc::new(ValidHosts::new(settings.allowed_hosts()));
        app.set_arc(hosts.clone());
        app.add_request_filter(move |request| filter_host(&hosts, request));

        app.set(settings);
        Ok(())
    }

    async fn terminate(&self, app: &App) -> Result<()> {
        let count = self.terminated.fetch_add(1, Ordering::SeqCst) + 1;
        if count % app.run_cycles() != 0 {
            return Ok(());
        }

        let response = self.response();
        let emitter = app.get::<ResponseEmitter>()?;
        if let Err(e) = emitter.emit(response).await {
            let handled = app.get::<ErrorHandlers>()?.handle_throwable(e)?;
            emitter.emit_unhooked(handled.clone());
            self.set_response(handled);
        }
        Ok(())
    }
}
