//! Areas: sub-applications sharing the root router.
//!
//! An area is reached through one catch-all route on the root router, bound
//! either to a path slug (`/blog/...`) or to a domain. Requests reaching it
//! are served by a nested [`App`] with its own container and boot units.
//! The nested app sees the root dirs, overridden by `config/<key>` and
//! `config/<environment>/<key>` outside production, and routes below the
//! area base path.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Blog;
//!
//! impl Area for Blog {
//!     const KEY: &'static str = "blog";
//!     const SLUG: &'static str = "blog";
//!
//!     fn boots() -> Vec<BootUnit> {
//!         vec![BootUnit::new(RoutingBoot), BootUnit::new(BlogRoutes)]
//!     }
//! }
//!
//! app.boot(AreaBoot::<Blog>::default());
//! ```

use crate::boot::{HttpBoot, MiddlewareBoot, RoutingBoot, allow_host};
use crate::routing_ext::RoutingExt;
use crate::uri::{UriExt, normalize_base_path};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use portico_config::ConfigExt;
use portico_core::{
    App, Boot, BootDescriptor, BootUnit, Call, Callable, Dir, Error, HandlerOutput, HttpRequest,
    Result, Router, WeakApp,
};
use portico_log::{debug, info};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static description of an area.
pub trait Area: Send + Sync + 'static {
    /// Unique key; names the area route and its config file `<key>.toml`.
    const KEY: &'static str;

    /// Path prefix of the area, without separators. Empty serves the area at
    /// the root base path.
    const SLUG: &'static str = "";

    /// Host the area is bound to. A domain takes precedence over the slug.
    const DOMAIN: Option<&'static str> = None;

    /// Boot units of the nested app.
    fn boots() -> Vec<BootUnit> {
        Vec::new()
    }
}

/// Link from a nested app back to its area.
pub struct AreaHandle<A: Area> {
    root: WeakApp,
    _area: PhantomData<fn() -> A>,
}

impl<A: Area> AreaHandle<A> {
    pub fn root(&self) -> Option<App> {
        self.root.upgrade()
    }

    pub fn area(&self) -> Result<Arc<AreaBoot<A>>> {
        self.root()
            .ok_or_else(|| Error::Internal(format!("root app of area '{}' is gone", A::KEY)))?
            .get::<AreaBoot<A>>()
    }
}

/// Boots an [`Area`] into the root app.
pub struct AreaBoot<A: Area> {
    root: OnceCell<WeakApp>,
    nested: OnceCell<App>,
    queued: Mutex<Vec<BootUnit>>,
    routed: AtomicBool,
    slug: RwLock<String>,
    domain: RwLock<Option<String>>,
    _area: PhantomData<fn() -> A>,
}

impl<A: Area> Default for AreaBoot<A> {
    fn default() -> Self {
        Self {
            root: OnceCell::new(),
            nested: OnceCell::new(),
            queued: Mutex::new(Vec::new()),
            routed: AtomicBool::new(false),
            slug: RwLock::new(A::SLUG.trim_matches('/').to_string()),
            domain: RwLock::new(A::DOMAIN.map(str::to_ascii_lowercase)),
            _area: PhantomData,
        }
    }
}

impl<A: Area> AreaBoot<A> {
    pub fn area_key(&self) -> &'static str {
        A::KEY
    }

    /// Display name: the key with its first letter capitalized.
    pub fn area_name(&self) -> String {
        let mut chars = A::KEY.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn area_slug(&self) -> String {
        self.slug.read().clone()
    }

    pub fn area_domain(&self) -> Option<String> {
        self.domain.read().clone()
    }

    pub fn is_routed(&self) -> bool {
        self.routed.load(Ordering::SeqCst)
    }

    fn root_app(&self) -> Result<App> {
        self.root
            .get()
            .and_then(WeakApp::upgrade)
            .ok_or_else(|| Error::Boot(format!("area '{}' is not booted", A::KEY)))
    }

    /// The nested app, created on first use.
    pub fn app(&self) -> Result<App> {
        self.nested.get_or_try_init(|| self.create_app()).cloned()
    }

    fn create_app(&self) -> Result<App> {
        let root = self.root_app()?;
        let nested = App::new(format!("{}.{}", root.name(), A::KEY));

        let dirs = root.dirs();
        for dir in dirs.all() {
            nested.dir(dir.clone());
        }
        let environment = root.environment();
        if let Some(config) = dirs.get("config") {
            if environment != "production" {
                nested.dir(Dir::new(
                    config.path.join(&environment).join(A::KEY),
                    format!("config.{}.{}", environment, A::KEY),
                    "config",
                    110,
                ));
            }
            nested.dir(Dir::new(
                config.path.join(A::KEY),
                format!("config.{}", A::KEY),
                "config",
                100,
            ));
        }
        nested.set_environment(environment);

        nested.set(AreaHandle::<A> {
            root: root.downgrade(),
            _area: PhantomData,
        });

        let base_path = match self.area_domain() {
            Some(_) => root.base_path(),
            None => normalize_base_path(&format!("{}{}", root.base_path(), self.area_slug())),
        };
        nested.on::<Router, _>(move |router| router.set_base_path(&base_path));

        for unit in A::boots() {
            nested.boot_unit(unit);
        }
        debug!(target: "portico::area", "created app for area '{}'", A::KEY);
        Ok(nested)
    }

    /// Boot the nested app, including boot units added before it existed.
    pub fn booting(&self) -> Result<()> {
        let nested = self.app()?;
        let queued: Vec<BootUnit> = self.queued.lock().drain(..).collect();
        for unit in queued {
            nested.boot_unit(unit);
        }
        nested.booting()
    }

    /// Add a boot unit to the nested app. Units are queued until the area is
    /// routed.
    pub fn add_boot<B: Boot>(&self, boot: B) -> Result<&Self> {
        let unit = BootUnit::new(boot);
        if self.is_routed() {
            self.app()?.boot_unit(unit);
        } else {
            self.queued.lock().push(unit);
        }
        Ok(self)
    }

    /// Url of the area on the root router.
    pub fn url(&self) -> Result<String> {
        self.root_app()?.route_url(A::KEY, &[])
    }

    fn pattern(&self) -> String {
        let slug = self.area_slug();
        if self.area_domain().is_some() || slug.is_empty() {
            "{?path*}".to_string()
        } else {
            format!("{}/{{?path*}}", slug)
        }
    }

    /// Serve `request` with the nested app.
    async fn serve(&self, request: Option<HttpRequest>) -> Result<HandlerOutput> {
        self.routed.store(true, Ordering::SeqCst);
        let nested = self.app()?;
        nested.boot(HttpBoot::default());
        self.booting()?;

        if let Some(domain) = self.area_domain() {
            allow_host(&nested, &domain)?;
        }
        if let Some(request) = request {
            info!(
                target: "portico::area",
                "area '{}' serving {} {}",
                A::KEY,
                request.method,
                request.path
            );
            nested.set_request(request);
        }

        nested.run().await?;
        Ok(HandlerOutput::Response(nested.get::<HttpBoot>()?.response()))
    }
}

impl<A: Area> Boot for AreaBoot<A> {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<MiddlewareBoot>()
            .depends_on::<RoutingBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        let _ = self.root.set(app.downgrade());

        let config = app.config()?;
        if config.load_optional(&format!("{}.toml", A::KEY), A::KEY, &app.dirs().group("config"))? {
            if let Some(slug) = config.get_opt::<String>(&format!("{}.slug", A::KEY)) {
                *self.slug.write() = slug.trim_matches('/').to_string();
            }
            if let Some(domain) = config.get_opt::<String>(&format!("{}.domain", A::KEY)) {
                *self.domain.write() = Some(domain.to_ascii_lowercase()).filter(|d| !d.is_empty());
            }
        }

        // A domain may name a routing domain key.
        if let Some(domain) = self.area_domain() {
            let host = app.router()?.domains().get(&domain).cloned().unwrap_or(domain);
            allow_host(app, &host)?;
            *self.domain.write() = Some(host);
        }

        let root = app.downgrade();
        let handler = Callable::new(move |call: Call| {
            let root = root.clone();
            async move {
                let root = root.upgrade().ok_or_else(|| {
                    Error::Internal(format!("root app of area '{}' is gone", A::KEY))
                })?;
                root.get::<AreaBoot<A>>()?.serve(call.request().cloned()).await
            }
        });

        let mut route = app
            .route("*", &self.pattern(), handler)?
            .name(A::KEY)
            .constraint("path", "[^?]*")
            .parameter("area", A::KEY);
        if let Some(domain) = self.area_domain() {
            route = route.domain(domain);
        }
        let uri = route.route().map(|r| r.uri().to_string()).unwrap_or_default();
        debug!(target: "portico::area", "area '{}' routed at '{}'", A::KEY, uri);
        Ok(())
    }
}
