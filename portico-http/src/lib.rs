//! HTTP boot units for Portico.
//!
//! Each boot unit wires one concern into an [`App`](portico_core::App):
//!
//! - [`HttpBoot`]: `http.toml`, host filtering, error handlers and emission
//! - [`MiddlewareBoot`]: the middleware dispatcher
//! - [`RoutingBoot`]: router, route handler and routing middleware
//! - [`ErrorHandlerBoot`]: json, view or text error responses
//! - [`RequesterResponserBoot`]: response builders and views
//! - [`SessionBoot`] and [`CookiesBoot`]: sessions and cookies
//! - [`AreaBoot`]: nested sub-applications
//!
//! ```ignore
//! use portico_http::{RoutingBoot, ErrorHandlerBoot, RoutingExt};
//!
//! let app = App::with_root("shop", "/srv/shop");
//! app.boot(RoutingBoot).boot(ErrorHandlerBoot);
//! app.booting()?;
//! app.route_get("hello", Callable::from_fn(|_| Ok("hello".into())))?;
//! let response = app.handle(request).await?;
//! ```

pub mod area;
pub mod boot;
pub mod install;
pub mod middleware;
pub mod requester;
pub mod responser;
pub mod routing_ext;
pub mod uri;
pub mod views;

pub use area::{Area, AreaBoot, AreaHandle};
pub use boot::{
    CookiesBoot, CookiesSettings, DomainSettings, ErrorHandlerBoot, ErrorResponder, HttpBoot,
    HttpSettings, MiddlewareBoot, RequestedHost, RequesterExt, RequesterResponserBoot,
    RouteHandlerKind, RoutingBoot, SessionBoot, ValidHosts, allow_host, status_message,
};
pub use install::{generate_key, install_config};
pub use middleware::{MethodOverride, PreRouted, PreRouting, Routing};
pub use requester::{AcceptItem, Requester, parse_accept};
pub use responser::Responser;
pub use routing_ext::RoutingExt;
pub use uri::{CurrentUri, UriExt};
pub use views::{HandlebarsView, SharedView, View};
